//! # Uncertainty Propagation
//!
//! Fixed-amount parameters may carry an [`Uncertainty`] distribution. A
//! Monte Carlo run samples those amounts and pushes the draws through every
//! formula of the set, see [`ParameterSet::evaluate_monte_carlo`].
//!
//! [`ParameterSet::evaluate_monte_carlo`]: crate::parameters::ParameterSet::evaluate_monte_carlo

mod distribution;
mod monte_carlo;

pub use distribution::Uncertainty;
pub use monte_carlo::MonteCarloResult;
