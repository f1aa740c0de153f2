//! Monte Carlo propagation of parameter uncertainty.
//!
//! Every fixed amount with an [`Uncertainty`](super::Uncertainty) is replaced
//! by an array of draws, and formulas are evaluated once per draw index in
//! topological order. Globals stay constant across draws.

use crate::error::{ParamSetError, Result};
use crate::parameters::expression::{EvaluationContext, ExpressionError};
use crate::parameters::globals::GlobalContext;
use crate::parameters::parameter::ParameterKind;
use crate::parameters::ParameterSet;
use indexmap::IndexMap;
use ndarray::Array1;
use rand::Rng;
use tracing::{debug, warn};

/// Draws for every parameter of a set
#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloResult {
    /// Number of draws per parameter
    pub iterations: usize,

    samples: IndexMap<String, Array1<f64>>,
}

impl MonteCarloResult {
    /// All draws of `name`, in draw order
    pub fn samples(&self, name: &str) -> Option<&Array1<f64>> {
        self.samples.get(name)
    }

    /// Iterate over `(name, draws)` in insertion order of the set
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Array1<f64>)> {
        self.samples.iter().map(|(name, draws)| (name.as_str(), draws))
    }

    pub fn mean(&self, name: &str) -> Option<f64> {
        self.samples.get(name).and_then(|draws| draws.mean())
    }

    /// Population standard deviation of the draws
    pub fn std(&self, name: &str) -> Option<f64> {
        self.samples.get(name).map(|draws| draws.std(0.0))
    }

    pub fn median(&self, name: &str) -> Option<f64> {
        self.percentile(name, 50.0)
    }

    /// Percentile `q` (0 to 100) with linear interpolation between ranks
    pub fn percentile(&self, name: &str, q: f64) -> Option<f64> {
        if !(0.0..=100.0).contains(&q) {
            return None;
        }
        let mut sorted = self.samples.get(name)?.to_vec();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let rank = q / 100.0 * (sorted.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        let weight = rank - lower as f64;
        Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
    }

    /// Central interval holding `probability` (e.g. 0.95) of the draws
    pub fn interval(&self, name: &str, probability: f64) -> Option<(f64, f64)> {
        let tail = (1.0 - probability) / 2.0 * 100.0;
        Some((
            self.percentile(name, tail)?,
            self.percentile(name, 100.0 - tail)?,
        ))
    }
}

/// Values of one draw index across all sampled parameters
struct DrawContext<'a> {
    samples: &'a IndexMap<String, Array1<f64>>,
    index: usize,
    globals: &'a GlobalContext,
}

impl EvaluationContext for DrawContext<'_> {
    fn get_variable(&self, name: &str) -> std::result::Result<f64, ExpressionError> {
        match self.samples.get(name) {
            Some(draws) => Ok(draws[self.index]),
            None => self.globals.get_variable(name),
        }
    }
}

impl ParameterSet {
    /// Draw `iterations` samples of every parameter.
    ///
    /// Amounts are sampled from their uncertainty distribution (a constant
    /// array when they have none), then formulas are evaluated draw by draw.
    /// Fails like [`evaluate`](Self::evaluate) and with `InvalidDefinition`
    /// when `iterations` is zero or a distribution cannot be sampled.
    ///
    /// # Examples
    ///
    /// ```
    /// use paramset_rs::parameters::ParameterSet;
    /// use paramset_rs::uncertainty::Uncertainty;
    /// use rand::SeedableRng;
    /// use rand_chacha::ChaCha8Rng;
    ///
    /// let mut set = ParameterSet::new();
    /// set.add_amount("mass", 10.0).unwrap();
    /// set.set_uncertainty("mass", Some(Uncertainty::Uniform { minimum: 9.0, maximum: 11.0 })).unwrap();
    /// set.add_formula("weight", "mass * 9.81").unwrap();
    ///
    /// let mut rng = ChaCha8Rng::seed_from_u64(42);
    /// let mc = set.evaluate_monte_carlo(1000, &mut rng).unwrap();
    /// let mean = mc.mean("weight").unwrap();
    /// assert!((mean - 98.1).abs() < 2.0);
    /// ```
    pub fn evaluate_monte_carlo<R: Rng + ?Sized>(
        &self,
        iterations: usize,
        rng: &mut R,
    ) -> Result<MonteCarloResult> {
        if iterations == 0 {
            return Err(ParamSetError::invalid(
                "<monte carlo>",
                "iterations must be at least 1",
            ));
        }

        let max_attempts = self.config().max_resample_attempts;
        let policy = self.config().non_real;
        let mut drawn: IndexMap<String, Array1<f64>> = IndexMap::with_capacity(self.len());

        for param in self.ordered_parameters()? {
            let name = param.name();
            let draws = match param.kind() {
                ParameterKind::Amount(amount) => match param.uncertainty() {
                    Some(uncertainty) => uncertainty
                        .sample(*amount, iterations, rng, max_attempts)
                        .map_err(|reason| ParamSetError::invalid(name, reason))?,
                    None => Array1::from_elem(iterations, *amount),
                },
                ParameterKind::Formula(formula) => {
                    let mut draws = Array1::<f64>::zeros(iterations);
                    for (index, slot) in draws.iter_mut().enumerate() {
                        let context = DrawContext {
                            samples: &drawn,
                            index,
                            globals: self.globals(),
                        };
                        *slot = formula
                            .expression()
                            .evaluate_with(&context, policy)
                            .map_err(|e| ParamSetError::from_expression(name, e))?;
                    }
                    draws
                }
            };

            let non_real = draws.iter().filter(|v| !v.is_finite()).count();
            if non_real > 0 {
                warn!(parameter = %name, non_real, "non-real values in Monte Carlo draws");
            }
            drawn.insert(name.to_string(), draws);
        }

        let samples: IndexMap<String, Array1<f64>> = self
            .names()
            .filter_map(|name| drawn.swap_remove(name).map(|draws| (name.to_string(), draws)))
            .collect();
        debug!(
            parameters = samples.len(),
            iterations, "finished Monte Carlo evaluation"
        );

        Ok(MonteCarloResult {
            iterations,
            samples,
        })
    }
}
