//! # paramset-rs
//!
//! `paramset-rs` stores named numeric parameters, where each parameter is a
//! fixed amount or a formula over other parameters, and evaluates them in
//! dependency order.
//!
//! The library provides:
//! - A closed formula language with an allow-list of math functions
//! - Dependency resolution with cycle and unknown-reference detection
//! - Application-supplied globals through an explicit context object
//! - Name mangling for merging groups of parameters
//! - Monte Carlo propagation of amount uncertainty
//! - Parallel evaluation of independent sets
//!
//! ## Basic Usage
//!
//! ```
//! use paramset_rs::{ParamSetError, ParameterSet};
//!
//! let json = r#"{
//!     "A": {"amount": 42},
//!     "B": {"formula": "2 * A + 16"},
//!     "C": {"formula": "sqrt(B)"}
//! }"#;
//! let mut set = ParameterSet::from_json(json).unwrap();
//! let result = set.evaluate().unwrap();
//! assert_eq!(result["C"], 10.0);
//!
//! set.add_formula("D", "E + 1").unwrap();
//! assert!(matches!(set.evaluate(), Err(ParamSetError::UnknownReference { .. })));
//! ```

// Public modules
pub mod config;
pub mod error;

// Parameter system
pub mod parameters;

pub mod uncertainty;
pub mod utils;

// Re-exports for convenience
pub use config::{EvalConfig, NonRealPolicy};
pub use error::{ParamSetError, Result};
pub use parameters::{
    EvaluationResult, GlobalContext, Parameter, ParameterDefinition, ParameterSet, SetState,
};
pub use uncertainty::{MonteCarloResult, Uncertainty};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
