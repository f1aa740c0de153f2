//! # Parameter System
//!
//! This module provides named parameters whose values are either fixed
//! amounts or formulas over other parameters, and the machinery to evaluate
//! a whole set of them in dependency order.
//!
//! ## Key Features
//!
//! - **Named Parameters**: Each parameter has an identifier name and exactly one of an amount or a formula
//! - **Closed Formula Language**: Arithmetic, parentheses, and an allow-list of math functions and constants
//! - **Dependency Ordering**: Parameters are evaluated after everything they reference, ties broken by insertion order
//! - **Cycle and Reference Checks**: Circular and unknown references are reported before anything is evaluated
//! - **Globals**: Application-supplied values visible to formulas through an explicit [`GlobalContext`]
//! - **Serialization Support**: Definitions load from and save to ordered JSON objects with serde
//!
//! ## Core Components
//!
//! - [`Parameter`] and [`ParameterDefinition`]: A validated parameter and its user-facing definition
//! - [`ParameterSet`]: A collection of parameters with a resolve/evaluate lifecycle
//! - [`Expression`]: Parse and evaluate formulas
//! - [`DependencyGraph`]: The reference graph between parameters and its topological order
//! - [`mangling`]: Prefix names to merge groups of parameters
//!
//! ## Example Usage
//!
//! ```rust
//! use paramset_rs::parameters::{GlobalContext, ParameterSet};
//!
//! let globals = GlobalContext::new().with("density", 2.5).unwrap();
//! let mut set = ParameterSet::new().with_globals(globals);
//!
//! set.add_amount("volume", 4.0).unwrap();
//! set.add_formula("mass", "volume * density").unwrap();
//! set.add_formula("log_mass", "log10(mass)").unwrap();
//!
//! let result = set.evaluate().unwrap();
//! assert_eq!(result["mass"], 10.0);
//! assert_eq!(result["log_mass"], 1.0);
//! assert!(!result.contains("density"));
//! ```

pub mod builtins;
pub mod expression;
pub mod globals;
pub mod graph;
pub mod mangling;
pub mod parameter;
pub mod parameter_set;
pub mod result;


// Re-export key types
pub use expression::{
    extract_references, EvaluationContext, Expression, ExpressionError, SimpleContext,
};
pub use globals::GlobalContext;
pub use graph::DependencyGraph;
pub use mangling::{mangle_formula, prefix_definitions, substitute_in_formulas};
pub use parameter::{validate_name, Formula, Parameter, ParameterDefinition, ParameterKind};
pub use parameter_set::{ParameterSet, SetState};
pub use result::EvaluationResult;
