//! Parallel evaluation of independent parameter sets.
//!
//! Sets share nothing, so each one is resolved on its own rayon worker. The
//! sets are only read; cached state is left untouched.

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::parameters::{EvaluationResult, ParameterSet};

/// Evaluate every set in parallel, one result per set in input order.
///
/// A failing set does not affect the others.
///
/// # Examples
///
/// ```
/// use paramset_rs::parameters::ParameterSet;
/// use paramset_rs::utils::evaluate_many;
///
/// let mut good = ParameterSet::new();
/// good.add_formula("A", "6 * 7").unwrap();
/// let mut bad = ParameterSet::new();
/// bad.add_formula("A", "1 / 0").unwrap();
///
/// let results = evaluate_many(&[good, bad]);
/// assert_eq!(results[0].as_ref().unwrap()["A"], 42.0);
/// assert!(results[1].is_err());
/// ```
pub fn evaluate_many(sets: &[ParameterSet]) -> Vec<Result<EvaluationResult>> {
    debug!(sets = sets.len(), "evaluating parameter sets in parallel");
    sets.par_iter().map(ParameterSet::resolve).collect()
}

/// Evaluate `base` once per scenario, each scenario overriding some amounts.
///
/// An override may turn a formula parameter into a fixed amount or add a
/// new parameter.
pub fn evaluate_scenarios(
    base: &ParameterSet,
    scenarios: &[IndexMap<String, f64>],
) -> Vec<Result<EvaluationResult>> {
    debug!(
        scenarios = scenarios.len(),
        "evaluating scenarios in parallel"
    );
    scenarios
        .par_iter()
        .map(|overrides| {
            let mut set = base.clone();
            for (name, amount) in overrides {
                set.set_amount(name, *amount)?;
            }
            set.evaluate()
        })
        .collect()
}
