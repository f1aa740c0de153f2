//! Values produced by evaluating a parameter set.

use crate::parameters::expression::{EvaluationContext, ExpressionError};
use indexmap::IndexMap;
use serde::Serialize;
use std::ops::Index;

/// One value per parameter, keyed by name.
///
/// Iteration follows the insertion order of the set; [`order`](Self::order)
/// gives the topological order the values were computed in.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EvaluationResult {
    values: IndexMap<String, f64>,

    #[serde(skip)]
    order: Vec<String>,
}

impl EvaluationResult {
    pub(crate) fn new(values: IndexMap<String, f64>, order: Vec<String>) -> Self {
        Self { values, order }
    }

    /// Value of `name`, if it is a parameter of the evaluated set
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(name, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    /// Names in the order they were evaluated
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn values(&self) -> &IndexMap<String, f64> {
        &self.values
    }

    pub fn into_values(self) -> IndexMap<String, f64> {
        self.values
    }
}

impl Index<&str> for EvaluationResult {
    type Output = f64;

    /// # Panics
    ///
    /// Panics if `name` is not in the result.
    fn index(&self, name: &str) -> &f64 {
        match self.values.get(name) {
            Some(value) => value,
            None => panic!("no parameter named '{}' in evaluation result", name),
        }
    }
}

impl EvaluationContext for EvaluationResult {
    fn get_variable(&self, name: &str) -> Result<f64, ExpressionError> {
        self.get(name).ok_or_else(|| ExpressionError::UndefinedVariable {
            name: name.to_string(),
        })
    }
}
