//! Named values shared by a hosting application.
//!
//! A [`GlobalContext`] is handed to a [`ParameterSet`](super::ParameterSet)
//! explicitly; formulas may reference its names like any parameter. Nothing
//! about it is process-wide.

use crate::error::{ParamSetError, Result};
use crate::parameters::expression::{EvaluationContext, ExpressionError};
use crate::parameters::parameter::validate_name;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Named global values visible to every formula of a parameter set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IndexMap<String, f64>", into = "IndexMap<String, f64>")]
pub struct GlobalContext {
    values: IndexMap<String, f64>,
}

impl GlobalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a global, returning the previous value
    ///
    /// # Examples
    ///
    /// ```
    /// use paramset_rs::parameters::GlobalContext;
    ///
    /// let mut globals = GlobalContext::new();
    /// globals.insert("efficiency", 0.8).unwrap();
    /// assert_eq!(globals.get("efficiency"), Some(0.8));
    /// assert!(globals.insert("max", 1.0).is_err());
    /// ```
    pub fn insert(&mut self, name: &str, value: f64) -> Result<Option<f64>> {
        validate_name(name)?;
        if !value.is_finite() {
            return Err(ParamSetError::invalid(
                name,
                format!("global value {} is not a finite number", value),
            ));
        }
        Ok(self.values.insert(name.to_string(), value))
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, name: &str, value: f64) -> Result<Self> {
        self.insert(name, value)?;
        Ok(self)
    }

    pub fn remove(&mut self, name: &str) -> Option<f64> {
        self.values.shift_remove(name)
    }

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

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }
}

impl TryFrom<IndexMap<String, f64>> for GlobalContext {
    type Error = ParamSetError;

    fn try_from(values: IndexMap<String, f64>) -> Result<Self> {
        let mut globals = GlobalContext::new();
        for (name, value) in values {
            globals.insert(&name, value)?;
        }
        Ok(globals)
    }
}

impl From<GlobalContext> for IndexMap<String, f64> {
    fn from(globals: GlobalContext) -> Self {
        globals.values
    }
}

impl EvaluationContext for GlobalContext {
    fn get_variable(&self, name: &str) -> std::result::Result<f64, ExpressionError> {
        self.get(name).ok_or_else(|| ExpressionError::UndefinedVariable {
            name: name.to_string(),
        })
    }
}
