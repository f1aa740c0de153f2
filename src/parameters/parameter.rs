//! Parameter definition and implementation
//!
//! This module provides the Parameter struct, the fundamental building block
//! of the parameter system. A parameter is either a fixed amount or a formula
//! over other parameters, never both.

use crate::error::{ParamSetError, Result};
use crate::parameters::builtins;
use crate::parameters::expression::{Expression, ExpressionError};
use crate::uncertainty::Uncertainty;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// User-supplied definition of a parameter, as found in JSON input.
///
/// Exactly one of `amount` and `formula` must be set. Any other fields are
/// kept as free-form metadata and never interpreted.
///
/// # Examples
///
/// ```
/// use paramset_rs::parameters::ParameterDefinition;
///
/// let def: ParameterDefinition =
///     serde_json::from_str(r#"{"formula": "2 * A + 16", "unit": "kg"}"#).unwrap();
/// assert_eq!(def.formula.as_deref(), Some("2 * A + 16"));
/// assert_eq!(def.metadata["unit"], "kg");
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<Uncertainty>,

    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl ParameterDefinition {
    /// Definition of a fixed amount
    pub fn amount(amount: f64) -> Self {
        Self {
            amount: Some(amount),
            ..Self::default()
        }
    }

    /// Definition of a formula
    pub fn formula(formula: &str) -> Self {
        Self {
            formula: Some(formula.to_string()),
            ..Self::default()
        }
    }

    /// Attach an uncertainty distribution
    pub fn with_uncertainty(mut self, uncertainty: Uncertainty) -> Self {
        self.uncertainty = Some(uncertainty);
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// A parsed formula together with its source text
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expression,
}

impl Formula {
    /// Parse a formula
    pub fn parse(source: &str) -> std::result::Result<Self, ExpressionError> {
        Ok(Self {
            source: source.to_string(),
            expr: Expression::parse(source)?,
        })
    }

    /// The formula as written by the user
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed expression tree
    pub fn expression(&self) -> &Expression {
        &self.expr
    }
}

/// How a parameter obtains its value
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterKind {
    /// A fixed amount, passed through unchanged by evaluation
    Amount(f64),

    /// A formula evaluated against other parameters
    Formula(Formula),
}

/// A named parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    kind: ParameterKind,
    uncertainty: Option<Uncertainty>,
    metadata: Map<String, Value>,

    /// Value written back by `ParameterSet::evaluate_and_set_amounts`
    value: Option<f64>,
}

impl Parameter {
    /// Create a fixed-amount parameter
    ///
    /// # Examples
    ///
    /// ```
    /// use paramset_rs::parameters::Parameter;
    ///
    /// let param = Parameter::amount("A", 42.0).unwrap();
    /// assert_eq!(param.name(), "A");
    /// assert_eq!(param.fixed_amount(), Some(42.0));
    ///
    /// assert!(Parameter::amount("sqrt", 1.0).is_err());
    /// ```
    pub fn amount(name: &str, amount: f64) -> Result<Self> {
        validate_name(name)?;
        validate_amount(name, amount)?;
        Ok(Self::with_kind(name, ParameterKind::Amount(amount)))
    }

    /// Create a formula parameter
    ///
    /// # Examples
    ///
    /// ```
    /// use paramset_rs::parameters::Parameter;
    ///
    /// let param = Parameter::formula("B", "2 * A + 16").unwrap();
    /// assert_eq!(param.formula_source(), Some("2 * A + 16"));
    /// assert!(param.references().contains("A"));
    /// ```
    pub fn formula(name: &str, formula: &str) -> Result<Self> {
        validate_name(name)?;
        let formula =
            Formula::parse(formula).map_err(|e| ParamSetError::from_expression(name, e))?;
        Ok(Self::with_kind(name, ParameterKind::Formula(formula)))
    }

    /// Create a parameter from its user-supplied definition
    pub fn from_definition(name: &str, definition: ParameterDefinition) -> Result<Self> {
        let ParameterDefinition {
            amount,
            formula,
            uncertainty,
            metadata,
        } = definition;

        let mut param = match (amount, formula) {
            (Some(amount), None) => Self::amount(name, amount)?,
            (None, Some(formula)) => Self::formula(name, &formula)?,
            (Some(_), Some(_)) => {
                return Err(ParamSetError::invalid(
                    name,
                    "specifies both an amount and a formula",
                ))
            }
            (None, None) => {
                return Err(ParamSetError::invalid(
                    name,
                    "specifies neither an amount nor a formula",
                ))
            }
        };

        param.set_uncertainty(uncertainty)?;
        param.metadata = metadata;
        Ok(param)
    }

    /// Convert back into a definition
    pub fn to_definition(&self) -> ParameterDefinition {
        let (amount, formula) = match &self.kind {
            ParameterKind::Amount(amount) => (Some(*amount), None),
            ParameterKind::Formula(formula) => (None, Some(formula.source().to_string())),
        };
        ParameterDefinition {
            amount,
            formula,
            uncertainty: self.uncertainty.clone(),
            metadata: self.metadata.clone(),
        }
    }

    fn with_kind(name: &str, kind: ParameterKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            uncertainty: None,
            metadata: Map::new(),
            value: None,
        }
    }

    /// Get the name of the parameter
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How the parameter obtains its value
    pub fn kind(&self) -> &ParameterKind {
        &self.kind
    }

    /// The fixed amount, if this is not a formula parameter
    pub fn fixed_amount(&self) -> Option<f64> {
        match self.kind {
            ParameterKind::Amount(amount) => Some(amount),
            ParameterKind::Formula(_) => None,
        }
    }

    /// The formula text, if this is a formula parameter
    pub fn formula_source(&self) -> Option<&str> {
        match &self.kind {
            ParameterKind::Amount(_) => None,
            ParameterKind::Formula(formula) => Some(formula.source()),
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self.kind, ParameterKind::Formula(_))
    }

    /// Names referenced by the formula; empty for fixed amounts
    pub fn references(&self) -> IndexSet<String> {
        match &self.kind {
            ParameterKind::Amount(_) => IndexSet::new(),
            ParameterKind::Formula(formula) => formula.expression().references(),
        }
    }

    pub fn uncertainty(&self) -> Option<&Uncertainty> {
        self.uncertainty.as_ref()
    }

    /// Attach or clear an uncertainty distribution.
    ///
    /// Only fixed amounts may carry one; formula values follow from their inputs.
    pub fn set_uncertainty(&mut self, uncertainty: Option<Uncertainty>) -> Result<()> {
        if let Some(uncertainty) = &uncertainty {
            match self.kind {
                ParameterKind::Amount(amount) => uncertainty
                    .validate(amount)
                    .map_err(|reason| ParamSetError::invalid(&self.name, reason))?,
                ParameterKind::Formula(_) if *uncertainty == Uncertainty::Fixed => {}
                ParameterKind::Formula(_) => {
                    return Err(ParamSetError::invalid(
                        &self.name,
                        "formula parameters cannot carry an uncertainty distribution",
                    ))
                }
            }
        }
        self.uncertainty = uncertainty;
        Ok(())
    }

    /// Free-form metadata, never interpreted
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.metadata
    }

    /// The value cached by the last `evaluate_and_set_amounts`, if any
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub(crate) fn set_value(&mut self, value: Option<f64>) {
        self.value = value;
    }

    /// Replace the way this parameter obtains its value, keeping its metadata.
    /// Switching to a formula drops the uncertainty distribution.
    pub(crate) fn replace_kind(&mut self, kind: ParameterKind) -> Result<()> {
        if let ParameterKind::Amount(amount) = kind {
            validate_amount(&self.name, amount)?;
            if let Some(uncertainty) = &self.uncertainty {
                uncertainty
                    .validate(amount)
                    .map_err(|reason| ParamSetError::invalid(&self.name, reason))?;
            }
        } else {
            self.uncertainty = None;
        }
        self.kind = kind;
        self.value = None;
        Ok(())
    }
}

/// Check that `name` can be used as a parameter or global name.
///
/// Names must be non-empty identifiers (`[A-Za-z_][A-Za-z0-9_]*`) and must not
/// shadow an allow-listed function or constant.
pub fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_identifier = match chars.next() {
        None => return Err(ParamSetError::invalid(name, "name is empty")),
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
    };

    if !valid_identifier {
        return Err(ParamSetError::invalid(name, "name is not a valid identifier"));
    }
    if builtins::is_builtin(name) {
        return Err(ParamSetError::invalid(
            name,
            "name is reserved for a builtin function or constant",
        ));
    }
    Ok(())
}

fn validate_amount(name: &str, amount: f64) -> Result<()> {
    if amount.is_finite() {
        Ok(())
    } else {
        Err(ParamSetError::invalid(
            name,
            format!("amount {} is not a finite number", amount),
        ))
    }
}
