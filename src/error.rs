use crate::parameters::expression::ExpressionError;
use thiserror::Error;

/// Error types for the paramset-rs library.
#[derive(Error, Debug)]
pub enum ParamSetError {
    /// Malformed parameter definition (missing or conflicting fields, bad name).
    #[error("Invalid definition for parameter '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },

    /// A formula references a name that is neither a parameter, a global,
    /// nor an allow-listed function or constant.
    #[error(
        "Parameter '{parameter}' references unknown name '{name}'{}",
        suggestion_suffix(.suggestion)
    )]
    UnknownReference {
        parameter: String,
        name: String,
        suggestion: Option<String>,
    },

    /// Parameters that depend on themselves, directly or transitively.
    #[error("Circular reference between parameters: {}", .members.join(", "))]
    CircularReference { members: Vec<String> },

    /// Division (or modulo) by zero while evaluating a formula.
    #[error("Division by zero while evaluating parameter '{parameter}'")]
    DivisionByZero { parameter: String },

    /// A formula produced a non-real result from real operands.
    #[error("Non-real result while evaluating parameter '{parameter}': {message}")]
    DomainError { parameter: String, message: String },

    /// A formula could not be parsed.
    #[error("Failed to parse formula for parameter '{parameter}': {message}")]
    ParseError { parameter: String, message: String },

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean '{}'?)", name),
        None => String::new(),
    }
}

impl ParamSetError {
    /// Attach the name of the parameter being evaluated to an expression error.
    pub fn from_expression(parameter: &str, err: ExpressionError) -> Self {
        match err {
            ExpressionError::ParseError { message } => ParamSetError::ParseError {
                parameter: parameter.to_string(),
                message,
            },
            ExpressionError::UndefinedVariable { name }
            | ExpressionError::UndefinedFunction { name } => ParamSetError::UnknownReference {
                parameter: parameter.to_string(),
                name,
                suggestion: None,
            },
            ExpressionError::DivisionByZero => ParamSetError::DivisionByZero {
                parameter: parameter.to_string(),
            },
            ExpressionError::NonReal { message } => ParamSetError::DomainError {
                parameter: parameter.to_string(),
                message,
            },
            ExpressionError::InvalidOperation { message } => ParamSetError::InvalidDefinition {
                name: parameter.to_string(),
                reason: message,
            },
        }
    }

    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        ParamSetError::InvalidDefinition {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for paramset-rs operations.
pub type Result<T> = std::result::Result<T, ParamSetError>;
