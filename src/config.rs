//! Configuration options for formula evaluation.
//!
//! This module defines how the evaluator treats non-real results, whether
//! unknown references carry spelling suggestions, and the limits used when
//! drawing Monte Carlo samples from truncated distributions.

use serde::{Deserialize, Serialize};

/// What to do when a formula produces a non-real value (NaN or infinity)
/// from finite operands, e.g. `sqrt(-1)` or `ln(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonRealPolicy {
    /// Fail the evaluation with a domain error
    #[default]
    Error,

    /// Return the NaN or infinite value and log a warning
    Propagate,
}

/// Configuration options for evaluating a parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Handling of non-real intermediate or final values. Default: Error
    pub non_real: NonRealPolicy,

    /// Attach a case-insensitive match as a suggestion to unknown references. Default: true
    pub suggest_case_matches: bool,

    /// Maximum number of draws per sample when rejecting values outside the
    /// bounds of a truncated distribution. Default: 1000
    pub max_resample_attempts: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            non_real: NonRealPolicy::default(),
            suggest_case_matches: true,
            max_resample_attempts: 1000,
        }
    }
}

impl EvalConfig {
    /// Configuration that lets NaN and infinite values flow through formulas.
    pub fn propagate_non_real() -> Self {
        Self {
            non_real: NonRealPolicy::Propagate,
            ..Self::default()
        }
    }
}
