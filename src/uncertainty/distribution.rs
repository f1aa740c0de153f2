//! Uncertainty distributions attached to fixed-amount parameters.
//!
//! A distribution describes how the amount of a parameter varies between
//! Monte Carlo draws. The parameter's amount is the central value: the mean
//! of a normal, the median of a lognormal, the mode of a triangular.

use ndarray::Array1;
use rand::distributions::Uniform;
use rand::Rng;
use rand_distr::{Distribution, LogNormal, Normal, Triangular};
use serde::{Deserialize, Serialize};

/// Distribution of a parameter amount
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "distribution", rename_all = "snake_case")]
pub enum Uncertainty {
    /// No uncertainty, every draw equals the amount
    #[default]
    Fixed,

    /// Normal distribution with mean = amount and standard deviation `scale`
    Normal {
        scale: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },

    /// Lognormal distribution with median = amount and log-space standard deviation `scale`
    Lognormal {
        scale: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },

    /// Uniform distribution on `[minimum, maximum)`
    Uniform { minimum: f64, maximum: f64 },

    /// Triangular distribution on `[minimum, maximum]` with mode = amount
    Triangular { minimum: f64, maximum: f64 },
}

impl Uncertainty {
    /// Check the distribution parameters against the amount it is attached to
    pub fn validate(&self, amount: f64) -> Result<(), String> {
        match *self {
            Uncertainty::Fixed => Ok(()),
            Uncertainty::Normal {
                scale,
                minimum,
                maximum,
            } => {
                check_scale(scale)?;
                check_bounds(minimum, maximum)
            }
            Uncertainty::Lognormal {
                scale,
                minimum,
                maximum,
            } => {
                check_scale(scale)?;
                if amount <= 0.0 {
                    return Err(format!(
                        "lognormal distribution needs a positive amount, got {}",
                        amount
                    ));
                }
                check_bounds(minimum, maximum)
            }
            Uncertainty::Uniform { minimum, maximum } => check_range(minimum, maximum),
            Uncertainty::Triangular { minimum, maximum } => {
                check_range(minimum, maximum)?;
                if amount < minimum || amount > maximum {
                    return Err(format!(
                        "triangular mode {} lies outside [{}, {}]",
                        amount, minimum, maximum
                    ));
                }
                Ok(())
            }
        }
    }

    /// Draw `n` samples around `amount`.
    ///
    /// Truncated normal and lognormal draws are resampled until they fall
    /// inside their bounds, giving up after `max_attempts` tries for one sample.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        amount: f64,
        n: usize,
        rng: &mut R,
        max_attempts: usize,
    ) -> Result<Array1<f64>, String> {
        self.validate(amount)?;

        match *self {
            Uncertainty::Fixed => Ok(Array1::from_elem(n, amount)),
            Uncertainty::Normal {
                scale,
                minimum,
                maximum,
            } => {
                let normal = Normal::new(amount, scale).map_err(|e| e.to_string())?;
                draw_bounded(&normal, n, rng, minimum, maximum, max_attempts)
            }
            Uncertainty::Lognormal {
                scale,
                minimum,
                maximum,
            } => {
                let lognormal = LogNormal::new(amount.ln(), scale).map_err(|e| e.to_string())?;
                draw_bounded(&lognormal, n, rng, minimum, maximum, max_attempts)
            }
            Uncertainty::Uniform { minimum, maximum } => {
                let uniform = Uniform::new(minimum, maximum);
                Ok(Array1::from_iter((0..n).map(|_| uniform.sample(rng))))
            }
            Uncertainty::Triangular { minimum, maximum } => {
                let triangular =
                    Triangular::new(minimum, maximum, amount).map_err(|e| e.to_string())?;
                Ok(Array1::from_iter((0..n).map(|_| triangular.sample(rng))))
            }
        }
    }
}

fn check_scale(scale: f64) -> Result<(), String> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        Err(format!("scale must be positive and finite, got {}", scale))
    }
}

/// Optional bounds must be finite; leave a side unset to leave it open
fn check_bounds(minimum: Option<f64>, maximum: Option<f64>) -> Result<(), String> {
    if let Some(bound) = minimum.into_iter().chain(maximum).find(|b| !b.is_finite()) {
        return Err(format!("bound {} is not finite", bound));
    }
    match (minimum, maximum) {
        (Some(min), Some(max)) if min >= max => Err(format!(
            "minimum {} must be smaller than maximum {}",
            min, max
        )),
        _ => Ok(()),
    }
}

/// A closed range also needs a width that fits in an `f64`
fn check_range(minimum: f64, maximum: f64) -> Result<(), String> {
    check_bounds(Some(minimum), Some(maximum))?;
    if (maximum - minimum).is_finite() {
        Ok(())
    } else {
        Err(format!(
            "range [{}, {}] is too wide to sample",
            minimum, maximum
        ))
    }
}

fn draw_bounded<D, R>(
    dist: &D,
    n: usize,
    rng: &mut R,
    minimum: Option<f64>,
    maximum: Option<f64>,
    max_attempts: usize,
) -> Result<Array1<f64>, String>
where
    D: Distribution<f64>,
    R: Rng + ?Sized,
{
    let lower = minimum.unwrap_or(f64::NEG_INFINITY);
    let upper = maximum.unwrap_or(f64::INFINITY);

    let mut samples = Vec::with_capacity(n);
    for _ in 0..n {
        let mut accepted = None;
        for _ in 0..max_attempts.max(1) {
            let draw = dist.sample(rng);
            if draw >= lower && draw <= upper {
                accepted = Some(draw);
                break;
            }
        }
        match accepted {
            Some(draw) => samples.push(draw),
            None => {
                return Err(format!(
                    "no draw within [{}, {}] after {} attempts",
                    lower, upper, max_attempts
                ))
            }
        }
    }
    Ok(Array1::from_vec(samples))
}
