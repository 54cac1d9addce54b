//! Noise variant selection
//!
//! The test-case input names a variant by tag ([`NoiseKind`]). It is resolved
//! once, at configuration time, into a calibrated [`Noise`] whose only
//! capability is drawing noise. Nothing re-dispatches on the tag per sample.

use super::gaussian::GaussianMechanism;
use super::laplace::LaplaceMechanism;
use super::validation::{check_no_delta, DpValidationError};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Noise distribution selector as it appears in test-case files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoiseKind {
    /// Laplace noise, (ε, 0)-DP
    Laplace,
    /// Gaussian noise, (ε, δ)-DP with δ > 0
    Gaussian,
}

impl std::fmt::Display for NoiseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoiseKind::Laplace => write!(f, "Laplace"),
            NoiseKind::Gaussian => write!(f, "Gaussian"),
        }
    }
}

/// Calibrated noise, ready to draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Noise {
    Laplace { scale: f64 },
    Gaussian { sigma: f64 },
}

impl Noise {
    /// Resolve a noise variant against the privacy parameters.
    ///
    /// Laplace requires δ = 0 (a missing δ counts as 0); Gaussian requires
    /// 0 < δ < 1.
    pub fn calibrate(
        label: &str,
        kind: NoiseKind,
        l0_sensitivity: i64,
        linf_sensitivity: f64,
        epsilon: f64,
        delta: Option<f64>,
    ) -> Result<Self, DpValidationError> {
        let delta = delta.unwrap_or(0.0);
        match kind {
            NoiseKind::Laplace => {
                check_no_delta(label, delta)?;
                let scale =
                    LaplaceMechanism::compute_scale(label, l0_sensitivity, linf_sensitivity, epsilon)?;
                Ok(Noise::Laplace { scale })
            }
            NoiseKind::Gaussian => {
                let sigma = GaussianMechanism::compute_sigma(
                    label,
                    l0_sensitivity,
                    linf_sensitivity,
                    epsilon,
                    delta,
                )?;
                Ok(Noise::Gaussian { sigma })
            }
        }
    }

    pub fn kind(&self) -> NoiseKind {
        match self {
            Noise::Laplace { .. } => NoiseKind::Laplace,
            Noise::Gaussian { .. } => NoiseKind::Gaussian,
        }
    }

    /// Draw one noise value
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Noise::Laplace { scale } => LaplaceMechanism::sample(scale, rng),
            Noise::Gaussian { sigma } => GaussianMechanism::sample(sigma, rng),
        }
    }

    pub fn add_noise<R: Rng + ?Sized>(&self, value: f64, rng: &mut R) -> f64 {
        value + self.sample(rng)
    }
}
