//! Laplace Mechanism for Differential Privacy
//!
//! For a query with L0 sensitivity Δ₀ and L∞ sensitivity Δ∞ the L1
//! sensitivity is bounded by Δ₀·Δ∞, and adding Laplace noise with scale
//! b = Δ₀·Δ∞/ε gives (ε, 0)-differential privacy:
//!
//! ```text
//! M(D) = f(D) + Lap(0, b)
//! p(x) = (1/2b) * e^(-|x|/b)
//! ```
//!
//! # Inverse CDF Sampling
//!
//! ```text
//! F^(-1)(u) = -b * sign(u - 0.5) * ln(1 - 2|u - 0.5|)
//! ```
//!
//! For u ~ Uniform(0, 1), F^(-1)(u) ~ Laplace(0, b). Randomness always comes
//! from the caller's generator so that each trial can own an independent
//! stream.

use super::validation::{
    check_epsilon_strict, check_l0_sensitivity, check_linf_sensitivity, DpValidationError,
};
use rand::Rng;

/// Laplace mechanism for (ε, 0)-differential privacy
pub struct LaplaceMechanism;

impl LaplaceMechanism {
    /// Sample from Laplace(0, scale)
    ///
    /// For U ~ Uniform(-0.5, 0.5), we compute
    /// X = -scale * sign(U) * ln(1 - 2|U|).
    /// `scale` must be positive; [`LaplaceMechanism::compute_scale`] guarantees it.
    pub fn sample<R: Rng + ?Sized>(scale: f64, rng: &mut R) -> f64 {
        let u = Self::centered_uniform(rng);
        -scale * u.signum() * (1.0 - 2.0 * u.abs()).ln()
    }

    /// Add Laplace noise with the given scale to a value
    pub fn add_noise<R: Rng + ?Sized>(value: f64, scale: f64, rng: &mut R) -> f64 {
        value + Self::sample(scale, rng)
    }

    /// Compute the scale parameter b = Δ₀·Δ∞ / ε
    pub fn compute_scale(
        label: &str,
        l0_sensitivity: i64,
        linf_sensitivity: f64,
        epsilon: f64,
    ) -> Result<f64, DpValidationError> {
        check_epsilon_strict(label, epsilon)?;
        check_l0_sensitivity(label, l0_sensitivity)?;
        check_linf_sensitivity(label, linf_sensitivity)?;
        Ok(l0_sensitivity as f64 * linf_sensitivity / epsilon)
    }

    /// Var(Lap(0, b)) = 2b²
    pub fn variance(scale: f64) -> f64 {
        2.0 * scale * scale
    }

    /// Uniform in (-0.5, 0.5), excluding the endpoints and exactly 0
    fn centered_uniform<R: Rng + ?Sized>(rng: &mut R) -> f64 {
        loop {
            let centered = rng.gen::<f64>() - 0.5;
            if centered > -0.5 && centered.abs() > 1e-15 {
                return centered;
            }
        }
    }
}
