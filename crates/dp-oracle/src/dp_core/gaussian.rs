//! Gaussian Mechanism for Differential Privacy
//!
//! For a query with L2 sensitivity Δ₂ the Gaussian mechanism adds
//! N(0, σ²) noise with
//!
//! ```text
//! σ = Δ₂ · √(2 ln(1.25/δ)) / ε
//! ```
//!
//! giving (ε, δ)-differential privacy. With L0 sensitivity Δ₀ and L∞
//! sensitivity Δ∞, Δ₂ is bounded by √Δ₀ · Δ∞.
//!
//! # Box-Muller Transform
//!
//! ```text
//! Given U₁, U₂ ~ Uniform(0, 1):
//! Z = √(-2 ln U₁) · cos(2π U₂)
//! ```

use super::validation::{
    check_delta_strict, check_epsilon_strict, check_l0_sensitivity, check_linf_sensitivity,
    DpValidationError,
};
use rand::Rng;

/// Gaussian mechanism for (ε, δ)-differential privacy
pub struct GaussianMechanism;

impl GaussianMechanism {
    /// Sample from N(0, 1) using the Box-Muller transform
    pub fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
        // 1 - [0, 1) lies in (0, 1], so ln(u1) is finite
        let u1 = 1.0 - rng.gen::<f64>();
        let u2 = rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// Sample from N(0, σ²)
    pub fn sample<R: Rng + ?Sized>(sigma: f64, rng: &mut R) -> f64 {
        Self::sample_standard_normal(rng) * sigma
    }

    /// Add N(0, σ²) noise to a value
    pub fn add_noise<R: Rng + ?Sized>(value: f64, sigma: f64, rng: &mut R) -> f64 {
        value + Self::sample(sigma, rng)
    }

    /// Compute σ for (ε, δ)-DP from the contribution bounds
    pub fn compute_sigma(
        label: &str,
        l0_sensitivity: i64,
        linf_sensitivity: f64,
        epsilon: f64,
        delta: f64,
    ) -> Result<f64, DpValidationError> {
        check_epsilon_strict(label, epsilon)?;
        check_delta_strict(label, delta)?;
        check_l0_sensitivity(label, l0_sensitivity)?;
        check_linf_sensitivity(label, linf_sensitivity)?;

        let l2_sensitivity = (l0_sensitivity as f64).sqrt() * linf_sensitivity;
        Ok(l2_sensitivity * (2.0 * (1.25 / delta).ln()).sqrt() / epsilon)
    }
}
