//! Differential Privacy Core Module
//!
//! The pieces the oracle needs from a DP library, kept behind their own
//! boundary:
//! - Labelled parameter checks with non-fatal advisories
//! - Laplace mechanism for (ε, 0)-DP
//! - Gaussian mechanism for (ε, δ)-DP
//! - Noise variant selection, resolved once per configuration
//!
//! # Mathematical Guarantees
//!
//! For any two neighboring datasets D and D' and any output set S:
//!
//! P[M(D) ∈ S] ≤ e^ε · P[M(D') ∈ S] + δ
//!
//! The oracle in [`crate::divergence`] tests exactly this inequality on
//! bucketized samples.

pub mod gaussian;
pub mod laplace;
pub mod noise;
pub mod validation;

pub use gaussian::GaussianMechanism;
pub use laplace::LaplaceMechanism;
pub use noise::{Noise, NoiseKind};
pub use validation::{Advisory, DpValidationError};
