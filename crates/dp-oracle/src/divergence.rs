//! Empirical (ε, δ) divergence test
//!
//! For neighboring datasets D and D' an (ε, δ)-DP mechanism M satisfies, for
//! every output set S,
//!
//! ```text
//! P[M(D) ∈ S] ≤ e^ε · P[M(D') ∈ S] + δ
//! ```
//!
//! The tightest S is the set of buckets where the left side dominates, so on a
//! histogram the inequality reduces to the violation mass
//!
//! ```text
//! V(A, B) = Σ_i max(0, p_A[i] − e^ε · p_B[i]) ≤ δ
//! ```
//!
//! The neighbor relation is symmetric, so both V(A, B) and V(B, A) are
//! checked. Empirical probabilities differ from the true ones by sampling
//! noise that shrinks as the number of samples grows; `delta_tolerance`
//! absorbs that noise and is not part of the privacy claim.

use crate::bucketize::Histogram;

/// Violation mass of `a` over `b`: Σ max(0, p_a[i] − e^ε · p_b[i]).
///
/// Histograms of different lengths are compared as if the shorter one were
/// padded with empty buckets.
pub fn violation_mass(a: &Histogram, b: &Histogram, epsilon: f64) -> f64 {
    let factor = epsilon.exp();
    let buckets = a.number_of_buckets().max(b.number_of_buckets());

    (0..buckets)
        .map(|i| (a.probability(i) - factor * b.probability(i)).max(0.0))
        .sum()
}

/// Whether `a` and `b` are consistent with an (ε, δ)-indistinguishable
/// mechanism, allowing `delta_tolerance` of extra mass for sampling noise.
///
/// Both directions must pass.
pub fn verify_approximate_dp(
    a: &Histogram,
    b: &Histogram,
    epsilon: f64,
    delta: f64,
    delta_tolerance: f64,
) -> bool {
    let allowed = delta + delta_tolerance;
    violation_mass(a, b, epsilon) <= allowed && violation_mass(b, a, epsilon) <= allowed
}
