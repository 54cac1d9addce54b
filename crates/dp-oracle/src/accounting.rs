//! Empirical privacy accounting
//!
//! The divergence test answers yes or no for one (ε, δ). When a trial fails
//! it is more useful to know what the samples actually support. For two
//! empirical distributions the hockey-stick divergence
//!
//! ```text
//! δ(ε) = max(V(A, B), V(B, A))
//! ```
//!
//! is the smallest δ they are indistinguishable with at ε. It is
//! non-increasing in ε, so the smallest ε supported at a given δ is found by
//! binary search over that curve.

use std::fmt;

use serde::Serialize;

use crate::bucketize::Histogram;
use crate::divergence::violation_mass;
use crate::dp_core::validation::{check_delta_inclusive, check_epsilon, DpValidationError};

/// Default acceptable error on a binary search result
pub const DEFAULT_SEARCH_TOLERANCE: f64 = 1e-7;

/// A validated (ε, δ) pair: ε finite and nonnegative, δ in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DifferentialPrivacyParameters {
    epsilon: f64,
    delta: f64,
}

impl DifferentialPrivacyParameters {
    pub fn new(epsilon: f64, delta: f64) -> Result<Self, DpValidationError> {
        check_epsilon("DifferentialPrivacyParameters", epsilon)?;
        check_delta_inclusive("DifferentialPrivacyParameters", delta)?;
        Ok(DifferentialPrivacyParameters { epsilon, delta })
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }
}

impl fmt::Display for DifferentialPrivacyParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(ε = {}, δ = {})", self.epsilon, self.delta)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Monotonicity {
    Increasing,
    Decreasing,
}

/// Range and precision of a one-dimensional binary search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinarySearchParameters {
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// Positive starting point, doubled until it brackets the answer. Needed
    /// when `upper_bound` is infinite.
    pub initial_guess: Option<f64>,
    pub tolerance: f64,
    /// Search over integers; the tolerance is then 1
    pub discrete: bool,
}

impl BinarySearchParameters {
    pub fn new(lower_bound: f64, upper_bound: f64) -> Self {
        BinarySearchParameters {
            lower_bound,
            upper_bound,
            initial_guess: None,
            tolerance: DEFAULT_SEARCH_TOLERANCE,
            discrete: false,
        }
    }

    pub fn with_initial_guess(mut self, initial_guess: f64) -> Self {
        self.initial_guess = Some(initial_guess);
        self
    }

    pub fn over_integers(mut self) -> Self {
        self.discrete = true;
        self
    }
}

/// Invert a monotone function by binary search.
///
/// Returns x with `func(x) <= value`, within the search tolerance of the
/// smallest such x for a decreasing `func` or the largest such x for an
/// increasing one. `None` when no such x lies in the search range, or the
/// range stays unbounded.
pub fn inverse_monotone_function<F>(
    func: F,
    value: f64,
    search: &BinarySearchParameters,
    monotonicity: Monotonicity,
) -> Option<f64>
where
    F: Fn(f64) -> f64,
{
    let mut lower = search.lower_bound;
    let mut upper = search.upper_bound;

    // True when the answer lies above x
    let answer_above = |x: f64| match monotonicity {
        Monotonicity::Increasing => func(x) <= value,
        Monotonicity::Decreasing => func(x) > value,
    };

    match monotonicity {
        Monotonicity::Increasing if lower.is_finite() && func(lower) > value => return None,
        Monotonicity::Decreasing if upper.is_finite() && func(upper) > value => return None,
        _ => {}
    }

    if let Some(mut guess) = search.initial_guess.filter(|guess| *guess > 0.0) {
        while guess < upper && answer_above(guess) {
            lower = guess;
            guess *= 2.0;
        }
        upper = upper.min(guess);
    }

    if !lower.is_finite() || !upper.is_finite() {
        return None;
    }

    let tolerance = if search.discrete { 1.0 } else { search.tolerance };
    while upper - lower > tolerance {
        let mid = if search.discrete {
            ((upper + lower) / 2.0).floor()
        } else {
            (upper + lower) / 2.0
        };
        // Adjacent floats: the range cannot shrink any further
        if mid <= lower || mid >= upper {
            break;
        }
        if answer_above(mid) {
            lower = mid;
        } else {
            upper = mid;
        }
    }

    Some(match monotonicity {
        Monotonicity::Increasing => lower,
        Monotonicity::Decreasing => upper,
    })
}

/// Smallest δ the two histograms are indistinguishable with at `epsilon`.
///
/// This is the larger violation mass of the two directions.
pub fn empirical_delta(a: &Histogram, b: &Histogram, epsilon: f64) -> f64 {
    violation_mass(a, b, epsilon).max(violation_mass(b, a, epsilon))
}

/// Largest |ln(p_a / p_b)| over buckets both histograms populate. Past it
/// δ(ε) only counts mass that one side never produces.
fn largest_log_ratio(a: &Histogram, b: &Histogram) -> f64 {
    let buckets = a.number_of_buckets().max(b.number_of_buckets());
    (0..buckets)
        .filter_map(|i| {
            let (p, q) = (a.probability(i), b.probability(i));
            (p > 0.0 && q > 0.0).then(|| (p / q).ln().abs())
        })
        .fold(0.0, f64::max)
}

/// Smallest ε at which the histograms are (ε, δ)-indistinguishable, within
/// [`DEFAULT_SEARCH_TOLERANCE`].
///
/// `None` when mass that one side never produces already exceeds `delta`:
/// no finite ε covers it.
pub fn empirical_epsilon(a: &Histogram, b: &Histogram, delta: f64) -> Option<f64> {
    if empirical_delta(a, b, 0.0) <= delta {
        return Some(0.0);
    }
    let upper = largest_log_ratio(a, b) + DEFAULT_SEARCH_TOLERANCE;
    inverse_monotone_function(
        |epsilon| empirical_delta(a, b, epsilon),
        delta,
        &BinarySearchParameters::new(0.0, upper),
        Monotonicity::Decreasing,
    )
}

/// The tightest (ε, δ) pair the histograms support at `delta`
pub fn empirical_privacy(
    a: &Histogram,
    b: &Histogram,
    delta: f64,
) -> Option<DifferentialPrivacyParameters> {
    empirical_epsilon(a, b, delta)
        .and_then(|epsilon| DifferentialPrivacyParameters::new(epsilon, delta).ok())
}
