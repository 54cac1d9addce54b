//! Input Validation for Differential Privacy Parameters
//!
//! A family of independent, labelled checks. Every check either succeeds or
//! returns a [`DpValidationError`] naming the label, the parameter, its value
//! and the violated constraint. The bounds checks can additionally succeed
//! with an [`Advisory`]: a non-fatal condition (degenerate bounds) that the
//! caller may surface, log or ignore.
//!
//! # Parameter Constraints
//!
//! ## Epsilon (ε)
//! - Non-strict: ε ≥ 0 and finite
//! - Strict: ε > 0 and finite
//! - Very strict: ε ≥ 2⁻⁵⁰ and finite
//!
//! ## Delta (δ)
//! - Non-strict: δ ∈ [0, 1)
//! - Strict: δ ∈ (0, 1)
//! - δ = 0 gives pure ε-DP (Laplace mechanism)
//!
//! ## Sensitivity
//! - L0 (partitions an individual contributes to): strictly positive
//! - L∞ (contributions per partition): strictly positive and finite
//!
//! ## Tree shape
//! - Height ≥ 1, branching factor ≥ 2, and branching^height leaves must fit
//!   under [`MAX_TREE_LEAVES`]

use serde::Serialize;

/// Error type for DP parameter validation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DpValidationError {
    /// Epsilon is invalid
    #[error("{label}: Epsilon is {value}, {reason}")]
    InvalidEpsilon {
        label: String,
        value: f64,
        reason: String,
    },
    /// Delta is invalid
    #[error("{label}: Delta is {value:e}, {reason}")]
    InvalidDelta {
        label: String,
        value: f64,
        reason: String,
    },
    /// L0 or L∞ sensitivity is invalid
    #[error("{label}: {parameter} is {value}, {reason}")]
    InvalidSensitivity {
        label: String,
        parameter: String,
        value: String,
        reason: String,
    },
    /// Domain bounds are invalid
    #[error("{label}: {reason}")]
    InvalidBounds { label: String, reason: String },
    /// Any other parameter (tree shape, confidence level, test sizes)
    #[error("{label}: {parameter} is {value}, {reason}")]
    InvalidParameter {
        label: String,
        parameter: String,
        value: String,
        reason: String,
    },
}

/// A non-fatal condition detected while validating parameters.
///
/// Computation proceeds, usually with degraded utility.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Advisory {
    /// Lower bound equals upper bound: every entry is clamped to that value
    DegenerateBounds { label: String, bound: String },
}

impl Advisory {
    /// Whether both describe the same condition, whichever check raised them
    pub fn same_condition(&self, other: &Advisory) -> bool {
        match (self, other) {
            (
                Advisory::DegenerateBounds { bound, .. },
                Advisory::DegenerateBounds { bound: other, .. },
            ) => bound == other,
        }
    }
}

impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Advisory::DegenerateBounds { label, bound } => write!(
                f,
                "{}: Lower bound is equal to upper bound: all added elements will be clamped to {}",
                label, bound
            ),
        }
    }
}

/// Smallest epsilon accepted by [`check_epsilon_very_strict`] (2⁻⁵⁰)
pub const MIN_EPSILON_VERY_STRICT: f64 = 8.881_784_197_001_252e-16;

/// Largest number of leaves a quantile tree may have
pub const MAX_TREE_LEAVES: usize = 1 << 24;

fn invalid_epsilon(label: &str, epsilon: f64, reason: &str) -> DpValidationError {
    DpValidationError::InvalidEpsilon {
        label: label.to_string(),
        value: epsilon,
        reason: reason.to_string(),
    }
}

fn invalid_delta(label: &str, delta: f64, reason: &str) -> DpValidationError {
    DpValidationError::InvalidDelta {
        label: label.to_string(),
        value: delta,
        reason: reason.to_string(),
    }
}

fn invalid_parameter(
    label: &str,
    parameter: &str,
    value: impl std::fmt::Display,
    reason: &str,
) -> DpValidationError {
    DpValidationError::InvalidParameter {
        label: label.to_string(),
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn invalid_bounds(label: &str, reason: String) -> DpValidationError {
    DpValidationError::InvalidBounds {
        label: label.to_string(),
        reason,
    }
}

fn degenerate(label: &str, bound: impl std::fmt::Display) -> Advisory {
    Advisory::DegenerateBounds {
        label: label.to_string(),
        bound: bound.to_string(),
    }
}

/// Fails if ε is +∞, NaN, or less than 2⁻⁵⁰
pub fn check_epsilon_very_strict(label: &str, epsilon: f64) -> Result<(), DpValidationError> {
    if epsilon < MIN_EPSILON_VERY_STRICT || epsilon.is_infinite() || epsilon.is_nan() {
        return Err(invalid_epsilon(
            label,
            epsilon,
            "should be at least 2^-50 (and cannot be infinity or NaN)",
        ));
    }
    Ok(())
}

/// Fails if ε is nonpositive, +∞ or NaN
pub fn check_epsilon_strict(label: &str, epsilon: f64) -> Result<(), DpValidationError> {
    if epsilon <= 0.0 || epsilon.is_infinite() || epsilon.is_nan() {
        return Err(invalid_epsilon(
            label,
            epsilon,
            "should be strictly positive (and cannot be infinity or NaN)",
        ));
    }
    Ok(())
}

/// Fails if ε is strictly negative, +∞ or NaN
pub fn check_epsilon(label: &str, epsilon: f64) -> Result<(), DpValidationError> {
    if epsilon < 0.0 || epsilon.is_infinite() || epsilon.is_nan() {
        return Err(invalid_epsilon(
            label,
            epsilon,
            "should be nonnegative (and cannot be infinity or NaN)",
        ));
    }
    Ok(())
}

/// Fails if δ is NaN, negative, or at least 1
pub fn check_delta(label: &str, delta: f64) -> Result<(), DpValidationError> {
    if delta.is_nan() {
        return Err(invalid_delta(label, delta, "cannot be NaN"));
    }
    if delta < 0.0 {
        return Err(invalid_delta(label, delta, "cannot be negative"));
    }
    if delta >= 1.0 {
        return Err(invalid_delta(label, delta, "should be strictly less than 1"));
    }
    Ok(())
}

/// Fails if δ is NaN, nonpositive, or at least 1
pub fn check_delta_strict(label: &str, delta: f64) -> Result<(), DpValidationError> {
    if delta.is_nan() {
        return Err(invalid_delta(label, delta, "cannot be NaN"));
    }
    if delta <= 0.0 {
        return Err(invalid_delta(label, delta, "should be strictly positive"));
    }
    if delta >= 1.0 {
        return Err(invalid_delta(label, delta, "should be strictly less than 1"));
    }
    Ok(())
}

/// Fails if δ is NaN or outside [0, 1]
pub fn check_delta_inclusive(label: &str, delta: f64) -> Result<(), DpValidationError> {
    if delta.is_nan() {
        return Err(invalid_delta(label, delta, "cannot be NaN"));
    }
    if !(0.0..=1.0).contains(&delta) {
        return Err(invalid_delta(label, delta, "should be between 0 and 1"));
    }
    Ok(())
}

/// Fails if δ is non-zero
pub fn check_no_delta(label: &str, delta: f64) -> Result<(), DpValidationError> {
    if delta != 0.0 {
        return Err(invalid_delta(label, delta, "should be 0"));
    }
    Ok(())
}

/// Fails if the L0 sensitivity is nonpositive
pub fn check_l0_sensitivity(label: &str, l0_sensitivity: i64) -> Result<(), DpValidationError> {
    if l0_sensitivity <= 0 {
        return Err(DpValidationError::InvalidSensitivity {
            label: label.to_string(),
            parameter: "L0Sensitivity".to_string(),
            value: l0_sensitivity.to_string(),
            reason: "should be strictly positive".to_string(),
        });
    }
    Ok(())
}

/// Fails if the L∞ sensitivity is nonpositive, +∞ or NaN
pub fn check_linf_sensitivity(label: &str, linf_sensitivity: f64) -> Result<(), DpValidationError> {
    if linf_sensitivity <= 0.0 || linf_sensitivity.is_infinite() || linf_sensitivity.is_nan() {
        return Err(DpValidationError::InvalidSensitivity {
            label: label.to_string(),
            parameter: "LInfSensitivity".to_string(),
            value: linf_sensitivity.to_string(),
            reason: "should be strictly positive (and cannot be infinity or NaN)".to_string(),
        });
    }
    Ok(())
}

/// Fails if lower > upper or either bound is `i64::MIN` (sensitivity overflow).
///
/// Equal bounds are accepted with an advisory.
pub fn check_bounds_i64(
    label: &str,
    lower: i64,
    upper: i64,
) -> Result<Option<Advisory>, DpValidationError> {
    if lower == i64::MIN || upper == i64::MIN {
        return Err(invalid_bounds(
            label,
            format!(
                "lower ({}) and upper ({}) must be strictly larger than i64::MIN to avoid sensitivity overflow",
                lower, upper
            ),
        ));
    }
    check_bounds_i64_ignore_overflows(label, lower, upper)
}

/// Like [`check_bounds_i64`] but ignores sensitivity overflow
pub fn check_bounds_i64_ignore_overflows(
    label: &str,
    lower: i64,
    upper: i64,
) -> Result<Option<Advisory>, DpValidationError> {
    if lower > upper {
        return Err(invalid_bounds(
            label,
            format!("Upper ({}) should be larger than Lower ({})", upper, lower),
        ));
    }
    if lower == upper {
        return Ok(Some(degenerate(label, upper)));
    }
    Ok(None)
}

/// Fails if either bound is NaN or ±∞, or if lower > upper.
///
/// Equal bounds are accepted with an advisory.
pub fn check_bounds_f64(
    label: &str,
    lower: f64,
    upper: f64,
) -> Result<Option<Advisory>, DpValidationError> {
    if lower.is_infinite() {
        return Err(invalid_bounds(label, "lower can't be infinity".to_string()));
    }
    if upper.is_infinite() {
        return Err(invalid_bounds(label, "upper can't be infinity".to_string()));
    }
    check_bounds_f64_ignore_overflows(label, lower, upper)
}

/// Like [`check_bounds_f64`] but accepts infinite bounds
pub fn check_bounds_f64_ignore_overflows(
    label: &str,
    lower: f64,
    upper: f64,
) -> Result<Option<Advisory>, DpValidationError> {
    if lower.is_nan() {
        return Err(invalid_bounds(label, "lower can't be NaN".to_string()));
    }
    if upper.is_nan() {
        return Err(invalid_bounds(label, "upper can't be NaN".to_string()));
    }
    if lower > upper {
        return Err(invalid_bounds(
            label,
            format!("Upper ({}) should be larger than Lower ({})", upper, lower),
        ));
    }
    if lower == upper {
        return Ok(Some(degenerate(label, upper)));
    }
    Ok(None)
}

/// Fails if either bound is NaN or does not fit in an `i64`, then applies
/// [`check_bounds_i64`] to the truncated values.
pub fn check_bounds_f64_as_i64(
    label: &str,
    lower: f64,
    upper: f64,
) -> Result<Option<Advisory>, DpValidationError> {
    if lower.is_nan() {
        return Err(invalid_bounds(label, "Lower must not be NaN".to_string()));
    }
    if upper.is_nan() {
        return Err(invalid_bounds(label, "Upper must not be NaN".to_string()));
    }
    let max_int = i64::MAX as f64;
    let min_int = i64::MIN as f64;
    if lower < min_int || lower > max_int {
        return Err(invalid_bounds(
            label,
            format!("Lower should be within i64::MIN and i64::MAX bounds, got {}", lower),
        ));
    }
    if upper < min_int || upper > max_int {
        return Err(invalid_bounds(
            label,
            format!("Upper should be within i64::MIN and i64::MAX bounds, got {}", upper),
        ));
    }
    check_bounds_i64(label, lower as i64, upper as i64)
}

/// Fails if max partitions contributed is negative
pub fn check_max_partitions_contributed(
    label: &str,
    max_partitions_contributed: i64,
) -> Result<(), DpValidationError> {
    if max_partitions_contributed < 0 {
        return Err(invalid_parameter(
            label,
            "MaxPartitionsContributed",
            max_partitions_contributed,
            "should not be negative",
        ));
    }
    Ok(())
}

/// Fails if the confidence level is outside [0, 1], NaN or infinite
pub fn check_confidence_level(label: &str, confidence_level: f64) -> Result<(), DpValidationError> {
    if !(0.0..=1.0).contains(&confidence_level) {
        return Err(invalid_parameter(
            label,
            "confidenceLevel",
            confidence_level,
            "should be between 0 and 1 (and cannot be NaN or Infinity)",
        ));
    }
    Ok(())
}

/// Fails if alpha is outside the open interval (0, 1), NaN or infinite
pub fn check_alpha(label: &str, alpha: f64) -> Result<(), DpValidationError> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(invalid_parameter(
            label,
            "alpha",
            alpha,
            "should be strictly between 0 and 1 (and cannot be NaN or Infinity)",
        ));
    }
    Ok(())
}

/// Fails if lower and upper are equal
pub fn check_bounds_not_equal(label: &str, lower: f64, upper: f64) -> Result<(), DpValidationError> {
    if lower == upper {
        return Err(invalid_bounds(
            label,
            format!("lower and upper are both {}, they should not be equal", lower),
        ));
    }
    Ok(())
}

/// Fails if the tree height is less than 1
pub fn check_tree_height(label: &str, tree_height: i64) -> Result<(), DpValidationError> {
    if tree_height < 1 {
        return Err(invalid_parameter(label, "treeHeight", tree_height, "should be at least 1"));
    }
    Ok(())
}

/// Fails if the branching factor is less than 2
pub fn check_branching_factor(label: &str, branching_factor: i64) -> Result<(), DpValidationError> {
    if branching_factor < 2 {
        return Err(invalid_parameter(
            label,
            "branchingFactor",
            branching_factor,
            "should be at least 2",
        ));
    }
    Ok(())
}

/// Checks height and branching factor, then returns the number of leaves.
///
/// Fails if branching^height overflows or exceeds [`MAX_TREE_LEAVES`].
pub fn check_tree_shape(
    label: &str,
    tree_height: i64,
    branching_factor: i64,
) -> Result<usize, DpValidationError> {
    check_tree_height(label, tree_height)?;
    check_branching_factor(label, branching_factor)?;

    let leaves = u32::try_from(tree_height)
        .ok()
        .and_then(|h| usize::try_from(branching_factor).ok().and_then(|b| b.checked_pow(h)))
        .filter(|&n| n <= MAX_TREE_LEAVES);

    leaves.ok_or_else(|| {
        invalid_parameter(
            label,
            "branchingFactor^treeHeight",
            format!("{}^{}", branching_factor, tree_height),
            &format!("should not exceed {} leaves", MAX_TREE_LEAVES),
        )
    })
}

/// Fails if the histogram would have no buckets
pub fn check_number_of_buckets(label: &str, number_of_buckets: usize) -> Result<(), DpValidationError> {
    if number_of_buckets == 0 {
        return Err(invalid_parameter(label, "numberOfBuckets", 0, "should be strictly positive"));
    }
    Ok(())
}

/// Fails if a trial would draw no samples
pub fn check_number_of_samples(label: &str, number_of_samples: usize) -> Result<(), DpValidationError> {
    if number_of_samples == 0 {
        return Err(invalid_parameter(label, "numberOfSamples", 0, "should be strictly positive"));
    }
    Ok(())
}

/// Fails if a ballot would cast no votes
pub fn check_number_of_votes(label: &str, number_of_votes: usize) -> Result<(), DpValidationError> {
    if number_of_votes == 0 {
        return Err(invalid_parameter(label, "numberOfVotes", 0, "should be strictly positive"));
    }
    Ok(())
}

/// Fails if the delta tolerance is negative, NaN or infinite
pub fn check_delta_tolerance(label: &str, delta_tolerance: f64) -> Result<(), DpValidationError> {
    if !(delta_tolerance >= 0.0 && delta_tolerance.is_finite()) {
        return Err(invalid_parameter(
            label,
            "deltaTolerance",
            delta_tolerance,
            "should be nonnegative and finite",
        ));
    }
    Ok(())
}

/// Fails if a quantile rank is outside [0, 1] or NaN
pub fn check_rank(label: &str, rank: f64) -> Result<(), DpValidationError> {
    if !(0.0..=1.0).contains(&rank) {
        return Err(invalid_parameter(label, "rank", rank, "should be between 0 and 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epsilon_checks() {
        for bad in [-1.0, f64::INFINITY, f64::NAN] {
            assert!(check_epsilon("test", bad).is_err());
            assert!(check_epsilon_strict("test", bad).is_err());
            assert!(check_epsilon_very_strict("test", bad).is_err());
        }

        // ε = 0 passes only the non-strict check
        assert!(check_epsilon("test", 0.0).is_ok());
        assert!(check_epsilon_strict("test", 0.0).is_err());

        assert!(check_epsilon_strict("test", 1e-20).is_ok());
        assert!(check_epsilon_very_strict("test", 1e-20).is_err());
        assert!(check_epsilon_very_strict("test", 0.1).is_ok());
    }

    #[test]
    fn test_delta_checks() {
        for bad in [f64::NAN, -0.001, 1.0, 1.5] {
            assert!(check_delta("test", bad).is_err());
            assert!(check_delta_strict("test", bad).is_err());
        }

        // δ = 0 passes only the non-strict check
        assert!(check_delta("test", 0.0).is_ok());
        assert!(check_delta_strict("test", 0.0).is_err());

        assert!(check_delta_strict("test", 1e-5).is_ok());
        assert!(check_no_delta("test", 0.0).is_ok());
        assert!(check_no_delta("test", 1e-5).is_err());

        // The inclusive check admits both endpoints
        assert!(check_delta_inclusive("test", 0.0).is_ok());
        assert!(check_delta_inclusive("test", 1.0).is_ok());
        for bad in [f64::NAN, -0.1, 1.1] {
            assert!(check_delta_inclusive("test", bad).is_err());
        }
    }

    #[test]
    fn test_error_message_names_parameter() {
        let err = check_epsilon_strict("BoundedQuantiles", -2.0).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("BoundedQuantiles"), "{}", msg);
        assert!(msg.contains("Epsilon is -2"), "{}", msg);
        assert!(msg.contains("strictly positive"), "{}", msg);
    }

    #[test]
    fn test_sensitivity_checks() {
        assert!(check_l0_sensitivity("test", 1).is_ok());
        assert!(check_l0_sensitivity("test", 0).is_err());
        assert!(check_linf_sensitivity("test", 0.5).is_ok());
        assert!(check_linf_sensitivity("test", 0.0).is_err());
        assert!(check_linf_sensitivity("test", f64::INFINITY).is_err());
        assert!(check_linf_sensitivity("test", f64::NAN).is_err());
        assert!(check_max_partitions_contributed("test", 0).is_ok());
        assert!(check_max_partitions_contributed("test", -1).is_err());
    }

    #[test]
    fn test_bounds_f64() {
        assert_eq!(check_bounds_f64("test", 0.0, 100.0), Ok(None));
        assert!(check_bounds_f64("test", 10.0, 1.0).is_err());
        assert!(check_bounds_f64("test", f64::NAN, 1.0).is_err());
        assert!(check_bounds_f64("test", 0.0, f64::NAN).is_err());
        assert!(check_bounds_f64("test", f64::NEG_INFINITY, 1.0).is_err());
        assert!(check_bounds_f64("test", 0.0, f64::INFINITY).is_err());
        assert_eq!(
            check_bounds_f64_ignore_overflows("test", f64::NEG_INFINITY, f64::INFINITY),
            Ok(None)
        );
    }

    #[test]
    fn test_degenerate_bounds_are_advisory() {
        let advisory = check_bounds_f64("quantiles", 5.0, 5.0).unwrap().unwrap();
        assert_eq!(
            advisory,
            Advisory::DegenerateBounds {
                label: "quantiles".to_string(),
                bound: "5".to_string()
            }
        );
        assert!(advisory.to_string().contains("clamped to 5"));

        assert!(check_bounds_i64("test", 3, 3).unwrap().is_some());
        assert!(check_bounds_not_equal("test", 3.0, 3.0).is_err());
    }

    #[test]
    fn test_bounds_i64_overflow() {
        assert!(check_bounds_i64("test", i64::MIN, 0).is_err());
        assert!(check_bounds_i64_ignore_overflows("test", i64::MIN, 0).is_ok());
        assert!(check_bounds_i64("test", 1, 0).is_err());
        assert!(check_bounds_f64_as_i64("test", -1e30, 0.0).is_err());
        assert_eq!(check_bounds_f64_as_i64("test", -10.0, 10.0), Ok(None));
    }

    #[test]
    fn test_confidence_and_alpha() {
        assert!(check_confidence_level("test", 0.0).is_ok());
        assert!(check_confidence_level("test", 1.0).is_ok());
        assert!(check_confidence_level("test", 1.1).is_err());
        assert!(check_confidence_level("test", f64::NAN).is_err());
        assert!(check_alpha("test", 0.05).is_ok());
        assert!(check_alpha("test", 0.0).is_err());
        assert!(check_alpha("test", 1.0).is_err());
        assert!(check_alpha("test", f64::NAN).is_err());
    }

    #[test]
    fn test_tree_shape() {
        assert_eq!(check_tree_shape("test", 4, 16), Ok(65_536));
        assert!(check_tree_shape("test", 0, 16).is_err());
        assert!(check_tree_shape("test", 4, 1).is_err());
        assert!(check_tree_shape("test", 64, 16).is_err());
        assert!(check_tree_shape("test", i64::MAX, 2).is_err());
    }

    #[test]
    fn test_oracle_sizes() {
        assert!(check_number_of_buckets("test", 0).is_err());
        assert!(check_number_of_buckets("test", 100).is_ok());
        assert!(check_number_of_samples("test", 0).is_err());
        assert!(check_number_of_votes("test", 0).is_err());
        assert!(check_delta_tolerance("test", 0.0).is_ok());
        assert!(check_delta_tolerance("test", -0.01).is_err());
        assert!(check_delta_tolerance("test", f64::INFINITY).is_err());
        assert!(check_rank("test", 0.0).is_ok());
        assert!(check_rank("test", 1.0).is_ok());
        assert!(check_rank("test", 1.01).is_err());
        assert!(check_rank("test", f64::NAN).is_err());
    }
}
