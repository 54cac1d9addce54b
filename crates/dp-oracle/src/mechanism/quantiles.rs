//! Bounded quantiles over a noisy b-ary tree
//!
//! The domain `[lower, upper]` is split into `branching_factor^tree_height`
//! equal leaves. Every entry increments one node per level on its
//! root-to-leaf path (the root itself is not counted), so one entry touches
//! `tree_height` counts: the L0 sensitivity is
//! `tree_height · max_partitions_contributed` and the L∞ sensitivity is
//! `max_contributions_per_partition`.
//!
//! A quantile is found by walking down from the root. At each node the
//! children's noisy counts (floored at zero) are accumulated left to right
//! until they cover `rank · total`; the walk continues in that child with the
//! rank rescaled to it. Inside the final node the result is linearly
//! interpolated. Node noise is drawn lazily and memoized, so every node of an
//! instance is noised exactly once however many ranks are queried.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::Validated;
use crate::bucketize::bucketize;
use crate::dp_core::validation::{
    check_bounds_f64, check_max_partitions_contributed, check_rank, check_tree_shape,
    DpValidationError,
};
use crate::dp_core::{Noise, NoiseKind};
use crate::{OracleError, Result};

const LABEL: &str = "BoundedQuantiles";

pub const DEFAULT_TREE_HEIGHT: i64 = 4;
pub const DEFAULT_BRANCHING_FACTOR: i64 = 16;

fn default_tree_height() -> i64 {
    DEFAULT_TREE_HEIGHT
}

fn default_branching_factor() -> i64 {
    DEFAULT_BRANCHING_FACTOR
}

/// Parameters of a [`BoundedQuantiles`] instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantilesConfig {
    pub epsilon: f64,
    /// Required for Gaussian noise, must be absent or 0 for Laplace
    #[serde(default)]
    pub delta: Option<f64>,
    pub max_contributions_per_partition: i64,
    pub max_partitions_contributed: i64,
    pub lower: f64,
    pub upper: f64,
    pub noise: NoiseKind,
    #[serde(default = "default_tree_height")]
    pub tree_height: i64,
    #[serde(default = "default_branching_factor")]
    pub branching_factor: i64,
}

impl QuantilesConfig {
    /// Run every parameter check and calibrate the noise.
    ///
    /// Degenerate bounds (lower == upper) pass with an advisory.
    pub fn validate(&self) -> std::result::Result<Validated<QuantilesConfig>, DpValidationError> {
        check_max_partitions_contributed(LABEL, self.max_partitions_contributed)?;

        let mut advisories = Vec::new();
        if let Some(advisory) = check_bounds_f64(LABEL, self.lower, self.upper)? {
            warn!(%advisory, "degenerate bounds");
            advisories.push(advisory);
        }

        check_tree_shape(LABEL, self.tree_height, self.branching_factor)?;

        let l0_sensitivity = self.tree_height.saturating_mul(self.max_partitions_contributed);
        let noise = Noise::calibrate(
            LABEL,
            self.noise,
            l0_sensitivity,
            self.max_contributions_per_partition as f64,
            self.epsilon,
            self.delta,
        )?;

        Ok(Validated::new(self.clone(), noise, advisories))
    }
}

/// DP quantiles of a stream of bounded entries
#[derive(Debug, Clone)]
pub struct BoundedQuantiles {
    lower: f64,
    upper: f64,
    branching_factor: usize,
    tree_height: usize,
    number_of_leaves: usize,
    /// Index of the first node of each level
    level_offsets: Vec<usize>,
    /// Leaves below one node of each level
    leaves_under: Vec<usize>,
    noise: Noise,
    counts: HashMap<usize, u64>,
    noised_counts: HashMap<usize, f64>,
    entries: u64,
}

impl BoundedQuantiles {
    pub fn new(validated: &Validated<QuantilesConfig>) -> Self {
        let config = validated.config();
        let branching_factor = config.branching_factor as usize;
        let tree_height = config.tree_height as usize;

        let mut level_offsets = Vec::with_capacity(tree_height + 1);
        let mut level_width = 1usize;
        let mut offset = 0usize;
        for _ in 0..=tree_height {
            level_offsets.push(offset);
            offset += level_width;
            level_width *= branching_factor;
        }
        let number_of_leaves = level_width / branching_factor;

        let leaves_under = (0..=tree_height)
            .map(|depth| number_of_leaves / branching_factor.pow(depth as u32))
            .collect();

        BoundedQuantiles {
            lower: config.lower,
            upper: config.upper,
            branching_factor,
            tree_height,
            number_of_leaves,
            level_offsets,
            leaves_under,
            noise: validated.noise(),
            counts: HashMap::new(),
            noised_counts: HashMap::new(),
            entries: 0,
        }
    }

    pub fn number_of_leaves(&self) -> usize {
        self.number_of_leaves
    }

    /// Entries added so far
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Add one entry, clamped to the bounds. NaN entries are ignored.
    ///
    /// Fails once a result has been computed: the noisy counts are fixed by
    /// then.
    pub fn add_entry(&mut self, value: f64) -> Result<()> {
        if !self.noised_counts.is_empty() {
            return Err(OracleError::Mechanism(format!(
                "{}: entries cannot be added after a result was computed",
                LABEL
            )));
        }
        if value.is_nan() {
            return Ok(());
        }

        let clamped = value.max(self.lower).min(self.upper);
        let leaf = bucketize(clamped, self.lower, self.upper, self.number_of_leaves);
        for depth in 1..=self.tree_height {
            let index = self.level_offsets[depth] + leaf / self.leaves_under[depth];
            *self.counts.entry(index).or_insert(0) += 1;
        }
        self.entries += 1;
        Ok(())
    }

    /// DP estimate of the `rank` quantile, `rank` in [0, 1].
    ///
    /// The result is always within the bounds.
    pub fn compute_result<R: Rng + ?Sized>(&mut self, rank: f64, rng: &mut R) -> Result<f64> {
        check_rank(LABEL, rank)?;

        let mut rank = rank;
        let mut depth = 0;
        let mut position = 0;

        while depth < self.tree_height {
            let first_child = position * self.branching_factor;
            let children: Vec<f64> = (0..self.branching_factor)
                .map(|j| self.noised_count(depth + 1, first_child + j, rng))
                .collect();

            let total: f64 = children.iter().sum();
            if total <= 0.0 {
                // Nothing below: interpolate over the whole node
                break;
            }

            let target = rank * total;
            let mut partial = 0.0;
            let mut selected = None;
            for (j, &count) in children.iter().enumerate() {
                if count <= 0.0 {
                    continue;
                }
                partial += count;
                selected = Some((j, ((target - (partial - count)) / count).min(1.0)));
                if partial >= target {
                    break;
                }
            }
            let Some((child, child_rank)) = selected else {
                break;
            };

            position = first_child + child;
            rank = child_rank;
            depth += 1;
        }

        let width = (self.upper - self.lower) / (self.branching_factor as f64).powi(depth as i32);
        let left = self.lower + position as f64 * width;
        Ok((left + rank * width).max(self.lower).min(self.upper))
    }

    /// Noisy count of a node floored at zero, drawn once per node
    fn noised_count<R: Rng + ?Sized>(&mut self, depth: usize, position: usize, rng: &mut R) -> f64 {
        let index = self.level_offsets[depth] + position;
        let raw = self.counts.get(&index).copied().unwrap_or(0) as f64;
        let noise = self.noise;
        let noised = *self
            .noised_counts
            .entry(index)
            .or_insert_with(|| noise.add_noise(raw, rng));
        noised.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dp_core::Advisory;
    use crate::seed::Seed;

    fn config(epsilon: f64) -> QuantilesConfig {
        QuantilesConfig {
            epsilon,
            delta: None,
            max_contributions_per_partition: 1,
            max_partitions_contributed: 1,
            lower: 0.0,
            upper: 100.0,
            noise: NoiseKind::Laplace,
            tree_height: 2,
            branching_factor: 10,
        }
    }

    fn filled(config: &QuantilesConfig) -> BoundedQuantiles {
        let mut quantiles = BoundedQuantiles::new(&config.validate().unwrap());
        for i in 0..100 {
            quantiles.add_entry(i as f64 + 0.5).unwrap();
        }
        quantiles
    }

    #[test]
    fn test_sensitivity_calibration() {
        let config = QuantilesConfig {
            epsilon: 2.0,
            max_contributions_per_partition: 3,
            max_partitions_contributed: 2,
            tree_height: 4,
            ..config(1.0)
        };
        let validated = config.validate().unwrap();
        assert_eq!(validated.noise(), Noise::Laplace { scale: 12.0 });
        assert!(validated.advisories().is_empty());
    }

    #[test]
    fn test_validation_failures() {
        let gaussian_without_delta = QuantilesConfig {
            noise: NoiseKind::Gaussian,
            ..config(1.0)
        };
        assert!(gaussian_without_delta.validate().is_err());

        let gaussian = QuantilesConfig {
            delta: Some(1e-5),
            ..gaussian_without_delta
        };
        assert_eq!(gaussian.validate().unwrap().noise().kind(), NoiseKind::Gaussian);

        let laplace_with_delta = QuantilesConfig {
            delta: Some(1e-5),
            ..config(1.0)
        };
        assert!(laplace_with_delta.validate().is_err());

        assert!(config(0.0).validate().is_err());
        assert!(QuantilesConfig { tree_height: 0, ..config(1.0) }.validate().is_err());
        assert!(QuantilesConfig { branching_factor: 1, ..config(1.0) }.validate().is_err());
        assert!(QuantilesConfig { lower: 5.0, upper: 1.0, ..config(1.0) }.validate().is_err());
        assert!(QuantilesConfig { max_partitions_contributed: 0, ..config(1.0) }
            .validate()
            .is_err());
        assert!(QuantilesConfig { max_contributions_per_partition: 0, ..config(1.0) }
            .validate()
            .is_err());
    }

    #[test]
    fn test_degenerate_bounds_advisory() {
        let config = QuantilesConfig {
            lower: 7.0,
            upper: 7.0,
            ..config(1.0)
        };
        let validated = config.validate().unwrap();
        assert!(matches!(
            validated.advisories(),
            [Advisory::DegenerateBounds { .. }]
        ));

        let mut quantiles = BoundedQuantiles::new(&validated);
        quantiles.add_entry(3.0).unwrap();
        quantiles.add_entry(11.0).unwrap();
        let mut rng = Seed::from_string("degenerate").trial_rng(0);
        assert_eq!(quantiles.compute_result(0.5, &mut rng).unwrap(), 7.0);
    }

    #[test]
    fn test_tree_shape() {
        let quantiles = BoundedQuantiles::new(&config(1.0).validate().unwrap());
        assert_eq!(quantiles.number_of_leaves(), 100);
        assert_eq!(quantiles.level_offsets, vec![0, 1, 11]);
        assert_eq!(quantiles.leaves_under, vec![100, 10, 1]);
    }

    #[test]
    fn test_negligible_noise_recovers_quantiles() {
        let mut quantiles = filled(&config(1e6));
        let mut rng = Seed::from_string("accurate").trial_rng(0);
        for rank in [0.0, 0.1, 0.25, 0.5, 0.9, 1.0] {
            let result = quantiles.compute_result(rank, &mut rng).unwrap();
            assert!(
                (result - 100.0 * rank).abs() < 1.5,
                "rank {} gave {}",
                rank,
                result
            );
        }
    }

    #[test]
    fn test_repeated_queries_are_consistent() {
        let mut quantiles = filled(&config(0.5));
        let mut rng = Seed::from_string("first").trial_rng(0);
        let first = quantiles.compute_result(0.3, &mut rng).unwrap();

        let mut other_rng = Seed::from_string("second").trial_rng(0);
        let second = quantiles.compute_result(0.3, &mut other_rng).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_entries_clamped_and_nan_ignored() {
        let mut quantiles = BoundedQuantiles::new(&config(1e6).validate().unwrap());
        for _ in 0..50 {
            quantiles.add_entry(-1e9).unwrap();
            quantiles.add_entry(1e9).unwrap();
        }
        quantiles.add_entry(f64::NAN).unwrap();
        assert_eq!(quantiles.entries(), 100);

        let mut rng = Seed::from_string("clamped").trial_rng(0);
        assert!(quantiles.compute_result(0.1, &mut rng).unwrap() < 1.0);
        assert!(quantiles.compute_result(0.9, &mut rng).unwrap() > 99.0);
    }

    #[test]
    fn test_rank_outside_unit_interval_fails() {
        let mut quantiles = filled(&config(1.0));
        let mut rng = Seed::from_string("rank").trial_rng(0);
        assert!(matches!(
            quantiles.compute_result(1.5, &mut rng),
            Err(OracleError::Validation(_))
        ));
        assert!(quantiles.compute_result(-0.1, &mut rng).is_err());
        assert!(quantiles.compute_result(f64::NAN, &mut rng).is_err());
    }

    #[test]
    fn test_no_entries_after_result() {
        let mut quantiles = filled(&config(1.0));
        let mut rng = Seed::from_string("frozen").trial_rng(0);
        quantiles.compute_result(0.5, &mut rng).unwrap();
        assert!(matches!(quantiles.add_entry(1.0), Err(OracleError::Mechanism(_))));
    }

    #[test]
    fn test_config_json_defaults() {
        let config: QuantilesConfig = serde_json::from_str(
            r#"{
                "epsilon": 1.0,
                "max_contributions_per_partition": 1,
                "max_partitions_contributed": 1,
                "lower": 0.0,
                "upper": 100.0,
                "noise": "LAPLACE"
            }"#,
        )
        .unwrap();
        assert_eq!(config.tree_height, DEFAULT_TREE_HEIGHT);
        assert_eq!(config.branching_factor, DEFAULT_BRANCHING_FACTOR);
        assert_eq!(config.delta, None);
    }
}
