//! Reference DP mechanisms to run the oracle against
//!
//! Configurations are plain immutable values. `validate()` runs every
//! parameter check up front and produces a [`Validated`] wrapper, which is
//! the only thing a mechanism constructor accepts.

pub mod quantiles;

pub use quantiles::{BoundedQuantiles, QuantilesConfig};

use crate::dp_core::{Advisory, Noise};

/// A configuration that passed validation, with its noise resolved
#[derive(Debug, Clone, PartialEq)]
pub struct Validated<T> {
    config: T,
    noise: Noise,
    advisories: Vec<Advisory>,
}

impl<T> Validated<T> {
    pub(crate) fn new(config: T, noise: Noise, advisories: Vec<Advisory>) -> Self {
        Validated {
            config,
            noise,
            advisories,
        }
    }

    pub fn config(&self) -> &T {
        &self.config
    }

    pub fn noise(&self) -> Noise {
        self.noise
    }

    /// Non-fatal conditions found during validation
    pub fn advisories(&self) -> &[Advisory] {
        &self.advisories
    }

    /// Record an advisory raised outside the mechanism's own checks, unless
    /// the same condition is already recorded
    pub(crate) fn push_advisory(&mut self, advisory: Advisory) {
        if !self.advisories.iter().any(|known| known.same_condition(&advisory)) {
            self.advisories.push(advisory);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dp_core::NoiseKind;

    fn degenerate(label: &str, bound: &str) -> Advisory {
        Advisory::DegenerateBounds {
            label: label.to_string(),
            bound: bound.to_string(),
        }
    }

    #[test]
    fn test_push_advisory_skips_same_condition() {
        let config = QuantilesConfig {
            epsilon: 1.0,
            delta: None,
            max_contributions_per_partition: 1,
            max_partitions_contributed: 1,
            lower: 5.0,
            upper: 5.0,
            noise: NoiseKind::Laplace,
            tree_height: 2,
            branching_factor: 4,
        };
        let mut validated = config.validate().unwrap();
        assert_eq!(validated.advisories().len(), 1);

        validated.push_advisory(degenerate("case", "5"));
        assert_eq!(validated.advisories().len(), 1);

        validated.push_advisory(degenerate("case", "7"));
        assert_eq!(validated.advisories().len(), 2);
        assert_eq!(validated.advisories()[1], degenerate("case", "7"));
    }
}
