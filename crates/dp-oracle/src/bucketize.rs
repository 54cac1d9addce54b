//! Fixed-width bucketization of mechanism outputs
//!
//! Mechanism outputs may legitimately fall outside the declared domain, so
//! bucketization never fails: out-of-range values are clamped into the first
//! or last bucket.

use serde::{Deserialize, Serialize};

/// Map `value` to a bucket index in `[0, number_of_buckets - 1]`.
///
/// `index = floor((value - lower) / (upper - lower) * number_of_buckets)`.
/// Values at or below `lower` (and NaN) map to 0, values at or above `upper`
/// map to the last bucket. With zero buckets the result is 0.
pub fn bucketize(value: f64, lower: f64, upper: f64, number_of_buckets: usize) -> usize {
    let last = number_of_buckets.saturating_sub(1);
    if value.is_nan() || value <= lower {
        return 0;
    }
    if value >= upper {
        return last;
    }

    let width = upper - lower;
    let fraction = if width.is_finite() {
        (value - lower) / width
    } else {
        // Finite bounds more than f64::MAX apart
        (value / 2.0 - lower / 2.0) / (upper / 2.0 - lower / 2.0)
    };
    let position = fraction * number_of_buckets as f64;
    // Rounding just below `upper` can land exactly on number_of_buckets
    (position.floor() as usize).min(last)
}

/// Occurrence counts per bucket.
///
/// Invariant: `total()` equals the number of values recorded.
///
/// Serialized as the bare list of counts; the total is recomputed on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<u64>", into = "Vec<u64>")]
pub struct Histogram {
    counts: Vec<u64>,
    total: u64,
}

impl Histogram {
    /// Create an empty histogram
    pub fn new(number_of_buckets: usize) -> Self {
        Histogram {
            counts: vec![0; number_of_buckets],
            total: 0,
        }
    }

    /// Build a histogram from explicit counts
    pub fn from_counts(counts: Vec<u64>) -> Self {
        let total = counts.iter().sum();
        Histogram { counts, total }
    }

    /// Bucketize `value` over `[lower, upper]` and count it
    pub fn record(&mut self, value: f64, lower: f64, upper: f64) {
        let index = bucketize(value, lower, upper, self.counts.len());
        self.increment(index);
    }

    /// Count one occurrence of an already computed bucket index.
    ///
    /// Indices past the end are clamped into the last bucket.
    pub fn increment(&mut self, index: usize) {
        if self.counts.is_empty() {
            return;
        }
        let index = index.min(self.counts.len() - 1);
        self.counts[index] += 1;
        self.total += 1;
    }

    pub fn number_of_buckets(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Count in bucket `index`, 0 past the end
    pub fn count(&self, index: usize) -> u64 {
        self.counts.get(index).copied().unwrap_or(0)
    }

    /// Empirical probability of bucket `index`; 0 for an empty histogram
    pub fn probability(&self, index: usize) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.count(index) as f64 / self.total as f64
    }
}

impl From<Vec<u64>> for Histogram {
    fn from(counts: Vec<u64>) -> Self {
        Histogram::from_counts(counts)
    }
}

impl From<Histogram> for Vec<u64> {
    fn from(histogram: Histogram) -> Self {
        histogram.counts
    }
}
