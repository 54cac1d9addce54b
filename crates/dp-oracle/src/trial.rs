//! One trial: sample both neighbors, bucketize, test, vote
//!
//! A trial draws `number_of_samples` outputs from each of two sample
//! generators (the mechanism run on D and on D'). An output may be a vector,
//! one value per queried statistic; each component gets its own pair of
//! histograms and the trial votes "consistent" only if every component
//! passes the divergence test. A false vote is a statistical signal, never
//! retried.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::accounting::empirical_privacy;
use crate::bucketize::Histogram;
use crate::divergence::{verify_approximate_dp, violation_mass};
use crate::dp_core::validation::{
    check_bounds_f64, check_delta, check_delta_tolerance, check_epsilon, check_number_of_buckets,
    check_number_of_samples, Advisory, DpValidationError,
};
use crate::seed::TrialRng;
use crate::OracleError;

/// Outcome of one trial: true = consistent with the claimed budget
pub type Vote = bool;

/// Samples between deadline checks inside a trial
const DEADLINE_CHECK_INTERVAL: usize = 1024;

/// Produces one mechanism output per call.
///
/// Each call must run the mechanism afresh, drawing all randomness from the
/// supplied generator.
pub trait SampleGenerator: Sync {
    fn generate(&self, rng: &mut TrialRng) -> Result<Vec<f64>, OracleError>;
}

impl<F> SampleGenerator for F
where
    F: Fn(&mut TrialRng) -> Result<Vec<f64>, OracleError> + Sync,
{
    fn generate(&self, rng: &mut TrialRng) -> Result<Vec<f64>, OracleError> {
        self(rng)
    }
}

/// How many samples to draw and the domain to bucketize them over
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub number_of_samples: usize,
    pub lower: f64,
    pub upper: f64,
}

impl SamplingParams {
    pub fn validate(&self, label: &str) -> Result<Option<Advisory>, DpValidationError> {
        check_number_of_samples(label, self.number_of_samples)?;
        check_bounds_f64(label, self.lower, self.upper)
    }
}

/// The budget under test plus the statistical slack of the test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DpTestParams {
    pub epsilon: f64,
    pub delta: f64,
    pub delta_tolerance: f64,
    pub number_of_buckets: usize,
}

impl DpTestParams {
    pub fn validate(&self, label: &str) -> Result<(), DpValidationError> {
        check_epsilon(label, self.epsilon)?;
        check_delta(label, self.delta)?;
        check_delta_tolerance(label, self.delta_tolerance)?;
        check_number_of_buckets(label, self.number_of_buckets)
    }
}

/// Per-trial state: the trial's own random stream and the ballot deadline
pub struct TrialContext {
    index: usize,
    rng: TrialRng,
    deadline: Option<Instant>,
}

impl TrialContext {
    pub fn new(index: usize, rng: TrialRng, deadline: Option<Instant>) -> Self {
        TrialContext {
            index,
            rng,
            deadline,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn rng(&mut self) -> &mut TrialRng {
        &mut self.rng
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Run one trial and cast its vote.
///
/// Errors are operational (a generator failed, returned inconsistent output,
/// or the deadline passed); a privacy violation is `Ok(false)`.
pub fn run_trial<A, B>(
    generator_a: &A,
    generator_b: &B,
    sampling: &SamplingParams,
    test: &DpTestParams,
    ctx: &mut TrialContext,
) -> Result<Vote, OracleError>
where
    A: SampleGenerator + ?Sized,
    B: SampleGenerator + ?Sized,
{
    let mut histograms_a: Vec<Histogram> = Vec::new();
    let mut histograms_b: Vec<Histogram> = Vec::new();

    for i in 0..sampling.number_of_samples {
        if i % DEADLINE_CHECK_INTERVAL == 0 && ctx.is_expired() {
            return Err(OracleError::DeadlineExceeded);
        }

        let sample_a = generator_a.generate(ctx.rng())?;
        let sample_b = generator_b.generate(ctx.rng())?;

        if i == 0 {
            if sample_a.is_empty() {
                return Err(OracleError::Mechanism(
                    "sample generator returned no values".to_string(),
                ));
            }
            histograms_a = vec![Histogram::new(test.number_of_buckets); sample_a.len()];
            histograms_b = histograms_a.clone();
        }
        check_width(histograms_a.len(), sample_a.len())?;
        check_width(histograms_b.len(), sample_b.len())?;

        for (histogram, value) in histograms_a.iter_mut().zip(sample_a) {
            histogram.record(value, sampling.lower, sampling.upper);
        }
        for (histogram, value) in histograms_b.iter_mut().zip(sample_b) {
            histogram.record(value, sampling.lower, sampling.upper);
        }
    }

    // Only cast an accept vote if every component passes
    for (component, (a, b)) in histograms_a.iter().zip(&histograms_b).enumerate() {
        if !verify_approximate_dp(a, b, test.epsilon, test.delta, test.delta_tolerance) {
            // None: no finite ε explains the samples at this δ
            let supported = empirical_privacy(a, b, test.delta + test.delta_tolerance);
            debug!(
                trial = ctx.index(),
                component,
                forward = violation_mass(a, b, test.epsilon),
                backward = violation_mass(b, a, test.epsilon),
                empirical_epsilon = ?supported.map(|params| params.epsilon()),
                "trial rejected"
            );
            return Ok(false);
        }
    }

    debug!(trial = ctx.index(), components = histograms_a.len(), "trial accepted");
    Ok(true)
}

fn check_width(expected: usize, got: usize) -> Result<(), OracleError> {
    if expected != got {
        return Err(OracleError::Mechanism(format!(
            "expected {} values per sample, got {}",
            expected, got
        )));
    }
    Ok(())
}
