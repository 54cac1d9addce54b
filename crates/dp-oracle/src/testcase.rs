//! Test-case collections and the case runner
//!
//! A collection is a JSON file with shared voting parameters and a list of
//! cases. Each case configures a [`BoundedQuantiles`] mechanism, the raw
//! entries of two neighboring datasets, the ranks to query and the
//! divergence-test parameters. Cases run one after another, each with its
//! own ballot, and are reported independently.

use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ballot::{BallotOutcome, BallotRunner};
use crate::config::OracleConfig;
use crate::dp_core::validation::{check_number_of_votes, check_rank};
use crate::dp_core::{Advisory, DpValidationError};
use crate::mechanism::{BoundedQuantiles, QuantilesConfig, Validated};
use crate::seed::{Seed, TrialRng};
use crate::trial::{run_trial, DpTestParams, SamplingParams};
use crate::{OracleError, Result, Verdict};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingParameters {
    pub number_of_votes: usize,
}

/// Mechanism configuration plus what to feed it and what to ask it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantilesSamplingParameters {
    #[serde(flatten)]
    pub mechanism: QuantilesConfig,
    /// Entries of dataset D
    pub raw_entries: Vec<f64>,
    /// Entries of the neighboring dataset D′
    pub neighbour_raw_entries: Vec<f64>,
    /// One output component per rank
    pub ranks: Vec<f64>,
    pub number_of_samples: usize,
}

impl QuantilesSamplingParameters {
    /// Samples are bucketized over the mechanism's own bounds
    pub fn sampling_params(&self) -> SamplingParams {
        SamplingParams {
            number_of_samples: self.number_of_samples,
            lower: self.mechanism.lower,
            upper: self.mechanism.upper,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub sampling_parameters: QuantilesSamplingParameters,
    pub dp_test_parameters: DpTestParams,
}

impl TestCase {
    /// Check every parameter of the case before anything is sampled
    pub fn validate(&self) -> std::result::Result<Validated<QuantilesConfig>, DpValidationError> {
        let sampling = &self.sampling_parameters;
        let mut validated = sampling.mechanism.validate()?;

        if let Some(advisory) = sampling.sampling_params().validate(&self.name)? {
            validated.push_advisory(advisory);
        }
        self.dp_test_parameters.validate(&self.name)?;

        if sampling.ranks.is_empty() {
            return Err(DpValidationError::InvalidParameter {
                label: self.name.clone(),
                parameter: "ranks".to_string(),
                value: "[]".to_string(),
                reason: "should list at least one rank".to_string(),
            });
        }
        for &rank in &sampling.ranks {
            check_rank(&self.name, rank)?;
        }

        Ok(validated)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseCollection {
    pub voting_parameters: VotingParameters,
    pub test_cases: Vec<TestCase>,
}

impl TestCaseCollection {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| OracleError::Input {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| OracleError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate the voting parameters and every case without sampling
    pub fn validate(&self) -> Vec<CaseValidation> {
        let mut results = vec![CaseValidation {
            name: "voting_parameters".to_string(),
            result: check_number_of_votes(
                "voting_parameters",
                self.voting_parameters.number_of_votes,
            )
            .map(|()| Vec::new()),
        }];
        results.extend(self.test_cases.iter().map(|case| CaseValidation {
            name: case.name.clone(),
            result: case
                .validate()
                .map(|validated| validated.advisories().to_vec()),
        }));
        results
    }
}

/// Outcome of validating one case
#[derive(Debug, Clone, PartialEq)]
pub struct CaseValidation {
    pub name: String,
    pub result: std::result::Result<Vec<Advisory>, DpValidationError>,
}

/// Everything reported about one executed case
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseReport {
    pub name: String,
    pub verdict: Verdict,
    pub true_votes: Option<usize>,
    pub number_of_votes: usize,
    pub advisories: Vec<String>,
    pub seed: String,
    pub elapsed_ms: u128,
}

/// A generator that runs a fresh mechanism instance over `entries` and
/// queries every rank
fn quantiles_generator<'a>(
    validated: &'a Validated<QuantilesConfig>,
    entries: &'a [f64],
    ranks: &'a [f64],
) -> impl Fn(&mut TrialRng) -> Result<Vec<f64>> + Sync + 'a {
    move |rng: &mut TrialRng| {
        let mut quantiles = BoundedQuantiles::new(validated);
        for &entry in entries {
            quantiles.add_entry(entry)?;
        }
        ranks
            .iter()
            .map(|&rank| quantiles.compute_result(rank, rng))
            .collect()
    }
}

/// Validate, sample and vote on one case. Never fails: errors become an
/// inconclusive verdict.
pub fn run_case(case: &TestCase, number_of_votes: usize, config: &OracleConfig) -> CaseReport {
    let started = Instant::now();
    let seed_label = config.resolve_seed_label();
    info!(case = %case.name, number_of_votes, seed = %seed_label, "running test case");

    let mut advisories = Vec::new();
    let outcome = case
        .validate()
        .map_err(OracleError::from)
        .and_then(|validated| {
            advisories.extend(validated.advisories().iter().map(ToString::to_string));
            execute_case(case, &validated, number_of_votes, config, &seed_label)
        });

    let verdict = Verdict::from_outcome(&outcome);
    match &verdict {
        Verdict::Inconclusive { reason } => warn!(case = %case.name, %reason, "case inconclusive"),
        _ => info!(case = %case.name, %verdict, "case finished"),
    }

    CaseReport {
        name: case.name.clone(),
        verdict,
        true_votes: outcome.as_ref().ok().map(|outcome| outcome.true_votes),
        number_of_votes,
        advisories,
        seed: seed_label,
        elapsed_ms: started.elapsed().as_millis(),
    }
}

fn execute_case(
    case: &TestCase,
    validated: &Validated<QuantilesConfig>,
    number_of_votes: usize,
    config: &OracleConfig,
    seed_label: &str,
) -> Result<BallotOutcome> {
    let sampling_parameters = &case.sampling_parameters;
    let sampling = sampling_parameters.sampling_params();
    let test = case.dp_test_parameters;

    let generator_a = quantiles_generator(
        validated,
        &sampling_parameters.raw_entries,
        &sampling_parameters.ranks,
    );
    let generator_b = quantiles_generator(
        validated,
        &sampling_parameters.neighbour_raw_entries,
        &sampling_parameters.ranks,
    );

    let seed = Seed::from_string(seed_label).derive(&case.name);
    let runner = BallotRunner::new(number_of_votes, seed, config.threads, config.timeout)?;
    runner.run(|ctx| run_trial(&generator_a, &generator_b, &sampling, &test, ctx))
}

/// Run every case of a collection in order
pub fn run_collection(collection: &TestCaseCollection, config: &OracleConfig) -> Vec<CaseReport> {
    run_collection_with(collection, config, |_| {})
}

/// Like [`run_collection`], calling `on_report` after each case
pub fn run_collection_with<F>(
    collection: &TestCaseCollection,
    config: &OracleConfig,
    mut on_report: F,
) -> Vec<CaseReport>
where
    F: FnMut(&CaseReport),
{
    // One master label for the whole run; cases derive from it
    let config = OracleConfig {
        seed: Some(config.resolve_seed_label()),
        ..config.clone()
    };
    let number_of_votes = config.number_of_votes(collection.voting_parameters.number_of_votes);

    let mut reports = Vec::with_capacity(collection.test_cases.len());
    for case in &collection.test_cases {
        let report = run_case(case, number_of_votes, &config);
        on_report(&report);
        reports.push(report);
    }
    reports
}
