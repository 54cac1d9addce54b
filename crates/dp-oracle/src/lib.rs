//! Empirical (ε, δ)-differential-privacy verification oracle
//!
//! Given a mechanism that claims (ε, δ)-DP, the oracle runs it many times on
//! two neighboring datasets, bucketizes the outputs into histograms and
//! checks whether the empirical distributions are consistent with the claim.
//! A single trial is noisy, so trials are repeated and reduced by majority.
//!
//! ## Pipeline
//!
//! ```text
//! ballot ──(parallel)──> trial × number_of_votes
//!                          └─ samples ─> bucketize ─> histograms ─> divergence ─> vote
//!        <── majority ───┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use dp_oracle::testcase::{run_collection, TestCaseCollection};
//! use dp_oracle::OracleConfig;
//!
//! let collection = TestCaseCollection::from_path("testdata/bounded_quantiles_dp_test_cases.json")?;
//! let reports = run_collection(&collection, &OracleConfig::from_env_or_default());
//! for report in &reports {
//!     println!("{}: {}", report.name, report.verdict);
//! }
//! # Ok::<(), dp_oracle::OracleError>(())
//! ```

pub mod accounting;
pub mod ballot;
pub mod bucketize;
pub mod config;
pub mod divergence;
pub mod dp_core;
pub mod mechanism;
pub mod seed;
pub mod testcase;
pub mod trial;

use std::path::PathBuf;

use serde::Serialize;

pub use accounting::{
    empirical_delta, empirical_epsilon, empirical_privacy, DifferentialPrivacyParameters,
};
pub use ballot::{run_ballot, BallotOutcome, BallotRunner};
pub use bucketize::{bucketize, Histogram};
pub use config::OracleConfig;
pub use divergence::{verify_approximate_dp, violation_mass};
pub use dp_core::{Advisory, DpValidationError, Noise, NoiseKind};
pub use seed::{Seed, TrialRng};
pub use trial::{run_trial, DpTestParams, SampleGenerator, SamplingParams, TrialContext, Vote};

/// Errors that stop a case or a run.
///
/// A negative privacy verdict is not an error; see [`Verdict`].
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("invalid configuration: {0}")]
    Validation(#[from] DpValidationError),

    #[error("mechanism failure: {0}")]
    Mechanism(String),

    #[error("cannot read {}: {source}", path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The deadline passed inside a trial; the ballot reports it as
    /// [`OracleError::TimedOut`]
    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("timed out after {completed} of {scheduled} trials")]
    TimedOut { completed: usize, scheduled: usize },

    #[error("thread pool error: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, OracleError>;

/// User-visible outcome of a test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    /// The majority of trials found the outputs consistent with the budget
    Consistent,
    /// The majority of trials found a violation
    ViolationDetected,
    /// No decision: configuration or operational error, or timeout
    Inconclusive { reason: String },
}

impl Verdict {
    pub fn from_decision(decision: bool) -> Self {
        if decision {
            Verdict::Consistent
        } else {
            Verdict::ViolationDetected
        }
    }

    /// Map a ballot result; every error becomes [`Verdict::Inconclusive`]
    pub fn from_outcome(outcome: &Result<BallotOutcome>) -> Self {
        match outcome {
            Ok(outcome) => Verdict::from_decision(outcome.decision),
            Err(e) => Verdict::Inconclusive {
                reason: e.to_string(),
            },
        }
    }

    pub fn is_consistent(&self) -> bool {
        matches!(self, Verdict::Consistent)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Consistent => write!(f, "consistent"),
            Verdict::ViolationDetected => write!(f, "violation detected"),
            Verdict::Inconclusive { reason } => write!(f, "inconclusive ({})", reason),
        }
    }
}
