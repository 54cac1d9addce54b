//! Run configuration
//!
//! Everything here controls how a ballot is executed, never what is tested:
//! privacy budgets, bounds and test sizes live in the test-case file.

use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::seed::Seed;

/// Execution settings shared by every case of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OracleConfig {
    /// Worker threads for trials; `None` uses every core
    pub threads: Option<usize>,

    /// Wall-clock limit per ballot
    pub timeout: Option<Duration>,

    /// Seed label; `None` draws a fresh random label per run
    pub seed: Option<String>,

    /// Replaces the collection's `number_of_votes` when set
    pub votes_override: Option<usize>,
}

impl OracleConfig {
    /// Load config overrides from environment (best-effort).
    ///
    /// Supported:
    /// - DP_ORACLE_THREADS
    /// - DP_ORACLE_TIMEOUT_SECS
    /// - DP_ORACLE_SEED
    /// - DP_ORACLE_VOTES
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(v) = lookup("DP_ORACLE_THREADS") {
            if let Ok(n) = v.trim().parse::<usize>() {
                if n > 0 {
                    cfg.threads = Some(n);
                }
            }
        }

        if let Some(v) = lookup("DP_ORACLE_TIMEOUT_SECS") {
            if let Ok(secs) = v.trim().parse::<f64>() {
                if secs.is_finite() && secs > 0.0 {
                    cfg.timeout = Some(Duration::from_secs_f64(secs));
                }
            }
        }

        if let Some(v) = lookup("DP_ORACLE_SEED") {
            let v = v.trim();
            if !v.is_empty() {
                cfg.seed = Some(v.to_string());
            }
        }

        if let Some(v) = lookup("DP_ORACLE_VOTES") {
            if let Ok(n) = v.trim().parse::<usize>() {
                if n > 0 {
                    cfg.votes_override = Some(n);
                }
            }
        }

        cfg
    }

    /// Resolve the master seed label, drawing and logging a random one if
    /// none is configured so the run can be replayed.
    pub fn resolve_seed_label(&self) -> String {
        match &self.seed {
            Some(label) => label.clone(),
            None => {
                let label = Seed::random_label();
                info!(seed = %label, "no seed configured, using a random one");
                label
            }
        }
    }

    pub fn number_of_votes(&self, from_collection: usize) -> usize {
        self.votes_override.unwrap_or(from_collection)
    }
}
