//! Majority vote over independent trials
//!
//! A ballot runs `number_of_votes` trials on a rayon pool. Each trial gets a
//! fresh [`TrialContext`] whose random stream is selected by the trial
//! index, so the tally does not depend on scheduling. Votes are reduced
//! through an atomic counter and the decision is a strict majority: an exact
//! half rejects.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::dp_core::validation::check_number_of_votes;
use crate::seed::Seed;
use crate::trial::{TrialContext, Vote};
use crate::{OracleError, Result};

/// Tally of a finished ballot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BallotOutcome {
    pub true_votes: usize,
    pub number_of_votes: usize,
    pub decision: bool,
}

/// Strict majority: `true_votes > number_of_votes / 2`
pub fn majority(true_votes: usize, number_of_votes: usize) -> bool {
    2 * true_votes > number_of_votes
}

/// Runs ballots of a fixed size on a dedicated thread pool
pub struct BallotRunner {
    number_of_votes: usize,
    seed: Seed,
    timeout: Option<Duration>,
    pool: rayon::ThreadPool,
}

impl BallotRunner {
    /// `threads: None` sizes the pool to the available cores.
    pub fn new(
        number_of_votes: usize,
        seed: Seed,
        threads: Option<usize>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        check_number_of_votes("ballot", number_of_votes)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.unwrap_or(0))
            .build()
            .map_err(|e| OracleError::ThreadPool(e.to_string()))?;

        Ok(BallotRunner {
            number_of_votes,
            seed,
            timeout,
            pool,
        })
    }

    pub fn number_of_votes(&self) -> usize {
        self.number_of_votes
    }

    /// Run every trial and reduce the votes.
    ///
    /// The first operational error aborts the remaining trials. Passing the
    /// deadline yields [`OracleError::TimedOut`].
    pub fn run<F>(&self, trial: F) -> Result<BallotOutcome>
    where
        F: Fn(&mut TrialContext) -> Result<Vote> + Sync,
    {
        let scheduled = self.number_of_votes;
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let true_votes = AtomicUsize::new(0);
        let completed = AtomicUsize::new(0);

        let result = self.pool.install(|| {
            (0..scheduled).into_par_iter().try_for_each(|index| {
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    return Err(OracleError::DeadlineExceeded);
                }
                let mut ctx = TrialContext::new(index, self.seed.trial_rng(index as u64), deadline);
                if trial(&mut ctx)? {
                    true_votes.fetch_add(1, Ordering::Relaxed);
                }
                completed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })
        });

        match result {
            Ok(()) => {
                let true_votes = true_votes.load(Ordering::Relaxed);
                let decision = majority(true_votes, scheduled);
                info!(true_votes, number_of_votes = scheduled, decision, "ballot complete");
                Ok(BallotOutcome {
                    true_votes,
                    number_of_votes: scheduled,
                    decision,
                })
            }
            Err(OracleError::DeadlineExceeded) => {
                let completed = completed.load(Ordering::Relaxed);
                warn!(completed, scheduled, "ballot timed out");
                Err(OracleError::TimedOut {
                    completed,
                    scheduled,
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Run a ballot on the default pool with a fresh random seed
pub fn run_ballot<F>(trial: F, number_of_votes: usize) -> Result<bool>
where
    F: Fn(&mut TrialContext) -> Result<Vote> + Sync,
{
    let label = Seed::random_label();
    info!(seed = %label, "running ballot with random seed");
    let runner = BallotRunner::new(number_of_votes, Seed::from_string(&label), None, None)?;
    Ok(runner.run(trial)?.decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    /// A trial that votes true for the first `true_votes` calls
    fn scripted(true_votes: usize) -> impl Fn(&mut TrialContext) -> Result<Vote> + Sync {
        let calls = AtomicUsize::new(0);
        move |_: &mut TrialContext| Ok(calls.fetch_add(1, Ordering::SeqCst) < true_votes)
    }

    fn runner(number_of_votes: usize) -> BallotRunner {
        BallotRunner::new(number_of_votes, Seed::from_string("ballot-tests"), Some(2), None).unwrap()
    }

    #[test]
    fn test_nine_votes_majority() {
        let outcome = runner(9).run(scripted(5)).unwrap();
        assert_eq!(outcome.true_votes, 5);
        assert!(outcome.decision);

        let outcome = runner(9).run(scripted(4)).unwrap();
        assert_eq!(outcome.true_votes, 4);
        assert!(!outcome.decision);

        assert!(runner(9).run(scripted(9)).unwrap().decision);
        assert!(!runner(9).run(scripted(0)).unwrap().decision);
    }

    #[test]
    fn test_exact_half_rejects() {
        assert!(!runner(10).run(scripted(5)).unwrap().decision);
        assert!(runner(10).run(scripted(6)).unwrap().decision);
        assert!(!majority(1, 2));
    }

    #[test]
    fn test_zero_votes_is_a_configuration_error() {
        let result = BallotRunner::new(0, Seed::from_string("x"), None, None);
        assert!(matches!(result, Err(OracleError::Validation(_))));
        assert!(run_ballot(scripted(0), 0).is_err());
    }

    #[test]
    fn test_operational_error_aborts() {
        let result = runner(15).run(|ctx: &mut TrialContext| {
            if ctx.index() == 7 {
                Err(OracleError::Mechanism("generator failed".to_string()))
            } else {
                Ok(true)
            }
        });
        assert!(matches!(result, Err(OracleError::Mechanism(_))));
    }

    #[test]
    fn test_expired_deadline_times_out() {
        let runner =
            BallotRunner::new(15, Seed::from_string("late"), Some(2), Some(Duration::ZERO)).unwrap();
        let result = runner.run(scripted(15));
        assert!(matches!(
            result,
            Err(OracleError::TimedOut {
                completed: 0,
                scheduled: 15
            })
        ));
    }

    #[test]
    fn test_tally_is_reproducible() {
        let coin = |ctx: &mut TrialContext| -> Result<Vote> { Ok(ctx.rng().gen_bool(0.5)) };
        let first = runner(101).run(coin).unwrap();
        let wider = BallotRunner::new(101, Seed::from_string("ballot-tests"), Some(4), None).unwrap();
        let second = wider.run(coin).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_run_ballot() {
        assert!(run_ballot(scripted(3), 5).unwrap());
        assert!(!run_ballot(scripted(2), 5).unwrap());
    }
}
