//! Bulk action executor — one action against many targets, paced for a
//! rate-limited platform.
//!
//! ## Flow
//! ```text
//! targets ─► drop protected (recorded skipped_protected, never attempted)
//!         ─► C workers share one cursor
//!              per target: abort? → apply → classify → retry/backoff → record
//!                          → jittered pause → next slot
//!         ─► final snapshot ─► prune settled targets
//! ```

use async_trait::async_trait;
use clawguard_core::config::GuardConfig;
use clawguard_core::error::Result;
use clawguard_core::types::{ActionOutcome, ActionResult, OutcomeKind, ProgressSnapshot};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinSet;

use crate::cancel::{AbortRecord, JobControl};
use crate::progress::ProgressReporter;
use crate::report::truncate_reason;
use crate::retry::{Jitter, RetryPolicy};

/// One moderation action, applied target by target.
#[async_trait]
pub trait TargetAction: Send + Sync {
    fn describe(&self) -> String;

    async fn apply(&self, target: &str) -> ActionResult;

    /// Follow-up after a successful apply. Cannot change the outcome.
    async fn after_applied(&self, _target: &str) {}

    /// Forget targets that reached a settled state. Returns how many were dropped.
    async fn prune(&self, _settled: &[String]) -> Result<usize> {
        Ok(0)
    }
}

#[derive(Debug, Clone)]
pub struct ExecutorPolicy {
    pub concurrency: usize,
    pub jitter: Jitter,
    pub retry: RetryPolicy,
}

impl ExecutorPolicy {
    pub fn from_config(config: &GuardConfig) -> Self {
        Self {
            concurrency: config.executor.concurrency.max(1),
            jitter: Jitter::from_config(&config.executor),
            retry: RetryPolicy::from_config(&config.retry),
        }
    }
}

impl Default for ExecutorPolicy {
    fn default() -> Self {
        Self::from_config(&GuardConfig::default())
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    pub snapshot: ProgressSnapshot,
    pub outcomes: Vec<ActionOutcome>,
    pub aborted_by: Option<AbortRecord>,
    /// Targets dropped from presence tracking.
    pub pruned: usize,
}

impl ExecutionSummary {
    pub fn targets_with(&self, kind: OutcomeKind) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.result == kind)
            .map(|o| o.target_id.as_str())
            .collect()
    }

    pub fn outcome_for(&self, target: &str) -> Option<&ActionOutcome> {
        self.outcomes.iter().find(|o| o.target_id == target)
    }
}

#[derive(Default)]
struct Ledger {
    snapshot: ProgressSnapshot,
    outcomes: Vec<ActionOutcome>,
}

struct Shared {
    targets: Vec<String>,
    cursor: AtomicUsize,
    ledger: Mutex<Ledger>,
}

impl Shared {
    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim the next target; each slot goes to exactly one worker.
    fn next_target(&self) -> Option<&str> {
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.targets.get(idx).map(String::as_str)
    }

    /// Count an outcome and publish the new snapshot. Publishing happens under
    /// the ledger lock so observers never see counters go backwards.
    fn record(&self, outcome: ActionOutcome, control: &JobControl, reporter: Option<&Arc<ProgressReporter>>) {
        let mut ledger = self.ledger();
        ledger.snapshot.record(outcome.result);
        ledger.outcomes.push(outcome);
        control.set_progress(ledger.snapshot);
        if let Some(reporter) = reporter {
            reporter.update(ledger.snapshot);
        }
    }
}

enum Attempt {
    Done(ActionOutcome),
    /// Recorded as failed, and the whole job must stop.
    Fatal(ActionOutcome, String),
    /// Abort seen between retries; the target stays unprocessed.
    Abandoned,
}

pub struct BulkActionExecutor {
    policy: ExecutorPolicy,
}

impl BulkActionExecutor {
    pub fn new(policy: ExecutorPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ExecutorPolicy {
        &self.policy
    }

    /// Run `action` over `targets`, skipping anything in `protected`.
    pub async fn run(
        &self,
        control: &Arc<JobControl>,
        reporter: Option<&Arc<ProgressReporter>>,
        targets: Vec<String>,
        protected: &HashSet<String>,
        action: Arc<dyn TargetAction>,
    ) -> ExecutionSummary {
        let mut seen = HashSet::new();
        let targets: Vec<String> = targets.into_iter().filter(|t| seen.insert(t.clone())).collect();
        let total = targets.len();
        let (skipped, work): (Vec<String>, Vec<String>) =
            targets.into_iter().partition(|t| protected.contains(t));

        let mut ledger = Ledger { snapshot: ProgressSnapshot::new(total), outcomes: Vec::with_capacity(total) };
        for target in skipped {
            ledger.snapshot.record(OutcomeKind::SkippedProtected);
            ledger.outcomes.push(ActionOutcome::skipped_protected(target));
        }
        control.set_progress(ledger.snapshot);

        tracing::info!(
            "🚀 Job {}: {} on {} target(s), {} protected, {} worker(s)",
            control.key(),
            action.describe(),
            work.len(),
            ledger.snapshot.skipped_protected,
            self.policy.concurrency.min(work.len()),
        );

        let shared = Arc::new(Shared { targets: work, cursor: AtomicUsize::new(0), ledger: Mutex::new(ledger) });
        let mut workers = JoinSet::new();
        for worker_id in 0..self.policy.concurrency.min(shared.targets.len()) {
            workers.spawn(worker_loop(
                worker_id,
                Arc::clone(&shared),
                Arc::clone(control),
                reporter.cloned(),
                Arc::clone(&action),
                self.policy.clone(),
            ));
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Worker for job {} crashed: {e}", control.key());
            }
        }

        let Ledger { mut snapshot, outcomes } = std::mem::take(&mut *shared.ledger());
        let aborted_by = control.aborted_by();
        snapshot.aborted = aborted_by.is_some();
        control.set_progress(snapshot);

        let settled: Vec<String> = outcomes
            .iter()
            .filter(|o| o.result.is_settled())
            .map(|o| o.target_id.clone())
            .collect();
        let pruned = if settled.is_empty() {
            0
        } else {
            match action.prune(&settled).await {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!("Prune after job {} failed: {e}", control.key());
                    0
                }
            }
        };

        tracing::info!(
            "🏁 Job {}: {}/{} processed: applied {}, absent {}, protected {}, failed {}{}",
            control.key(),
            snapshot.processed,
            snapshot.total,
            snapshot.applied,
            snapshot.already_absent,
            snapshot.skipped_protected,
            snapshot.failed,
            if snapshot.aborted { " (aborted)" } else { "" },
        );

        ExecutionSummary { snapshot, outcomes, aborted_by, pruned }
    }
}

async fn worker_loop(
    worker_id: usize,
    shared: Arc<Shared>,
    control: Arc<JobControl>,
    reporter: Option<Arc<ProgressReporter>>,
    action: Arc<dyn TargetAction>,
    policy: ExecutorPolicy,
) {
    loop {
        if control.is_aborted() {
            tracing::debug!("Worker {worker_id} of {} sees abort, stopping", control.key());
            break;
        }
        let Some(target) = shared.next_target() else {
            break;
        };

        let (outcome, fatal) = match attempt_target(target, &control, action.as_ref(), &policy.retry).await {
            Attempt::Done(outcome) => (outcome, None),
            Attempt::Fatal(outcome, reason) => (outcome, Some(reason)),
            Attempt::Abandoned => break,
        };
        tracing::debug!("Job {} target {target}: {:?}", control.key(), outcome.result);

        shared.record(outcome, &control, reporter.as_ref());

        if let Some(reason) = fatal {
            tracing::warn!("Job {} lost permissions at {target}: {reason}", control.key());
            control.abort_fatal(format!("insufficient permissions ({})", truncate_reason(&reason)));
            break;
        }

        if !pause(policy.jitter.sample(), &control).await {
            break;
        }
    }
}

async fn attempt_target(
    target: &str,
    control: &JobControl,
    action: &dyn TargetAction,
    retry: &RetryPolicy,
) -> Attempt {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let (wait, last_error) = match action.apply(target).await {
            ActionResult::Applied => {
                action.after_applied(target).await;
                return Attempt::Done(ActionOutcome::applied(target));
            }
            ActionResult::NotFound => return Attempt::Done(ActionOutcome::already_absent(target)),
            ActionResult::Forbidden(reason) => {
                let outcome = ActionOutcome::failed(target, truncate_reason(&reason));
                return Attempt::Fatal(outcome, reason);
            }
            ActionResult::RateLimited { retry_after } => {
                (retry.backoff(attempt, retry_after), format!("rate limited after {attempt} attempt(s)"))
            }
            ActionResult::Failed(reason) => (retry.backoff(attempt, None), reason),
        };

        if !retry.allows_retry(attempt) {
            return Attempt::Done(ActionOutcome::failed(target, truncate_reason(&last_error)));
        }
        tracing::debug!("Retrying {target} in {wait:?} (attempt {attempt}/{}): {last_error}", retry.max_attempts);
        if !pause(wait, control).await {
            return Attempt::Abandoned;
        }
    }
}

/// Sleep unless the job is aborted first. Returns false on abort.
async fn pause(duration: Duration, control: &JobControl) -> bool {
    tokio::select! {
        biased;
        _ = control.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
