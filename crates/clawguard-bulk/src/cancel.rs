//! Cancellation controller — per-job abort registry.
//!
//! Each queued or running job owns one [`JobControl`], keyed by its job key.
//! The entry is inserted at submission and removed when the job ends, so a
//! later job with the same key always starts clean.

use chrono::{DateTime, Utc};
use clawguard_core::error::{GuardError, Result};
use clawguard_core::types::ProgressSnapshot;
use clawguard_scheduler::PriorityScheduler;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Who stopped a job, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbortRecord {
    pub actor: String,
    pub at: DateTime<Utc>,
    /// Set when the job aborted itself, e.g. after losing permissions.
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Queued,
    Running,
}

#[derive(Debug)]
struct ControlState {
    phase: JobPhase,
    started_at: Option<DateTime<Utc>>,
    abort: Option<AbortRecord>,
    progress: ProgressSnapshot,
}

/// Shared control block for one job.
#[derive(Debug)]
pub struct JobControl {
    key: String,
    started_by: String,
    token: CancellationToken,
    state: Mutex<ControlState>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl JobControl {
    pub fn new(key: impl Into<String>, started_by: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            started_by: started_by.into(),
            token: CancellationToken::new(),
            state: Mutex::new(ControlState {
                phase: JobPhase::Queued,
                started_at: None,
                abort: None,
                progress: ProgressSnapshot::default(),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn started_by(&self) -> &str {
        &self.started_by
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        lock(&self.state).started_at
    }

    pub fn phase(&self) -> JobPhase {
        lock(&self.state).phase
    }

    pub fn mark_started(&self) {
        let mut st = lock(&self.state);
        st.phase = JobPhase::Running;
        st.started_at = Some(Utc::now());
    }

    /// Set the abort flag. Only the first call wins and returns true.
    pub fn request_abort(&self, actor: &str) -> bool {
        self.abort_with(actor, None)
    }

    /// Abort raised by the job itself, with a reason for the report.
    pub fn abort_fatal(&self, reason: impl Into<String>) -> bool {
        self.abort_with("system", Some(reason.into()))
    }

    fn abort_with(&self, actor: &str, reason: Option<String>) -> bool {
        let mut st = lock(&self.state);
        if st.abort.is_some() {
            return false;
        }
        st.abort = Some(AbortRecord { actor: actor.to_string(), at: Utc::now(), reason });
        st.progress.aborted = true;
        drop(st);
        self.token.cancel();
        tracing::info!("🛑 Abort requested for job {} by {actor}", self.key);
        true
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the abort flag is set.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    pub fn aborted_by(&self) -> Option<AbortRecord> {
        lock(&self.state).abort.clone()
    }

    pub fn set_progress(&self, snapshot: ProgressSnapshot) {
        let mut st = lock(&self.state);
        let aborted = st.abort.is_some();
        st.progress = ProgressSnapshot { aborted, ..snapshot };
    }

    pub fn progress(&self) -> ProgressSnapshot {
        lock(&self.state).progress
    }
}

/// Registry of live jobs, keyed by job key.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, Arc<JobControl>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a control block. Fails if the key is already queued or running.
    pub fn register(&self, key: &str, actor: &str) -> Result<Arc<JobControl>> {
        let mut jobs = lock(&self.jobs);
        if jobs.contains_key(key) {
            return Err(GuardError::validation(format!("job {key} is already queued or running")));
        }
        let control = Arc::new(JobControl::new(key, actor));
        jobs.insert(key.to_string(), Arc::clone(&control));
        Ok(control)
    }

    pub fn get(&self, key: &str) -> Option<Arc<JobControl>> {
        lock(&self.jobs).get(key).cloned()
    }

    /// Idempotent abort: true only for the first request against a live job.
    pub fn request_abort(&self, key: &str, actor: &str) -> bool {
        match self.get(key) {
            Some(control) => control.request_abort(actor),
            None => false,
        }
    }

    /// Pull a still-queued job out of the scheduler; its cancel callback runs
    /// and its workers never start. Returns false if it was not queued.
    pub fn cancel_before_start(&self, scheduler: &PriorityScheduler, key: &str) -> bool {
        let removed = scheduler.cancel_queued(|info| info.key.as_deref() == Some(key), "cancelled before start");
        removed > 0
    }

    /// Drop the entry, but only if it still belongs to `control`.
    pub fn remove(&self, control: &Arc<JobControl>) -> bool {
        let mut jobs = lock(&self.jobs);
        match jobs.get(control.key()) {
            Some(current) if Arc::ptr_eq(current, control) => {
                jobs.remove(control.key());
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.jobs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
