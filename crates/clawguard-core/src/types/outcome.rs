//! Per-target results and job progress counters.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Classified result of one platform action call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    Applied,
    /// Target is already gone; counts as success.
    NotFound,
    RateLimited { retry_after: Option<Duration> },
    /// The executor lost the rights it needs. Fatal for the whole job.
    Forbidden(String),
    Failed(String),
}

/// Terminal state recorded for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Applied,
    AlreadyAbsent,
    Failed,
    SkippedProtected,
}

impl OutcomeKind {
    /// Applied and already-absent both leave the target in the desired state.
    pub fn is_settled(&self) -> bool {
        matches!(self, OutcomeKind::Applied | OutcomeKind::AlreadyAbsent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub target_id: String,
    pub result: OutcomeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ActionOutcome {
    pub fn applied(target_id: impl Into<String>) -> Self {
        Self { target_id: target_id.into(), result: OutcomeKind::Applied, reason: None }
    }

    pub fn already_absent(target_id: impl Into<String>) -> Self {
        Self { target_id: target_id.into(), result: OutcomeKind::AlreadyAbsent, reason: None }
    }

    pub fn skipped_protected(target_id: impl Into<String>) -> Self {
        Self { target_id: target_id.into(), result: OutcomeKind::SkippedProtected, reason: None }
    }

    pub fn failed(target_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            result: OutcomeKind::Failed,
            reason: Some(reason.into()),
        }
    }
}

/// Live counters for a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub processed: usize,
    pub total: usize,
    pub applied: usize,
    pub already_absent: usize,
    pub failed: usize,
    pub skipped_protected: usize,
    pub aborted: bool,
}

impl ProgressSnapshot {
    pub fn new(total: usize) -> Self {
        Self { total, ..Default::default() }
    }

    pub fn record(&mut self, kind: OutcomeKind) {
        self.processed += 1;
        match kind {
            OutcomeKind::Applied => self.applied += 1,
            OutcomeKind::AlreadyAbsent => self.already_absent += 1,
            OutcomeKind::Failed => self.failed += 1,
            OutcomeKind::SkippedProtected => self.skipped_protected += 1,
        }
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.processed)
    }
}
