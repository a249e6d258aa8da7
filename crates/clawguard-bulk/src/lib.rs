//! # ClawGuard Bulk
//!
//! Long-running moderation jobs: purging a group's tracked members and
//! propagating a decision about one identity across every group it was seen in.
//!
//! ## Architecture
//! ```text
//! ModerationService::submit_job
//!     │ validate → authorize → register key → post "accepted"
//!     ▼
//! PriorityScheduler (one active job)
//!     │
//!     ▼
//! JobTask ──► purge::run / propagate::run
//!                 │ targets + protected set
//!                 ▼
//!          BulkActionExecutor ── C workers ──► TargetAction::apply
//!                 │                 │ retry (RetryPolicy) + jitter
//!                 │                 └─► ProgressReporter (throttled edits)
//!                 ▼
//!          ExecutionSummary ──► JobReport ──► final status message
//! ```
//!
//! Abort requests go through [`cancel::JobRegistry`]: a queued job is pulled
//! from the scheduler, a running job stops before its next target.

pub mod actions;
pub mod cancel;
pub mod executor;
pub mod progress;
pub mod propagate;
pub mod purge;
pub mod report;
pub mod retry;
pub mod service;

pub use actions::{RemoveMember, SanctionInGroups};
pub use cancel::{AbortRecord, JobControl, JobPhase, JobRegistry};
pub use executor::{BulkActionExecutor, ExecutionSummary, ExecutorPolicy, TargetAction};
pub use progress::{ProgressPolicy, ProgressReporter};
pub use report::JobReport;
pub use retry::{Jitter, RetryPolicy};
pub use service::{Collaborators, JobHandle, JobResult, ModerationService};
