//! Task definitions for the priority scheduler.

use chrono::{DateTime, Utc};
use clawguard_core::error::Result;
use clawguard_core::types::Priority;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::oneshot;

pub type TaskId = u64;

/// Lifecycle of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    /// The body returned an error or panicked.
    Failed,
    /// Removed from the queue before it ever ran.
    Cancelled,
}

/// A unit of scheduled work.
///
/// Exactly one of `run` or `cancel` is called, once.
pub trait ScheduledTask: Send + 'static {
    fn kind(&self) -> &str;

    /// Optional job key, used to find a queued task again.
    fn key(&self) -> Option<&str> {
        None
    }

    fn run(self: Box<Self>) -> BoxFuture<'static, Result<()>>;

    /// Called instead of `run` when the task is dropped from the queue.
    fn cancel(self: Box<Self>, reason: &str);
}

/// Snapshot of a task's scheduling metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub id: TaskId,
    pub kind: String,
    pub key: Option<String>,
    pub priority: Priority,
    pub sequence: u64,
    pub status: TaskStatus,
    pub enqueued_at: DateTime<Utc>,
}

/// Returned by `enqueue`; resolves once the task settles.
#[derive(Debug)]
pub struct TaskHandle {
    pub id: TaskId,
    pub sequence: u64,
    pub(crate) done: oneshot::Receiver<TaskStatus>,
}

impl TaskHandle {
    /// Wait for the final status.
    pub async fn wait(self) -> TaskStatus {
        // A dropped sender means the scheduler went away with the task queued.
        self.done.await.unwrap_or(TaskStatus::Cancelled)
    }
}

type CancelHook = Box<dyn FnOnce(&str) + Send>;

/// Closure-backed task.
pub struct FnTask<F> {
    kind: String,
    key: Option<String>,
    body: F,
    on_cancel: Option<CancelHook>,
}

impl<F, Fut> FnTask<F>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    pub fn new(kind: impl Into<String>, body: F) -> Self {
        Self { kind: kind.into(), key: None, body, on_cancel: None }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn on_cancel(mut self, hook: impl FnOnce(&str) + Send + 'static) -> Self {
        self.on_cancel = Some(Box::new(hook));
        self
    }
}

impl<F, Fut> ScheduledTask for FnTask<F>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn kind(&self) -> &str {
        &self.kind
    }

    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn run(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        Box::pin((self.body)())
    }

    fn cancel(self: Box<Self>, reason: &str) {
        if let Some(hook) = self.on_cancel {
            hook(reason);
        }
    }
}
