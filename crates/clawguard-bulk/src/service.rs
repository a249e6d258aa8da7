//! Moderation service — the entry point the command layer talks to.
//!
//! `submit_job` validates and authorizes a request, registers its control
//! block, posts the acceptance message and queues it on the priority
//! scheduler. `request_abort` and `query_status` address jobs by job key.

use clawguard_core::config::GuardConfig;
use clawguard_core::error::{GuardError, Result};
use clawguard_core::traits::{AuthorizationService, PlatformActionClient, PresenceStore, StatusSink};
use clawguard_core::types::{JobKind, JobRequest, Priority, ProgressSnapshot};
use clawguard_scheduler::{PriorityScheduler, ScheduledTask, TaskHandle, TaskId, TaskStatus};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::cancel::{JobControl, JobPhase, JobRegistry};
use crate::executor::{BulkActionExecutor, ExecutionSummary, ExecutorPolicy};
use crate::progress::{ProgressPolicy, ProgressReporter};
use crate::report::{render_accepted, render_cancelled, render_failed, JobReport};
use crate::{propagate, purge};

/// External systems a job needs.
#[derive(Clone)]
pub struct Collaborators {
    pub presence: Arc<dyn PresenceStore>,
    pub platform: Arc<dyn PlatformActionClient>,
    pub auth: Arc<dyn AuthorizationService>,
    pub status: Arc<dyn StatusSink>,
}

struct ServiceInner {
    collab: Collaborators,
    executor: BulkActionExecutor,
    progress: ProgressPolicy,
    failure_samples: usize,
    registry: JobRegistry,
}

/// Handle returned for an accepted job.
#[derive(Debug)]
pub struct JobHandle {
    pub key: String,
    pub priority: Priority,
    task: TaskHandle,
    summary: oneshot::Receiver<ExecutionSummary>,
}

/// How a job ended.
#[derive(Debug)]
pub struct JobResult {
    pub status: TaskStatus,
    /// Present when the executor ran to completion or abort.
    pub summary: Option<ExecutionSummary>,
}

impl JobHandle {
    pub fn task_id(&self) -> TaskId {
        self.task.id
    }

    pub async fn wait(self) -> JobResult {
        let status = self.task.wait().await;
        let summary = self.summary.await.ok();
        JobResult { status, summary }
    }
}

pub struct ModerationService {
    inner: Arc<ServiceInner>,
    scheduler: Arc<PriorityScheduler>,
    default_priority: Priority,
}

impl ModerationService {
    pub fn new(config: &GuardConfig, collab: Collaborators) -> Result<Self> {
        Self::with_scheduler(config, collab, PriorityScheduler::new())
    }

    /// Share an existing scheduler so other heavy tasks queue behind the same slot.
    pub fn with_scheduler(
        config: &GuardConfig,
        collab: Collaborators,
        scheduler: Arc<PriorityScheduler>,
    ) -> Result<Self> {
        config.validate()?;
        let default_priority: Priority = config
            .scheduler
            .default_priority
            .parse()
            .map_err(|e| GuardError::config(format!("scheduler.default_priority: {e}")))?;

        let inner = ServiceInner {
            collab,
            executor: BulkActionExecutor::new(ExecutorPolicy::from_config(config)),
            progress: ProgressPolicy::from_config(&config.progress),
            failure_samples: config.progress.failure_samples,
            registry: JobRegistry::new(),
        };
        Ok(Self { inner: Arc::new(inner), scheduler, default_priority })
    }

    pub fn scheduler(&self) -> &Arc<PriorityScheduler> {
        &self.scheduler
    }

    pub fn default_priority(&self) -> Priority {
        self.default_priority
    }

    /// Validate, authorize, announce and queue a job.
    pub async fn submit_job(&self, request: JobRequest, priority: Option<Priority>) -> Result<JobHandle> {
        request.kind.validate()?;
        if !self.inner.collab.auth.is_authorized_operator(&request.actor).await {
            tracing::warn!("🔒 {} tried to submit {} without rights", request.actor, request.kind.job_key());
            return Err(GuardError::authorization(format!("{} may not run bulk jobs", request.actor)));
        }

        let priority = priority.unwrap_or(self.default_priority);
        let key = request.kind.job_key();
        let control = self.inner.registry.register(&key, &request.actor)?;

        let title = job_title(&request.kind);
        let chat = request.reply_chat.clone().unwrap_or_else(|| request.actor.clone());
        let reporter = ProgressReporter::new(
            Arc::clone(&self.inner.collab.status),
            chat,
            title.clone(),
            self.inner.progress,
        );
        let waiting = self.scheduler.len() + usize::from(self.scheduler.active().is_some());
        reporter.announce(&render_accepted(&title, &key, priority, waiting)).await;

        let (summary_tx, summary_rx) = oneshot::channel();
        let task = JobTask {
            key: key.clone(),
            kind: request.kind,
            title,
            control,
            reporter,
            inner: Arc::clone(&self.inner),
            summary_tx,
        };
        let handle = self.scheduler.enqueue(Box::new(task), priority);
        tracing::info!("📋 Job {key} accepted from {} at priority {priority}", request.actor);

        Ok(JobHandle { key, priority, task: handle, summary: summary_rx })
    }

    /// Abort a queued or running job. True only for the first request.
    pub async fn request_abort(&self, key: &str, actor: &str) -> bool {
        let Some(control) = self.inner.registry.get(key) else {
            return false;
        };
        if !control.request_abort(actor) {
            return false;
        }
        if control.phase() == JobPhase::Queued {
            // If dispatch won the race, the run sees the flag before any target.
            self.inner.registry.cancel_before_start(&self.scheduler, key);
        }
        true
    }

    /// Live counters for a queued or running job.
    pub fn query_status(&self, key: &str) -> Option<ProgressSnapshot> {
        self.inner.registry.get(key).map(|c| c.progress())
    }
}

fn job_title(kind: &JobKind) -> String {
    match kind {
        JobKind::PurgeMembers { group_id, .. } => format!("{} · group {group_id}", kind.label()),
        JobKind::Propagate { identity, mode, .. } => format!("{} ({mode}) · identity {identity}", kind.label()),
    }
}

struct JobTask {
    key: String,
    kind: JobKind,
    title: String,
    control: Arc<JobControl>,
    reporter: Arc<ProgressReporter>,
    inner: Arc<ServiceInner>,
    summary_tx: oneshot::Sender<ExecutionSummary>,
}

impl JobTask {
    async fn execute(self) -> Result<()> {
        let JobTask { key, kind, title, control, reporter, inner, summary_tx } = self;
        let _release = ReleaseKey { registry: &inner.registry, control: &control };
        control.mark_started();

        if control.is_aborted() {
            reporter.finish(&render_cancelled(&title, control.aborted_by().as_ref())).await;
            return Ok(());
        }
        reporter.announce(&format!("⚙️ {title}: started")).await;

        let run = run_kind(&inner, &kind, &control, &reporter);
        let result = match AssertUnwindSafe(run).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(GuardError::Scheduler(format!("job crashed: {}", panic_message(payload.as_ref())))),
        };

        match result {
            Ok((summary, details)) => {
                let text = JobReport::new(&title, &summary)
                    .started(control.started_by(), control.started_at())
                    .with_samples(inner.failure_samples)
                    .with_details(details)
                    .render();
                reporter.finish(&text).await;
                let _ = summary_tx.send(summary);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Job {key} could not run: {e}");
                reporter.finish(&render_failed(&title, &e)).await;
                Err(e)
            }
        }
    }
}

async fn run_kind(
    inner: &ServiceInner,
    kind: &JobKind,
    control: &Arc<JobControl>,
    reporter: &Arc<ProgressReporter>,
) -> Result<(ExecutionSummary, Vec<String>)> {
    let collab = &inner.collab;
    let executor = &inner.executor;
    match kind {
        JobKind::PurgeMembers { group_id, soft } => purge::run(collab, executor, control, Some(reporter), group_id, *soft)
            .await
            .map(|summary| (summary, vec![])),
        JobKind::Propagate { identity, mode, origin_group } => {
            propagate::run(collab, executor, control, Some(reporter), identity, *mode, origin_group.as_deref())
                .await
                .map(|run| (run.summary, run.details))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Frees the job key when the run ends, whichever way it ends.
struct ReleaseKey<'a> {
    registry: &'a JobRegistry,
    control: &'a Arc<JobControl>,
}

impl Drop for ReleaseKey<'_> {
    fn drop(&mut self) {
        self.registry.remove(self.control);
    }
}

impl ScheduledTask for JobTask {
    fn kind(&self) -> &str {
        match self.kind {
            JobKind::PurgeMembers { .. } => "purge",
            JobKind::Propagate { .. } => "propagate",
        }
    }

    fn key(&self) -> Option<&str> {
        Some(&self.key)
    }

    fn run(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        Box::pin(self.execute())
    }

    fn cancel(self: Box<Self>, reason: &str) {
        tracing::info!("Job {} dropped from queue: {reason}", self.key);
        self.inner.registry.remove(&self.control);
        let text = render_cancelled(&self.title, self.control.aborted_by().as_ref());
        let reporter = Arc::clone(&self.reporter);
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                rt.spawn(async move { reporter.finish(&text).await });
            }
            Err(_) => tracing::warn!("No runtime to post cancellation of {}", self.key),
        }
    }
}
