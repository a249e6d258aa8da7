//! Priority scheduler engine — serializes heavy jobs, one active at a time.

use clawguard_core::types::Priority;
use std::cmp::Reverse;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

use crate::tasks::{ScheduledTask, TaskHandle, TaskId, TaskInfo, TaskStatus};

struct QueuedTask {
    info: TaskInfo,
    task: Box<dyn ScheduledTask>,
    done: oneshot::Sender<TaskStatus>,
}

#[derive(Default)]
struct SchedulerState {
    /// Set ⇒ no other task is running.
    active: Option<TaskInfo>,
    queue: Vec<QueuedTask>,
    next_seq: u64,
}

impl SchedulerState {
    /// Index of the next task: highest weight, then lowest sequence.
    fn next_index(&self) -> Option<usize> {
        self.queue
            .iter()
            .enumerate()
            .max_by_key(|(_, q)| (q.info.priority.weight(), Reverse(q.info.sequence)))
            .map(|(idx, _)| idx)
    }
}

/// Global priority scheduler.
pub struct PriorityScheduler {
    state: Mutex<SchedulerState>,
}

impl PriorityScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { state: Mutex::new(SchedulerState::default()) })
    }

    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        // State stays consistent across a panic: every mutation is a single push/remove/assign.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a task and dispatch if idle.
    pub fn enqueue(self: &Arc<Self>, task: Box<dyn ScheduledTask>, priority: Priority) -> TaskHandle {
        let (tx, rx) = oneshot::channel();
        let (id, sequence) = {
            let mut st = self.state();
            st.next_seq += 1;
            let sequence = st.next_seq;
            let info = TaskInfo {
                id: sequence,
                kind: task.kind().to_string(),
                key: task.key().map(String::from),
                priority,
                sequence,
                status: TaskStatus::Queued,
                enqueued_at: chrono::Utc::now(),
            };
            tracing::debug!(
                "📥 Queued task #{} ({}) at priority {}, {} waiting",
                info.id, info.kind, priority, st.queue.len() + 1
            );
            st.queue.push(QueuedTask { info, task, done: tx });
            (sequence, sequence)
        };
        self.dispatch();
        TaskHandle { id, sequence, done: rx }
    }

    /// Start the best queued task if nothing is active.
    ///
    /// The task leaves the queue and takes the active slot under one lock,
    /// before `run()` is invoked, so re-entrant calls cannot start a second one.
    pub fn dispatch(self: &Arc<Self>) {
        let next = {
            let mut st = self.state();
            if st.active.is_some() {
                return;
            }
            let Some(idx) = st.next_index() else {
                return;
            };
            let mut queued = st.queue.remove(idx);
            queued.info.status = TaskStatus::Running;
            st.active = Some(queued.info.clone());
            queued
        };

        let QueuedTask { info, task, done } = next;
        tracing::info!("▶️ Running task #{} ({}, priority {})", info.id, info.kind, info.priority);

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            // Own task so a panic in the body surfaces as a JoinError.
            let status = match tokio::spawn(task.run()).await {
                Ok(Ok(())) => {
                    tracing::info!("✅ Task #{} ({}) completed", info.id, info.kind);
                    TaskStatus::Completed
                }
                Ok(Err(e)) => {
                    tracing::error!("❌ Task #{} ({}) failed: {e}", info.id, info.kind);
                    TaskStatus::Failed
                }
                Err(e) => {
                    tracing::error!("💥 Task #{} ({}) panicked: {e}", info.id, info.kind);
                    TaskStatus::Failed
                }
            };
            scheduler.settle(info.id);
            let _ = done.send(status);
            scheduler.dispatch();
        });
    }

    fn settle(&self, id: TaskId) {
        let mut st = self.state();
        if st.active.as_ref().is_some_and(|a| a.id == id) {
            st.active = None;
        }
    }

    /// Drop matching tasks that have not started, calling each one's `cancel`.
    /// Returns how many were removed.
    pub fn cancel_queued<P>(&self, predicate: P, reason: &str) -> usize
    where
        P: Fn(&TaskInfo) -> bool,
    {
        let removed: Vec<QueuedTask> = {
            let mut st = self.state();
            let (matched, kept) = std::mem::take(&mut st.queue)
                .into_iter()
                .partition(|q| predicate(&q.info));
            st.queue = kept;
            matched
        };

        let count = removed.len();
        for QueuedTask { info, task, done } in removed {
            tracing::info!("🚫 Cancelled queued task #{} ({}): {reason}", info.id, info.kind);
            task.cancel(reason);
            let _ = done.send(TaskStatus::Cancelled);
        }
        count
    }

    /// Currently running task.
    pub fn active(&self) -> Option<TaskInfo> {
        self.state().active.clone()
    }

    /// Queued tasks in the order they would dispatch.
    pub fn queued(&self) -> Vec<TaskInfo> {
        let mut infos: Vec<TaskInfo> = self.state().queue.iter().map(|q| q.info.clone()).collect();
        infos.sort_by_key(|i| (Reverse(i.priority.weight()), i.sequence));
        infos
    }

    pub fn len(&self) -> usize {
        self.state().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// No active task and nothing queued.
    pub fn is_idle(&self) -> bool {
        let st = self.state();
        st.active.is_none() && st.queue.is_empty()
    }
}
