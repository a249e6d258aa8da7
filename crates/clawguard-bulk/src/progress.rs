//! Progress reporter — one editable status message per job.
//!
//! Updates are throttled: an edit goes out once `min_interval` has passed or
//! `batch_size` more targets were processed since the last one, whichever
//! comes first. Edits run through a single-flight chain. A request arriving
//! while an edit is in flight replaces the pending snapshot and is sent by
//! the same chain afterwards, so edits never interleave.

use clawguard_core::config::ProgressConfig;
use clawguard_core::traits::{StatusError, StatusHandle, StatusSink};
use clawguard_core::types::ProgressSnapshot;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::report::render_progress;

#[derive(Debug, Clone, Copy)]
pub struct ProgressPolicy {
    pub min_interval: Duration,
    pub batch_size: usize,
}

impl ProgressPolicy {
    pub fn from_config(config: &ProgressConfig) -> Self {
        Self {
            min_interval: Duration::from_secs(config.min_interval_secs),
            batch_size: config.batch_size.max(1),
        }
    }
}

struct Throttle {
    last_emit: Instant,
    last_processed: usize,
    pending: Option<ProgressSnapshot>,
    in_flight: bool,
    closed: bool,
}

struct Slot {
    handle: Option<StatusHandle>,
    finished: bool,
}

pub struct ProgressReporter {
    sink: Arc<dyn StatusSink>,
    chat_id: String,
    title: String,
    policy: ProgressPolicy,
    throttle: Mutex<Throttle>,
    slot: tokio::sync::Mutex<Slot>,
}

impl ProgressReporter {
    pub fn new(
        sink: Arc<dyn StatusSink>,
        chat_id: impl Into<String>,
        title: impl Into<String>,
        policy: ProgressPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            sink,
            chat_id: chat_id.into(),
            title: title.into(),
            policy,
            throttle: Mutex::new(Throttle {
                last_emit: Instant::now(),
                last_processed: 0,
                pending: None,
                in_flight: false,
                closed: false,
            }),
            slot: tokio::sync::Mutex::new(Slot { handle: None, finished: false }),
        })
    }

    fn throttle(&self) -> MutexGuard<'_, Throttle> {
        self.throttle.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Post or edit the status message right away, outside the throttle.
    pub async fn announce(&self, text: &str) {
        let mut slot = self.slot.lock().await;
        if slot.finished {
            return;
        }
        self.write(&mut slot, text).await;
        let mut t = self.throttle();
        t.last_emit = Instant::now();
    }

    /// Throttled, non-blocking progress update.
    pub fn update(self: &Arc<Self>, snapshot: ProgressSnapshot) {
        let start_chain = {
            let mut t = self.throttle();
            if t.closed {
                return;
            }
            let by_time = t.last_emit.elapsed() >= self.policy.min_interval;
            let by_batch = snapshot.processed.saturating_sub(t.last_processed) >= self.policy.batch_size;
            if !(by_time || by_batch) {
                return;
            }
            t.last_emit = Instant::now();
            t.last_processed = snapshot.processed;
            t.pending = Some(snapshot);
            if t.in_flight {
                false
            } else {
                t.in_flight = true;
                true
            }
        };

        if start_chain {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.drain().await });
        }
    }

    async fn drain(&self) {
        loop {
            let next = {
                let mut t = self.throttle();
                match t.pending.take() {
                    Some(snapshot) => snapshot,
                    None => {
                        t.in_flight = false;
                        return;
                    }
                }
            };
            let text = render_progress(&self.title, &next);
            let mut slot = self.slot.lock().await;
            if slot.finished {
                continue;
            }
            self.write(&mut slot, &text).await;
        }
    }

    /// Forced final update. Later updates are ignored.
    pub async fn finish(&self, text: &str) {
        {
            let mut t = self.throttle();
            t.closed = true;
            t.pending = None;
        }
        let mut slot = self.slot.lock().await;
        if slot.finished {
            return;
        }
        let had_message = slot.handle.is_some();
        self.write(&mut slot, text).await;
        if had_message && slot.handle.is_none() {
            // Message vanished under us: post the summary fresh.
            self.write(&mut slot, text).await;
        }
        slot.finished = true;
    }

    async fn write(&self, slot: &mut Slot, text: &str) {
        match &slot.handle {
            None => match self.sink.post(&self.chat_id, text).await {
                Ok(handle) => slot.handle = Some(handle),
                Err(e) => tracing::warn!("Status post failed for '{}': {e}", self.title),
            },
            Some(handle) => match self.sink.edit(handle, text).await {
                Ok(()) | Err(StatusError::Unchanged) => {}
                Err(StatusError::Gone) => {
                    tracing::debug!("Status message for '{}' is gone, will re-post", self.title);
                    slot.handle = None;
                }
                Err(e) => tracing::warn!("Status edit failed for '{}': {e}", self.title),
            },
        }
    }
}
