//! Console status sink — prints each status update to stdout.

use async_trait::async_trait;
use clawguard_core::traits::{StatusError, StatusHandle, StatusSink};
use std::sync::atomic::{AtomicU64, Ordering};

/// Stdout stands in for an editable message: every edit prints a new block.
#[derive(Debug, Default)]
pub struct ConsoleStatus {
    next_id: AtomicU64,
}

impl ConsoleStatus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusSink for ConsoleStatus {
    async fn post(&self, chat_id: &str, text: &str) -> Result<StatusHandle, StatusError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        println!("{text}\n");
        Ok(StatusHandle { chat_id: chat_id.to_string(), message_id: id.to_string() })
    }

    async fn edit(&self, _handle: &StatusHandle, text: &str) -> Result<(), StatusError> {
        println!("{text}\n");
        Ok(())
    }
}
