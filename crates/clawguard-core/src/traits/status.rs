//! StatusSink trait — the editable status message a job reports through.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A posted status message that can be edited later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHandle {
    pub chat_id: String,
    pub message_id: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    /// The message no longer exists; post a new one.
    #[error("status message is gone")]
    Gone,
    /// The edit would not change the text.
    #[error("status content unchanged")]
    Unchanged,
    #[error("status update failed: {0}")]
    Other(String),
}

#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn post(&self, chat_id: &str, text: &str) -> std::result::Result<StatusHandle, StatusError>;

    async fn edit(&self, handle: &StatusHandle, text: &str) -> std::result::Result<(), StatusError>;
}
