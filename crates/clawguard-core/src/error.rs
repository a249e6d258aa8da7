//! Unified error types for ClawGuard.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using GuardError.
pub type Result<T> = std::result::Result<T, GuardError>;

#[derive(Error, Debug)]
pub enum GuardError {
    // Request errors (job never enqueued)
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not authorized: {0}")]
    Authorization(String),

    // Platform errors
    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Platform error: {0}")]
    Platform(String),

    // Collaborator errors
    #[error("Presence store error: {0}")]
    Presence(String),

    /// A scheduled job crashed instead of returning.
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl GuardError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform(msg.into())
    }

    pub fn presence(msg: impl Into<String>) -> Self {
        Self::Presence(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
