//! ClawGuard configuration — loaded from `~/.clawguard/config.toml`.
//!
//! Every section has serde defaults, so a missing file or a partial file
//! still yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{GuardError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Operator ids allowed to submit bulk jobs.
    #[serde(default)]
    pub operators: Vec<String>,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self { bot_token: String::new(), api_base: default_api_base() }
    }
}

/// Worker pool and pacing for one bulk job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl ExecutorConfig {
    pub fn min_delay(&self) -> Duration { Duration::from_millis(self.min_delay_ms) }
    pub fn max_delay(&self) -> Duration { Duration::from_millis(self.max_delay_ms) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per target before it is recorded as failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_retry_max_ms")]
    pub max_delay_ms: u64,
    /// Use the platform's retry-after hint when one is given.
    #[serde(default = "default_true")]
    pub prefer_server_hint: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_retry_base_ms(),
            max_delay_ms: default_retry_max_ms(),
            prefer_server_hint: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    #[serde(default = "default_progress_interval")]
    pub min_interval_secs: u64,
    #[serde(default = "default_progress_batch")]
    pub batch_size: usize,
    /// Failure samples shown in the final summary.
    #[serde(default = "default_failure_samples")]
    pub failure_samples: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: default_progress_interval(),
            batch_size: default_progress_batch(),
            failure_samples: default_failure_samples(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// "memory" or "sqlite".
    #[serde(default = "default_presence_backend")]
    pub backend: String,
    /// Database path for the sqlite backend (default: ~/.clawguard/presence.db).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self { backend: default_presence_backend(), path: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_priority_label")]
    pub default_priority: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { default_priority: default_priority_label() }
    }
}

fn default_api_base() -> String { "https://api.telegram.org".into() }
fn default_concurrency() -> usize { 3 }
fn default_min_delay_ms() -> u64 { 350 }
fn default_max_delay_ms() -> u64 { 900 }
fn default_max_attempts() -> u32 { 4 }
fn default_retry_base_ms() -> u64 { 1_000 }
fn default_retry_max_ms() -> u64 { 30_000 }
fn default_true() -> bool { true }
fn default_progress_interval() -> u64 { 5 }
fn default_progress_batch() -> usize { 25 }
fn default_failure_samples() -> usize { 5 }
fn default_presence_backend() -> String { "sqlite".into() }
fn default_priority_label() -> String { "normal".into() }

impl GuardConfig {
    /// ClawGuard home directory (`~/.clawguard`).
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".clawguard")
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Load from the default path, falling back to defaults when absent.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from an explicit path. A missing file is an error here.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(GuardError::ConfigNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: GuardConfig = toml::from_str(&content)?;
        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject settings the executor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.executor.concurrency == 0 {
            return Err(GuardError::config("executor.concurrency must be at least 1"));
        }
        if self.executor.min_delay_ms > self.executor.max_delay_ms {
            return Err(GuardError::config("executor.min_delay_ms exceeds executor.max_delay_ms"));
        }
        if self.retry.max_attempts == 0 {
            return Err(GuardError::config("retry.max_attempts must be at least 1"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(GuardError::config("retry.base_delay_ms exceeds retry.max_delay_ms"));
        }
        Ok(())
    }

    /// Presence database path, honouring the configured override.
    pub fn presence_path(&self) -> PathBuf {
        match &self.presence.path {
            Some(p) => PathBuf::from(shellexpand::tilde(p).into_owned()),
            None => Self::home_dir().join("presence.db"),
        }
    }

    /// Write the config to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| GuardError::config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Render as TOML with the bot token masked.
    pub fn to_masked_toml(&self) -> Result<String> {
        let mut copy = self.clone();
        if !copy.telegram.bot_token.is_empty() {
            copy.telegram.bot_token = "***".into();
        }
        toml::to_string_pretty(&copy).map_err(|e| GuardError::config(e.to_string()))
    }
}
