//! Retry and pacing strategy for platform calls.

use clawguard_core::config::{ExecutorConfig, RetryConfig};
use rand::Rng;
use std::time::Duration;

/// Per-target retry policy: an attempt ceiling plus a wait computation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per target, first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Wait exactly the platform's retry-after hint when it sends one.
    pub prefer_server_hint: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            prefer_server_hint: config.prefer_server_hint,
        }
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based).
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Exponential fallback: base · 2^(attempt-1), capped at `max_delay`.
    pub fn exponential(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << shift).min(self.max_delay)
    }

    /// Wait before retrying after attempt `attempt` failed.
    ///
    /// A server hint is never undercut: waiting less only earns another 429.
    pub fn backoff(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let fallback = self.exponential(attempt);
        match hint {
            Some(h) if self.prefer_server_hint => h,
            Some(h) => fallback.max(h),
            None => fallback,
        }
    }
}

/// Uniform random pause between two actions of one worker.
#[derive(Debug, Clone, Copy)]
pub struct Jitter {
    pub min: Duration,
    pub max: Duration,
}

impl Jitter {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max { Self { min, max } } else { Self { min: max, max: min } }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(config.min_delay(), config.max_delay())
    }

    pub fn sample(&self) -> Duration {
        let lo = self.min.as_millis() as u64;
        let hi = self.max.as_millis() as u64;
        if lo >= hi {
            return self.min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }
}
