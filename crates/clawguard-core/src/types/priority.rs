//! Task priority — symbolic labels on one numeric scale, plus a validated
//! numeric override.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{GuardError, Result};

/// Scheduling priority. Higher weight dispatches sooner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", try_from = "PriorityRepr")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
    /// Raw weight in `0..=Priority::MAX_WEIGHT`.
    Custom(u16),
}

impl Priority {
    pub const MAX_WEIGHT: u16 = 1000;

    /// Numeric weight on the shared scale.
    pub fn weight(&self) -> u16 {
        match self {
            Priority::Low => 10,
            Priority::Normal => 50,
            Priority::High => 100,
            Priority::Critical => Self::MAX_WEIGHT,
            Priority::Custom(w) => *w,
        }
    }

    /// Build a numeric override, rejecting values off the scale.
    pub fn custom(weight: i64) -> Result<Self> {
        if !(0..=i64::from(Self::MAX_WEIGHT)).contains(&weight) {
            return Err(GuardError::validation(format!(
                "priority {weight} out of range 0..={}",
                Self::MAX_WEIGHT
            )));
        }
        Ok(Priority::Custom(weight as u16))
    }

    /// Parse, or fall back to `fallback` with a warning.
    pub fn parse_or(input: &str, fallback: Priority) -> Priority {
        match input.parse() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("{e}; using priority {fallback}");
                fallback
            }
        }
    }
}

/// Wire shape of [`Priority`]; custom weights are range-checked on the way in.
#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum PriorityRepr {
    Low,
    Normal,
    High,
    Critical,
    Custom(i64),
}

impl TryFrom<PriorityRepr> for Priority {
    type Error = GuardError;

    fn try_from(repr: PriorityRepr) -> Result<Self> {
        match repr {
            PriorityRepr::Low => Ok(Priority::Low),
            PriorityRepr::Normal => Ok(Priority::Normal),
            PriorityRepr::High => Ok(Priority::High),
            PriorityRepr::Critical => Ok(Priority::Critical),
            PriorityRepr::Custom(w) => Priority::custom(w),
        }
    }
}

impl FromStr for Priority {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" | "default" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "critical" | "urgent" => Ok(Priority::Critical),
            other => match other.parse::<i64>() {
                Ok(n) => Priority::custom(n),
                Err(_) => Err(GuardError::validation(format!("unknown priority '{s}'"))),
            },
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
            Priority::Custom(w) => write!(f, "{w}"),
        }
    }
}
