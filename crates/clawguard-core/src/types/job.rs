//! Bulk job requests.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{GuardError, Result};

/// Per-group action applied when propagating a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropagationMode {
    Mute,
    Remove,
}

impl FromStr for PropagationMode {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mute" | "restrict" => Ok(PropagationMode::Mute),
            "remove" | "ban" => Ok(PropagationMode::Remove),
            other => Err(GuardError::validation(format!("unknown propagation mode '{other}'"))),
        }
    }
}

impl std::fmt::Display for PropagationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropagationMode::Mute => write!(f, "mute"),
            PropagationMode::Remove => write!(f, "remove"),
        }
    }
}

/// What a bulk job does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    /// Remove every tracked member of a group except protected ones.
    /// `soft` reverses each ban right away so it acts as a kick.
    PurgeMembers { group_id: String, soft: bool },
    /// Apply one action in every group where `identity` was seen.
    Propagate {
        identity: String,
        mode: PropagationMode,
        #[serde(default)]
        origin_group: Option<String>,
    },
}

impl JobKind {
    /// Registry key; at most one job per key is queued or running.
    pub fn job_key(&self) -> String {
        match self {
            JobKind::PurgeMembers { group_id, .. } => format!("purge:{group_id}"),
            JobKind::Propagate { identity, .. } => format!("propagate:{identity}"),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobKind::PurgeMembers { soft: true, .. } => "Kick members",
            JobKind::PurgeMembers { soft: false, .. } => "Remove members",
            JobKind::Propagate { .. } => "Propagate decision",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            JobKind::PurgeMembers { group_id, .. } => {
                if group_id.trim().is_empty() {
                    return Err(GuardError::validation("group id is empty"));
                }
            }
            JobKind::Propagate { identity, origin_group, .. } => {
                if identity.trim().is_empty() {
                    return Err(GuardError::validation("identity is empty"));
                }
                if origin_group.as_deref().is_some_and(|g| g.trim().is_empty()) {
                    return Err(GuardError::validation("origin group is empty"));
                }
            }
        }
        Ok(())
    }
}

/// An operator's request to run a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub kind: JobKind,
    /// Operator submitting the job.
    pub actor: String,
    /// Chat where acceptance, progress and the summary are posted.
    #[serde(default)]
    pub reply_chat: Option<String>,
}

impl JobRequest {
    pub fn new(kind: JobKind, actor: impl Into<String>) -> Self {
        Self { kind, actor: actor.into(), reply_chat: None }
    }

    pub fn reply_to(mut self, chat: impl Into<String>) -> Self {
        self.reply_chat = Some(chat.into());
        self
    }
}
