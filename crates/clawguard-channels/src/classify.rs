//! Error-reply classification for Bot API calls.
//!
//! ```text
//! 429                                          → RateLimited(retry_after)
//! user not found / PARTICIPANT_ID_INVALID /
//!   USER_NOT_PARTICIPANT / member not found    → NotFound
//! 403 / not enough rights / need administrator → Forbidden
//! anything else                                → Failed
//! ```

use clawguard_core::traits::StatusError;
use clawguard_core::types::ActionResult;
use std::time::Duration;

/// An unsuccessful Bot API reply. `code` is 0 when the request never got an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    pub code: u16,
    pub description: String,
    pub retry_after: Option<u64>,
}

impl ApiFailure {
    pub fn transport(description: impl Into<String>) -> Self {
        Self { code: 0, description: description.into(), retry_after: None }
    }
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.code == 0 {
            write!(f, "{}", self.description)
        } else {
            write!(f, "{} ({})", self.description, self.code)
        }
    }
}

const ABSENT_MARKERS: &[&str] = &["user not found", "participant_id_invalid", "user_not_participant", "member not found"];
const FORBIDDEN_MARKERS: &[&str] = &["not enough rights", "need administrator rights"];

/// Classify a failed moderation call.
pub fn classify_action(failure: &ApiFailure) -> ActionResult {
    let text = failure.description.to_lowercase();
    if failure.code == 429 {
        return ActionResult::RateLimited { retry_after: failure.retry_after.map(Duration::from_secs) };
    }
    if ABSENT_MARKERS.iter().any(|m| text.contains(m)) {
        return ActionResult::NotFound;
    }
    if failure.code == 403 || FORBIDDEN_MARKERS.iter().any(|m| text.contains(m)) {
        return ActionResult::Forbidden(failure.description.clone());
    }
    ActionResult::Failed(failure.to_string())
}

/// Classify a failed status-message edit.
pub fn classify_edit(failure: &ApiFailure) -> StatusError {
    let text = failure.description.to_lowercase();
    if text.contains("message is not modified") {
        StatusError::Unchanged
    } else if text.contains("message to edit not found") {
        StatusError::Gone
    } else {
        StatusError::Other(failure.to_string())
    }
}
