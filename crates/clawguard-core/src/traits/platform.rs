//! PlatformActionClient trait — moderation calls against the chat platform.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::ActionResult;

/// Options for a removal (ban) call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemovalOptions {
    /// Also delete the target's messages in the group.
    #[serde(default)]
    pub revoke_messages: bool,
    /// Ban expiry; `None` bans permanently.
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
}

/// Member permissions applied by a restriction call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberPermissions {
    pub can_send_messages: bool,
    pub can_send_media: bool,
    pub can_send_other: bool,
    pub can_add_web_page_previews: bool,
}

impl MemberPermissions {
    /// Everything revoked.
    pub fn muted() -> Self {
        Self {
            can_send_messages: false,
            can_send_media: false,
            can_send_other: false,
            can_add_web_page_previews: false,
        }
    }
}

/// Every call returns a classified [`ActionResult`] instead of an error, so
/// per-target failures stay data inside the executor.
#[async_trait]
pub trait PlatformActionClient: Send + Sync {
    fn name(&self) -> &str;

    /// Identity the executor acts as. Always protected.
    async fn own_identity(&self) -> Result<String>;

    async fn apply_removal(&self, group_id: &str, target_id: &str, opts: &RemovalOptions) -> ActionResult;

    async fn apply_restriction(
        &self,
        group_id: &str,
        target_id: &str,
        permissions: &MemberPermissions,
    ) -> ActionResult;

    /// Best-effort reversal of a removal, turning a ban into a kick.
    async fn reverse_removal(&self, group_id: &str, target_id: &str) -> ActionResult;

    /// Human-readable group title, if the platform exposes one.
    async fn group_title(&self, _group_id: &str) -> Option<String> {
        None
    }
}
