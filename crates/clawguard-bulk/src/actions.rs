//! Concrete target actions built on the platform client.

use async_trait::async_trait;
use clawguard_core::error::Result;
use clawguard_core::traits::{MemberPermissions, PlatformActionClient, PresenceStore, RemovalOptions};
use clawguard_core::types::{ActionResult, PropagationMode};
use std::sync::Arc;

use crate::executor::TargetAction;

/// Remove members from one group. Targets are member ids.
pub struct RemoveMember {
    platform: Arc<dyn PlatformActionClient>,
    presence: Arc<dyn PresenceStore>,
    group_id: String,
    /// Lift the ban right after applying it, so the removal reads as a kick.
    soft: bool,
}

impl RemoveMember {
    pub fn new(
        platform: Arc<dyn PlatformActionClient>,
        presence: Arc<dyn PresenceStore>,
        group_id: impl Into<String>,
        soft: bool,
    ) -> Self {
        Self { platform, presence, group_id: group_id.into(), soft }
    }
}

#[async_trait]
impl TargetAction for RemoveMember {
    fn describe(&self) -> String {
        let verb = if self.soft { "kick" } else { "ban" };
        format!("{verb} members of {}", self.group_id)
    }

    async fn apply(&self, target: &str) -> ActionResult {
        self.platform.apply_removal(&self.group_id, target, &RemovalOptions::default()).await
    }

    async fn after_applied(&self, target: &str) {
        if !self.soft {
            return;
        }
        match self.platform.reverse_removal(&self.group_id, target).await {
            ActionResult::Applied | ActionResult::NotFound => {}
            other => tracing::warn!("Could not lift ban for {target} in {}: {other:?}", self.group_id),
        }
    }

    async fn prune(&self, settled: &[String]) -> Result<usize> {
        self.presence.prune_targets(&self.group_id, settled).await
    }
}

/// Sanction one identity across groups. Targets are group ids.
pub struct SanctionInGroups {
    platform: Arc<dyn PlatformActionClient>,
    presence: Arc<dyn PresenceStore>,
    identity: String,
    mode: PropagationMode,
}

impl SanctionInGroups {
    pub fn new(
        platform: Arc<dyn PlatformActionClient>,
        presence: Arc<dyn PresenceStore>,
        identity: impl Into<String>,
        mode: PropagationMode,
    ) -> Self {
        Self { platform, presence, identity: identity.into(), mode }
    }
}

#[async_trait]
impl TargetAction for SanctionInGroups {
    fn describe(&self) -> String {
        format!("{} {} across groups", self.mode, self.identity)
    }

    async fn apply(&self, group_id: &str) -> ActionResult {
        match self.mode {
            PropagationMode::Mute => {
                self.platform
                    .apply_restriction(group_id, &self.identity, &MemberPermissions::muted())
                    .await
            }
            PropagationMode::Remove => {
                self.platform
                    .apply_removal(group_id, &self.identity, &RemovalOptions::default())
                    .await
            }
        }
    }

    /// A muted identity is still present, so only removals are pruned.
    async fn prune(&self, settled: &[String]) -> Result<usize> {
        if self.mode != PropagationMode::Remove {
            return Ok(0);
        }
        let identity = [self.identity.clone()];
        let mut removed = 0;
        for group_id in settled {
            removed += self.presence.prune_targets(group_id, &identity).await?;
        }
        Ok(removed)
    }
}
