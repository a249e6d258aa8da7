//! PresenceStore trait — who has been seen in which group.

use async_trait::async_trait;
use crate::error::Result;

#[async_trait]
pub trait PresenceStore: Send + Sync {
    fn name(&self) -> &str;

    /// Record that `identity` was observed in `group_id`.
    async fn record_seen(&self, group_id: &str, identity: &str) -> Result<()>;

    /// Identities tracked in a group.
    async fn get_known_targets(&self, group_id: &str) -> Result<Vec<String>>;

    /// Groups an identity has been seen in.
    async fn get_groups_for_identity(&self, identity: &str) -> Result<Vec<String>>;

    /// Forget the given identities for a group. Returns how many were removed.
    async fn prune_targets(&self, group_id: &str, targets: &[String]) -> Result<usize>;
}
