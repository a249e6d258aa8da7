//! AuthorizationService trait.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::Result;

#[async_trait]
pub trait AuthorizationService: Send + Sync {
    /// Whether `actor_id` may submit bulk jobs.
    async fn is_authorized_operator(&self, actor_id: &str) -> bool;

    /// Current elevated-privilege holders of a group.
    async fn list_elevated_members(&self, group_id: &str) -> Result<HashSet<String>>;
}
