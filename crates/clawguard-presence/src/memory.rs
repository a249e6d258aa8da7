//! In-memory presence store, for tests and throwaway runs.

use async_trait::async_trait;
use clawguard_core::error::Result;
use clawguard_core::traits::PresenceStore;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

/// group id → identities seen there. Ordered so listings are stable.
#[derive(Debug, Default)]
pub struct MemoryPresenceStore {
    groups: Mutex<BTreeMap<String, BTreeSet<String>>>,
}

impl MemoryPresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a group with identities in one go.
    pub fn with_group<I, S>(self, group_id: &str, identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock()
            .entry(group_id.to_string())
            .or_default()
            .extend(identities.into_iter().map(Into::into));
        self
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, BTreeSet<String>>> {
        self.groups.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl PresenceStore for MemoryPresenceStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn record_seen(&self, group_id: &str, identity: &str) -> Result<()> {
        self.lock().entry(group_id.to_string()).or_default().insert(identity.to_string());
        Ok(())
    }

    async fn get_known_targets(&self, group_id: &str) -> Result<Vec<String>> {
        Ok(self.lock().get(group_id).map(|s| s.iter().cloned().collect()).unwrap_or_default())
    }

    async fn get_groups_for_identity(&self, identity: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()
            .iter()
            .filter(|(_, members)| members.contains(identity))
            .map(|(group, _)| group.clone())
            .collect())
    }

    async fn prune_targets(&self, group_id: &str, targets: &[String]) -> Result<usize> {
        let mut groups = self.lock();
        let Some(members) = groups.get_mut(group_id) else {
            return Ok(0);
        };
        let removed = targets.iter().filter(|t| members.remove(t.as_str())).count();
        if members.is_empty() {
            groups.remove(group_id);
        }
        Ok(removed)
    }
}
