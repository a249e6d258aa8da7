//! # ClawGuard Presence
//! Who has been seen in which group: the target source for purges and
//! propagation.

pub mod memory;
pub mod sqlite;

use clawguard_core::config::GuardConfig;
use clawguard_core::error::{GuardError, Result};
use clawguard_core::traits::PresenceStore;
use std::sync::Arc;

pub use memory::MemoryPresenceStore;
pub use sqlite::SqlitePresenceStore;

/// Create a presence store from configuration.
pub fn create_presence(config: &GuardConfig) -> Result<Arc<dyn PresenceStore>> {
    match config.presence.backend.as_str() {
        "sqlite" => Ok(Arc::new(SqlitePresenceStore::open(&config.presence_path())?)),
        "memory" => Ok(Arc::new(MemoryPresenceStore::new())),
        other => Err(GuardError::presence(format!("Unknown presence backend: {other}"))),
    }
}
