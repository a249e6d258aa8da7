//! SQLite presence backend.

use async_trait::async_trait;
use chrono::Utc;
use clawguard_core::error::{GuardError, Result};
use clawguard_core::traits::PresenceStore;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

fn db_err(e: rusqlite::Error) -> GuardError {
    GuardError::Presence(e.to_string())
}

pub struct SqlitePresenceStore {
    conn: Mutex<Connection>,
}

impl SqlitePresenceStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().map_err(db_err)?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS presence (
                group_id TEXT NOT NULL,
                identity TEXT NOT NULL,
                first_seen TEXT NOT NULL,
                last_seen TEXT NOT NULL,
                PRIMARY KEY (group_id, identity)
            );
            CREATE INDEX IF NOT EXISTS idx_presence_identity ON presence(identity);",
        )
        .map_err(db_err)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| GuardError::Presence(e.to_string()))
    }

    fn column(&self, sql: &str, param: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(db_err)?;
        let rows = stmt
            .query_map(rusqlite::params![param], |row| row.get::<_, String>(0))
            .map_err(db_err)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(db_err)
    }
}

#[async_trait]
impl PresenceStore for SqlitePresenceStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn record_seen(&self, group_id: &str, identity: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn()?
            .execute(
                "INSERT INTO presence (group_id, identity, first_seen, last_seen) VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(group_id, identity) DO UPDATE SET last_seen = excluded.last_seen",
                rusqlite::params![group_id, identity, now],
            )
            .map_err(db_err)?;
        Ok(())
    }

    async fn get_known_targets(&self, group_id: &str) -> Result<Vec<String>> {
        self.column("SELECT identity FROM presence WHERE group_id = ?1 ORDER BY first_seen, identity", group_id)
    }

    async fn get_groups_for_identity(&self, identity: &str) -> Result<Vec<String>> {
        self.column("SELECT group_id FROM presence WHERE identity = ?1 ORDER BY group_id", identity)
    }

    async fn prune_targets(&self, group_id: &str, targets: &[String]) -> Result<usize> {
        if targets.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        let mut removed = 0;
        {
            let mut stmt = tx
                .prepare("DELETE FROM presence WHERE group_id = ?1 AND identity = ?2")
                .map_err(db_err)?;
            for target in targets {
                removed += stmt.execute(rusqlite::params![group_id, target]).map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)?;
        tracing::debug!("Pruned {removed} presence row(s) in {group_id}");
        Ok(removed)
    }
}
