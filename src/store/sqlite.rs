//! SQLite target store

use super::{StoreError, TargetStore};
use crate::target::{CommunityId, DestinationId, MessageId, SyncTarget};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to SQLite database file
    pub path: PathBuf,

    /// Enable WAL mode for better concurrency
    pub wal_mode: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("rosterwatch");
        path.push("rosterwatch.db");

        Self {
            path,
            wal_mode: true,
        }
    }
}

/// Targets stored in a single SQLite connection
///
/// The connection sits behind a mutex, which serializes writers for the same
/// community key.
pub struct SqliteTargetStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteTargetStore {
    /// Open or create the store database
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::info!(path = %config.path.display(), "Opening target store");

        let conn = Connection::open(&config.path)?;
        if config.wal_mode {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        }

        let store = Self {
            conn: Mutex::new(conn),
            path: Some(config.path.clone()),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open a private in-memory store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Database path, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS communities (
                community_id INTEGER PRIMARY KEY,
                joined_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS server_list (
                community_id INTEGER PRIMARY KEY
                    REFERENCES communities(community_id) ON DELETE CASCADE,
                channel_id INTEGER NOT NULL,
                message_id INTEGER,
                title TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Number of stored targets
    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM server_list", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Whether the community has a membership row
    pub fn has_community(&self, community: CommunityId) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM communities WHERE community_id = ?1",
                [community.as_i64()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

fn row_to_target(row: &Row<'_>) -> rusqlite::Result<SyncTarget> {
    let message: Option<i64> = row.get(2)?;
    Ok(SyncTarget {
        community: CommunityId::from_i64(row.get(0)?),
        destination: DestinationId::from_i64(row.get(1)?),
        message: message.map(MessageId::from_i64),
        title: row.get(3)?,
    })
}

impl TargetStore for SqliteTargetStore {
    fn get(&self, community: CommunityId) -> Result<Option<SyncTarget>, StoreError> {
        let conn = self.lock()?;
        let target = conn
            .query_row(
                "SELECT community_id, channel_id, message_id, title
                 FROM server_list WHERE community_id = ?1",
                [community.as_i64()],
                row_to_target,
            )
            .optional()?;
        Ok(target)
    }

    fn list(&self) -> Result<Vec<SyncTarget>, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT community_id, channel_id, message_id, title FROM server_list")?;
        let targets = stmt
            .query_map([], row_to_target)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(targets)
    }

    fn upsert(
        &self,
        community: CommunityId,
        destination: DestinationId,
        message: Option<MessageId>,
        title: &str,
    ) -> Result<(), StoreError> {
        let now = Utc::now().timestamp_millis();
        let mut conn = self.lock()?;
        // Dropping an uncommitted transaction rolls it back
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO communities (community_id, joined_at) VALUES (?1, ?2)
             ON CONFLICT(community_id) DO NOTHING",
            params![community.as_i64(), now],
        )?;
        tx.execute(
            "INSERT INTO server_list (community_id, channel_id, message_id, title, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(community_id) DO UPDATE SET
                channel_id = excluded.channel_id,
                message_id = excluded.message_id,
                title = excluded.title,
                updated_at = excluded.updated_at",
            params![
                community.as_i64(),
                destination.as_i64(),
                message.map(MessageId::as_i64),
                title,
                now,
            ],
        )?;

        tx.commit()?;

        tracing::debug!(
            community = %community,
            destination = %destination,
            message = ?message.map(MessageId::get),
            "Target upserted"
        );
        Ok(())
    }

    fn set_message(
        &self,
        community: CommunityId,
        destination: DestinationId,
        expected: Option<MessageId>,
        message: MessageId,
    ) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE server_list SET message_id = ?1, updated_at = ?2
             WHERE community_id = ?3 AND channel_id = ?4 AND message_id IS ?5",
            params![
                message.as_i64(),
                Utc::now().timestamp_millis(),
                community.as_i64(),
                destination.as_i64(),
                expected.map(MessageId::as_i64),
            ],
        )?;

        tracing::debug!(
            community = %community,
            destination = %destination,
            message = %message,
            updated = updated > 0,
            "Target message set"
        );
        Ok(updated > 0)
    }

    fn delete(&self, community: CommunityId) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM server_list WHERE community_id = ?1",
            [community.as_i64()],
        )?;
        Ok(removed > 0)
    }

    fn on_membership_gained(&self, community: CommunityId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO communities (community_id, joined_at) VALUES (?1, ?2)
             ON CONFLICT(community_id) DO NOTHING",
            params![community.as_i64(), Utc::now().timestamp_millis()],
        )?;
        tracing::info!(community = %community, "Community joined");
        Ok(())
    }

    fn on_membership_lost(&self, community: CommunityId) -> Result<Vec<SyncTarget>, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let removed = {
            let mut stmt = tx.prepare(
                "SELECT community_id, channel_id, message_id, title
                 FROM server_list WHERE community_id = ?1",
            )?;
            let rows = stmt.query_map([community.as_i64()], row_to_target)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        tx.execute(
            "DELETE FROM server_list WHERE community_id = ?1",
            [community.as_i64()],
        )?;
        tx.execute(
            "DELETE FROM communities WHERE community_id = ?1",
            [community.as_i64()],
        )?;
        tx.commit()?;

        tracing::info!(
            community = %community,
            targets = removed.len(),
            "Community left, targets removed"
        );
        Ok(removed)
    }
}
