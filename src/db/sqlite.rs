// SqliteStore — rusqlite backend implementing the SnapshotStore trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// Holding the lock for the whole of `append` means each append (insert,
// eviction, summary and index updates) is applied as one unit.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::models::{ExportDocument, LastObservation, Snapshot, TrackedIdentity, MAX_SNAPSHOTS};
use super::traits::SnapshotStore;

pub struct SqliteStore {
    conn: Mutex<Connection>,
    retention: usize,
}

impl SqliteStore {
    /// Wrap an already-opened rusqlite Connection with the default retention.
    pub fn new(conn: Connection) -> Self {
        Self::with_retention(conn, MAX_SNAPSHOTS)
    }

    /// Wrap a Connection, keeping at most `retention` snapshots per identity.
    pub fn with_retention(conn: Connection, retention: usize) -> Self {
        Self {
            conn: Mutex::new(conn),
            retention: retention.max(1),
        }
    }

    pub fn retention(&self) -> usize {
        self.retention
    }
}

#[async_trait]
impl SnapshotStore for SqliteStore {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn append(&self, snapshot: &Snapshot) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::append_snapshot(&conn, snapshot, self.retention)?;
        debug!(
            identity = %snapshot.identity,
            followers = snapshot.follower_count,
            following = snapshot.following_count,
            "Snapshot appended"
        );
        Ok(())
    }

    async fn history(&self, identity: &str) -> Result<Vec<Snapshot>> {
        let conn = self.conn.lock().await;
        super::queries::get_history(&conn, identity)
    }

    async fn latest(&self, identity: &str) -> Result<Option<Snapshot>> {
        let conn = self.conn.lock().await;
        super::queries::get_latest(&conn, identity)
    }

    async fn last_observation(&self, identity: &str) -> Result<Option<LastObservation>> {
        let conn = self.conn.lock().await;
        super::queries::get_last_observation(&conn, identity)
    }

    async fn delete_identity(&self, identity: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        let removed = super::queries::delete_identity(&conn, identity)?;
        info!(identity, removed, "Deleted identity history");
        Ok(())
    }

    async fn tracked_identities(&self) -> Result<Vec<TrackedIdentity>> {
        let conn = self.conn.lock().await;
        super::queries::get_tracked_identities(&conn)
    }

    async fn export_all(&self) -> Result<ExportDocument> {
        let conn = self.conn.lock().await;
        super::queries::export_all(&conn)
    }
}
