// Snapshot store trait — async interface over durable snapshot history.
//
// Implementor: SqliteStore (wraps rusqlite). Methods are async so callers
// await storage the same way regardless of backend. Reads never mutate;
// `append` and `delete_identity` are the only writes.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{ExportDocument, LastObservation, Snapshot, TrackedIdentity};

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- History ---

    /// Append a snapshot to its identity's history, evicting the oldest
    /// entries beyond the retention bound, and refresh the last-observation
    /// and tracked-identity records.
    async fn append(&self, snapshot: &Snapshot) -> Result<()>;

    /// Retained history for an identity, oldest first. Empty if unknown.
    async fn history(&self, identity: &str) -> Result<Vec<Snapshot>>;

    /// Most recent snapshot, if any.
    async fn latest(&self, identity: &str) -> Result<Option<Snapshot>>;

    /// Summary of the most recent observation without loading member lists.
    async fn last_observation(&self, identity: &str) -> Result<Option<LastObservation>>;

    // --- Identities ---

    /// Remove all stored data for an identity. Unknown identities are a no-op.
    async fn delete_identity(&self, identity: &str) -> Result<()>;

    /// Every identity with a non-empty history.
    async fn tracked_identities(&self) -> Result<Vec<TrackedIdentity>>;

    // --- Export ---

    /// Unfiltered dump of all stored histories and last observations.
    async fn export_all(&self) -> Result<ExportDocument>;
}
