// Tracker — the entry point that ties storage, diffing and history together.
//
// Recording is serialized per identity: each append runs while holding that
// identity's async lock, and the guard is dropped on every exit path. Reads
// go straight to the store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::{Context, Result};
use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use crate::db::models::{LastObservation, Snapshot, TrackedIdentity};
use crate::db::SnapshotStore;
use crate::diff::{CompareKey, Diff};
use crate::fetch::FetchResult;
use crate::history;
use crate::identity;
use crate::insights::{self, Insights};

/// Current totals plus the change since the previous observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub identity: String,
    pub taken_at: DateTime<Utc>,
    pub follower_count: usize,
    pub following_count: usize,
    /// Followers per following account; None when following nobody.
    pub ratio: Option<f64>,
    /// Unfiltered count deltas from the previous snapshot, if any.
    pub follower_delta: Option<i64>,
    pub following_delta: Option<i64>,
    pub snapshot_count: usize,
}

pub struct Tracker {
    store: Arc<dyn SnapshotStore>,
    key: CompareKey,
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Tracker {
    pub fn new(store: Arc<dyn SnapshotStore>, key: CompareKey) -> Self {
        Self {
            store,
            key,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn compare_key(&self) -> CompareKey {
        self.key
    }

    /// The lock that serializes appends for one identity.
    fn lock_for(&self, identity: &str) -> Arc<Mutex<()>> {
        // A poisoned map only means another thread panicked mid-insert;
        // the map itself is still usable.
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Record a completed fetch as a new snapshot taken now.
    ///
    /// The time is read once this identity's lock is held, so concurrent
    /// records land in history in `taken_at` order.
    pub async fn record(&self, result: FetchResult) -> Result<Snapshot> {
        self.append(result, None).await
    }

    /// Record a completed fetch as a snapshot taken at `taken_at`.
    pub async fn record_at(
        &self,
        result: FetchResult,
        taken_at: DateTime<Utc>,
    ) -> Result<Snapshot> {
        self.append(result, Some(taken_at)).await
    }

    async fn append(
        &self,
        result: FetchResult,
        taken_at: Option<DateTime<Utc>>,
    ) -> Result<Snapshot> {
        let identity = identity::normalize(&result.identity)?;

        let lock = self.lock_for(&identity);
        let _guard = lock.lock().await;

        // Stored timestamps keep millisecond precision; match it so the
        // returned snapshot equals what a later read gives back.
        let taken_at = taken_at.unwrap_or_else(Utc::now).trunc_subsecs(3);
        let snapshot = Snapshot::new(
            identity.clone(),
            taken_at,
            result.followers,
            result.following,
        );

        self.store
            .append(&snapshot)
            .await
            .with_context(|| format!("Failed to save snapshot for {identity}"))?;

        info!(
            identity = %identity,
            followers = snapshot.follower_count,
            following = snapshot.following_count,
            "Recorded snapshot"
        );

        Ok(snapshot)
    }

    pub async fn history(&self, identity: &str) -> Result<Vec<Snapshot>> {
        let identity = identity::normalize(identity)?;
        self.store.history(&identity).await
    }

    pub async fn latest(&self, identity: &str) -> Result<Option<Snapshot>> {
        let identity = identity::normalize(identity)?;
        self.store.latest(&identity).await
    }

    pub async fn last_observation(&self, identity: &str) -> Result<Option<LastObservation>> {
        let identity = identity::normalize(identity)?;
        self.store.last_observation(&identity).await
    }

    /// Remove everything stored for an identity. Unknown identities are a no-op.
    pub async fn delete(&self, identity: &str) -> Result<()> {
        let identity = identity::normalize(identity)?;
        let lock = self.lock_for(&identity);
        let _guard = lock.lock().await;
        self.store.delete_identity(&identity).await
    }

    /// Identities with at least one retained snapshot.
    pub async fn tracked(&self) -> Result<Vec<TrackedIdentity>> {
        self.store.tracked_identities().await
    }

    /// Newest-first diffs with at least one membership change.
    pub async fn change_feed(&self, identity: &str) -> Result<Vec<Diff>> {
        let history = self.history(identity).await?;
        Ok(history::change_feed(&history, self.key))
    }

    /// Totals from the latest snapshot plus deltas from the one before it.
    pub async fn overview(&self, identity: &str) -> Result<Option<Overview>> {
        let history = self.history(identity).await?;
        let Some(latest) = history.last() else {
            return Ok(None);
        };
        let change = history::latest_change(&history, self.key);

        Ok(Some(Overview {
            identity: latest.identity.clone(),
            taken_at: latest.taken_at,
            follower_count: latest.follower_count,
            following_count: latest.following_count,
            ratio: insights::follow_ratio(latest.follower_count, latest.following_count),
            follower_delta: change.as_ref().map(|d| d.follower_delta),
            following_delta: change.as_ref().map(|d| d.following_delta),
            snapshot_count: history.len(),
        }))
    }

    /// Follow-back insights from the latest snapshot.
    pub async fn insights(&self, identity: &str) -> Result<Option<Insights>> {
        Ok(self
            .latest(identity)
            .await?
            .map(|snapshot| insights::compute(&snapshot, self.key)))
    }

    /// Pretty-printed JSON of everything in the store.
    pub async fn export_json(&self) -> Result<String> {
        let document = self.store.export_all().await?;
        serde_json::to_string_pretty(&document).context("Failed to serialize export")
    }
}
