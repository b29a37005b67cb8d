// Composition tests — the tracker driving a real SQLite store.
//
// These exercise the full record → store → history → diff → feed chain
// against an on-disk database in a temp directory, without network access.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use followtrail::db::models::{ExportDocument, Member, MAX_SNAPSHOTS};
use followtrail::db::{self, SnapshotStore};
use followtrail::diff::CompareKey;
use followtrail::fetch::FetchResult;
use followtrail::tracker::Tracker;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn result(identity: &str, followers: &[&str], following: &[&str]) -> FetchResult {
    FetchResult {
        identity: identity.to_string(),
        followers: followers.iter().map(|h| Member::with_handle(*h)).collect(),
        following: following.iter().map(|h| Member::with_handle(*h)).collect(),
    }
}

fn tracker_in(dir: &tempfile::TempDir, key: CompareKey) -> Tracker {
    let path = dir.path().join("followtrail.db");
    let store = db::initialize_sqlite(path.to_str().unwrap(), MAX_SNAPSHOTS).unwrap();
    Tracker::new(store, key)
}

// ============================================================
// Record -> Feed
// ============================================================

#[tokio::test]
async fn recorded_fetches_produce_newest_first_feed() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = tracker_in(&dir, CompareKey::Handle);

    let t1 = base();
    let t2 = base() + Duration::hours(1);
    let t3 = base() + Duration::hours(2);
    tracker.record_at(result("alice", &["A", "B"], &["C"]), t1).await.unwrap();
    tracker.record_at(result("alice", &["A", "B", "D"], &["C"]), t2).await.unwrap();
    tracker.record_at(result("alice", &["B", "D"], &[]), t3).await.unwrap();

    let feed = tracker.change_feed("alice").await.unwrap();
    assert_eq!(feed.len(), 2);
    assert_eq!(feed[0].observed_at, t3);
    assert_eq!(feed[0].lost_followers, vec![Member::with_handle("A")]);
    assert_eq!(feed[0].lost_following, vec![Member::with_handle("C")]);
    assert_eq!(feed[1].observed_at, t2);
    assert_eq!(feed[1].new_followers, vec![Member::with_handle("D")]);

    let overview = tracker.overview("alice").await.unwrap().unwrap();
    assert_eq!(overview.follower_count, 2);
    assert_eq!(overview.following_count, 0);
    assert_eq!(overview.ratio, None);
    assert_eq!(overview.follower_delta, Some(-1));
    assert_eq!(overview.following_delta, Some(-1));
    assert_eq!(overview.snapshot_count, 3);
}

#[tokio::test]
async fn refetch_without_changes_is_not_in_feed() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = tracker_in(&dir, CompareKey::Handle);

    tracker.record_at(result("alice", &["A"], &[]), base()).await.unwrap();
    tracker
        .record_at(result("alice", &["A"], &[]), base() + Duration::hours(1))
        .await
        .unwrap();

    assert_eq!(tracker.history("alice").await.unwrap().len(), 2);
    assert!(tracker.change_feed("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn identity_spellings_share_one_history() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = tracker_in(&dir, CompareKey::Handle);

    tracker.record_at(result("Alice", &["A"], &[]), base()).await.unwrap();
    tracker
        .record_at(result("@alice", &["A", "B"], &[]), base() + Duration::hours(1))
        .await
        .unwrap();

    assert_eq!(tracker.history(" ALICE ").await.unwrap().len(), 2);
    assert_eq!(tracker.change_feed("alice").await.unwrap().len(), 1);
}

// ============================================================
// Retention, registry, delete
// ============================================================

#[tokio::test]
async fn retention_keeps_the_fifty_most_recent() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = tracker_in(&dir, CompareKey::Handle);

    for n in 0..60 {
        let handle = format!("follower{n}");
        tracker
            .record_at(
                result("alice", &[handle.as_str()], &[]),
                base() + Duration::minutes(n),
            )
            .await
            .unwrap();
    }

    let history = tracker.history("alice").await.unwrap();
    assert_eq!(history.len(), 50);
    assert_eq!(history[0].taken_at, base() + Duration::minutes(10));
    assert_eq!(history[49].taken_at, base() + Duration::minutes(59));
    assert_eq!(history[49].followers[0].handle, "follower59");

    let tracked = tracker.tracked().await.unwrap();
    assert_eq!(tracked.len(), 1);
    assert_eq!(tracked[0].snapshot_count, 50);
}

#[tokio::test]
async fn tracked_set_follows_history() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = tracker_in(&dir, CompareKey::Handle);
    assert!(tracker.tracked().await.unwrap().is_empty());

    tracker.record_at(result("bob", &[], &[]), base()).await.unwrap();
    tracker.record_at(result("alice", &[], &[]), base()).await.unwrap();

    let names: Vec<String> = tracker
        .tracked()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.identity)
        .collect();
    assert_eq!(names, vec!["alice".to_string(), "bob".to_string()]);
}

#[tokio::test]
async fn delete_removes_history_and_registry_entry() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = tracker_in(&dir, CompareKey::Handle);

    tracker.record_at(result("alice", &["A"], &[]), base()).await.unwrap();
    tracker.record_at(result("bob", &["B"], &[]), base()).await.unwrap();

    tracker.delete("@Alice").await.unwrap();
    // Deleting again, or deleting a stranger, is not an error.
    tracker.delete("alice").await.unwrap();
    tracker.delete("nobody").await.unwrap();

    assert!(tracker.history("alice").await.unwrap().is_empty());
    assert!(tracker.latest("alice").await.unwrap().is_none());
    assert!(tracker.last_observation("alice").await.unwrap().is_none());
    let names: Vec<String> = tracker
        .tracked()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.identity)
        .collect();
    assert_eq!(names, vec!["bob".to_string()]);
}

#[tokio::test]
async fn last_observation_matches_latest_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = tracker_in(&dir, CompareKey::Handle);

    tracker.record_at(result("alice", &["A"], &["X"]), base()).await.unwrap();
    let t2 = base() + Duration::days(1);
    tracker
        .record_at(result("alice", &["A", "B", "C"], &["X"]), t2)
        .await
        .unwrap();

    let obs = tracker.last_observation("alice").await.unwrap().unwrap();
    let latest = tracker.latest("alice").await.unwrap().unwrap();
    assert_eq!(obs.taken_at, t2);
    assert_eq!(obs, latest.observation());
    assert_eq!(obs.follower_count, 3);
}

// ============================================================
// Persistence and export
// ============================================================

#[tokio::test]
async fn history_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("followtrail.db");
    let path = path.to_str().unwrap();

    {
        let store = db::initialize_sqlite(path, MAX_SNAPSHOTS).unwrap();
        let tracker = Tracker::new(store, CompareKey::Handle);
        tracker.record_at(result("alice", &["A"], &[]), base()).await.unwrap();
    }

    let store: Arc<dyn SnapshotStore> = db::open_sqlite(path, MAX_SNAPSHOTS).unwrap();
    let history = store.history("alice").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].taken_at, base());
}

#[tokio::test]
async fn open_missing_database_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.db");
    assert!(db::open_sqlite(path.to_str().unwrap(), MAX_SNAPSHOTS).is_err());
}

#[tokio::test]
async fn export_dumps_every_identity() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = tracker_in(&dir, CompareKey::Handle);

    tracker.record_at(result("alice", &["A"], &["B"]), base()).await.unwrap();
    tracker
        .record_at(result("alice", &["A", "C"], &["B"]), base() + Duration::hours(1))
        .await
        .unwrap();
    tracker.record_at(result("bob", &[], &["A"]), base()).await.unwrap();

    let json = tracker.export_json().await.unwrap();
    let doc: ExportDocument = serde_json::from_str(&json).unwrap();

    assert_eq!(doc.identities.len(), 2);
    let alice = &doc.identities[0];
    assert_eq!(alice.identity, "alice");
    assert_eq!(alice.snapshots.len(), 2);
    assert_eq!(alice.last_observation.unwrap().follower_count, 2);
    assert_eq!(doc.identities[1].snapshots[0].following[0].handle, "A");
}

// ============================================================
// Comparison key and insights
// ============================================================

#[tokio::test]
async fn id_key_ignores_handle_changes() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = tracker_in(&dir, CompareKey::Id);

    let renamed = |handle: &str| Member {
        id: "did:plc:stable".to_string(),
        ..Member::with_handle(handle)
    };
    let first = FetchResult {
        identity: "alice".to_string(),
        followers: vec![renamed("old.bsky.social")],
        following: vec![],
    };
    let second = FetchResult {
        identity: "alice".to_string(),
        followers: vec![renamed("new.bsky.social")],
        following: vec![],
    };
    tracker.record_at(first, base()).await.unwrap();
    tracker.record_at(second, base() + Duration::hours(1)).await.unwrap();

    assert!(tracker.change_feed("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn insights_use_latest_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = tracker_in(&dir, CompareKey::Handle);
    assert!(tracker.insights("alice").await.unwrap().is_none());

    tracker
        .record_at(result("alice", &["A", "B"], &["B", "C", "D"]), base())
        .await
        .unwrap();

    let insights = tracker.insights("alice").await.unwrap().unwrap();
    let not_following_back: Vec<&str> = insights
        .not_following_back
        .iter()
        .map(|m| m.handle.as_str())
        .collect();
    assert_eq!(not_following_back, vec!["C", "D"]);
    assert_eq!(insights.not_followed_back, vec![Member::with_handle("A")]);
    assert_eq!(insights.mutuals, vec![Member::with_handle("B")]);
}
