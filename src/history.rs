// Change feed assembly — turns a retained history into newest-first diffs.
//
// Pure functions over already-loaded snapshots; the Tracker loads history
// from the store and calls into here.

use tracing::debug;

use crate::db::models::Snapshot;
use crate::diff::{diff_by, CompareKey, Diff};

/// Diff every adjacent pair of an oldest-first history, drop pairs with no
/// membership change, and return the rest newest first.
///
/// Histories with fewer than two snapshots produce an empty feed.
pub fn change_feed(history: &[Snapshot], key: CompareKey) -> Vec<Diff> {
    if history.len() < 2 {
        return Vec::new();
    }

    let mut feed: Vec<Diff> = history
        .windows(2)
        .map(|pair| diff_by(&pair[0], &pair[1], key))
        .filter(|d| !d.is_empty())
        .collect();

    debug!(
        snapshots = history.len(),
        changes = feed.len(),
        "Assembled change feed"
    );

    feed.reverse();
    feed
}

/// The unfiltered diff between the two most recent snapshots, if there are
/// at least two. Used for the count deltas shown next to current totals.
pub fn latest_change(history: &[Snapshot], key: CompareKey) -> Option<Diff> {
    match history {
        [.., older, newer] => Some(diff_by(older, newer, key)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Member;
    use chrono::{TimeZone, Utc};

    fn snap(minute: u32, followers: &[&str]) -> Snapshot {
        let ts = Utc.with_ymd_and_hms(2024, 2, 1, 8, minute, 0).unwrap();
        Snapshot::new(
            "alice",
            ts,
            followers.iter().map(|h| Member::with_handle(*h)).collect(),
            vec![],
        )
    }

    #[test]
    fn test_feed_floor() {
        assert!(change_feed(&[], CompareKey::Handle).is_empty());
        assert!(change_feed(&[snap(0, &["a"])], CompareKey::Handle).is_empty());
    }

    #[test]
    fn test_feed_skips_refetch_without_changes() {
        let history = vec![snap(0, &["a"]), snap(1, &["a"]), snap(2, &["a", "b"])];
        let feed = change_feed(&history, CompareKey::Handle);
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].observed_at, history[2].taken_at);
    }

    #[test]
    fn test_latest_change_is_unfiltered() {
        let history = vec![snap(0, &["a"]), snap(1, &["a"])];
        let change = latest_change(&history, CompareKey::Handle).unwrap();
        assert!(change.is_empty());
        assert_eq!(change.follower_delta, 0);

        assert!(latest_change(&history[..1], CompareKey::Handle).is_none());
    }
}
