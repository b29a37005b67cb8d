// Snapshot diffing — who was gained and lost between two observations.
//
// Pure and total: no storage, no clock. Membership is compared on a single
// key field (handle by default), exactly and case-sensitively. A member
// whose key is unchanged counts as unchanged even if other fields moved.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{Member, Snapshot};

/// Which member field decides whether two entries are the same account.
///
/// `Handle` matches the historical behavior: a renamed account shows up as
/// one loss plus one gain. `Id` uses the stable remote id instead, which
/// only works when every payload carries ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareKey {
    #[default]
    Handle,
    Id,
}

impl CompareKey {
    pub fn key_of<'a>(&self, member: &'a Member) -> &'a str {
        match self {
            CompareKey::Handle => &member.handle,
            CompareKey::Id => &member.id,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompareKey::Handle => "handle",
            CompareKey::Id => "id",
        }
    }
}

impl fmt::Display for CompareKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompareKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "handle" => Ok(CompareKey::Handle),
            "id" => Ok(CompareKey::Id),
            other => anyhow::bail!("Unknown compare key '{other}' (expected 'handle' or 'id')"),
        }
    }
}

/// Membership changes between an older and a newer snapshot of one identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    /// The newer snapshot's `taken_at`.
    pub observed_at: DateTime<Utc>,
    pub new_followers: Vec<Member>,
    pub lost_followers: Vec<Member>,
    pub new_following: Vec<Member>,
    pub lost_following: Vec<Member>,
    /// Difference of the stored counts, independent of the lists above.
    pub follower_delta: i64,
    pub following_delta: i64,
}

impl Diff {
    /// True when no member was gained or lost on either list.
    /// Count deltas are deliberately ignored.
    pub fn is_empty(&self) -> bool {
        self.new_followers.is_empty()
            && self.lost_followers.is_empty()
            && self.new_following.is_empty()
            && self.lost_following.is_empty()
    }
}

/// Diff two snapshots of the same identity, comparing by handle.
pub fn diff(older: &Snapshot, newer: &Snapshot) -> Diff {
    diff_by(older, newer, CompareKey::Handle)
}

/// Diff two snapshots of the same identity with an explicit comparison key.
///
/// The caller guarantees both snapshots belong to one identity; it is not
/// checked here.
pub fn diff_by(older: &Snapshot, newer: &Snapshot, key: CompareKey) -> Diff {
    let (new_followers, lost_followers) = gained_and_lost(&older.followers, &newer.followers, key);
    let (new_following, lost_following) = gained_and_lost(&older.following, &newer.following, key);

    Diff {
        observed_at: newer.taken_at,
        new_followers,
        lost_followers,
        new_following,
        lost_following,
        follower_delta: newer.follower_count as i64 - older.follower_count as i64,
        following_delta: newer.following_count as i64 - older.following_count as i64,
    }
}

/// Members of `newer` missing from `older` (in `newer` order), and members of
/// `older` missing from `newer` (in `older` order).
fn gained_and_lost(
    older: &[Member],
    newer: &[Member],
    key: CompareKey,
) -> (Vec<Member>, Vec<Member>) {
    let old_keys: HashSet<&str> = older.iter().map(|m| key.key_of(m)).collect();
    let new_keys: HashSet<&str> = newer.iter().map(|m| key.key_of(m)).collect();

    let gained = newer
        .iter()
        .filter(|m| !old_keys.contains(key.key_of(m)))
        .cloned()
        .collect();
    let lost = older
        .iter()
        .filter(|m| !new_keys.contains(key.key_of(m)))
        .cloned()
        .collect();

    (gained, lost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn member(id: &str, handle: &str) -> Member {
        Member {
            id: id.to_string(),
            handle: handle.to_string(),
            display_name: String::new(),
            avatar_url: String::new(),
        }
    }

    fn snap(minute: u32, followers: Vec<Member>, following: Vec<Member>) -> Snapshot {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 9, minute, 0).unwrap();
        Snapshot::new("alice", ts, followers, following)
    }

    #[test]
    fn test_compare_key_parses_case_insensitively() {
        assert_eq!("HANDLE".parse::<CompareKey>().unwrap(), CompareKey::Handle);
        assert_eq!(" id ".parse::<CompareKey>().unwrap(), CompareKey::Id);
        assert!("username".parse::<CompareKey>().is_err());
    }

    #[test]
    fn test_rename_is_loss_plus_gain_by_handle() {
        let older = snap(0, vec![member("42", "old_name")], vec![]);
        let newer = snap(1, vec![member("42", "new_name")], vec![]);

        let d = diff(&older, &newer);
        assert_eq!(d.new_followers[0].handle, "new_name");
        assert_eq!(d.lost_followers[0].handle, "old_name");
        assert_eq!(d.follower_delta, 0);
    }

    #[test]
    fn test_rename_is_unchanged_by_id() {
        let older = snap(0, vec![member("42", "old_name")], vec![]);
        let newer = snap(1, vec![member("42", "new_name")], vec![]);

        let d = diff_by(&older, &newer, CompareKey::Id);
        assert!(d.is_empty());
    }

    #[test]
    fn test_handle_comparison_is_case_sensitive() {
        let older = snap(0, vec![member("", "Bob")], vec![]);
        let newer = snap(1, vec![member("", "bob")], vec![]);

        let d = diff(&older, &newer);
        assert_eq!(d.new_followers.len(), 1);
        assert_eq!(d.lost_followers.len(), 1);
    }

    #[test]
    fn test_profile_field_changes_are_ignored() {
        let mut renamed = member("1", "carol");
        renamed.display_name = "Carol C.".to_string();
        renamed.avatar_url = "https://cdn.example/new.jpg".to_string();

        let older = snap(0, vec![member("1", "carol")], vec![]);
        let newer = snap(1, vec![renamed], vec![]);
        assert!(diff(&older, &newer).is_empty());
    }

    #[test]
    fn test_empty_diff_ignores_count_delta() {
        let older = snap(0, vec![member("", "a")], vec![]);
        let mut newer = snap(1, vec![member("", "a")], vec![]);
        newer.follower_count = 3;

        let d = diff(&older, &newer);
        assert_eq!(d.follower_delta, 2);
        assert!(d.is_empty());
    }
}
