// Relationship insights derived from a single snapshot.
//
// These read one snapshot at a time and never touch history: who you follow
// that doesn't follow back, who follows you that you don't follow back.

use std::collections::HashSet;

use serde::Serialize;

use crate::db::models::{Member, Snapshot};
use crate::diff::CompareKey;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    /// Accounts in `following` missing from `followers`, in following order.
    pub not_following_back: Vec<Member>,
    /// Accounts in `followers` missing from `following`, in follower order.
    pub not_followed_back: Vec<Member>,
    /// Accounts present in both lists, in follower order.
    pub mutuals: Vec<Member>,
}

pub fn compute(snapshot: &Snapshot, key: CompareKey) -> Insights {
    let follower_keys: HashSet<&str> = snapshot.followers.iter().map(|m| key.key_of(m)).collect();
    let following_keys: HashSet<&str> = snapshot.following.iter().map(|m| key.key_of(m)).collect();

    Insights {
        not_following_back: snapshot
            .following
            .iter()
            .filter(|m| !follower_keys.contains(key.key_of(m)))
            .cloned()
            .collect(),
        not_followed_back: snapshot
            .followers
            .iter()
            .filter(|m| !following_keys.contains(key.key_of(m)))
            .cloned()
            .collect(),
        mutuals: snapshot
            .followers
            .iter()
            .filter(|m| following_keys.contains(key.key_of(m)))
            .cloned()
            .collect(),
    }
}

/// Followers per following account, or None when nothing is followed.
pub fn follow_ratio(follower_count: usize, following_count: usize) -> Option<f64> {
    if following_count == 0 {
        None
    } else {
        Some(follower_count as f64 / following_count as f64)
    }
}

/// Case-insensitive substring match on handle or display name.
/// An empty query matches everything; order is preserved.
pub fn search<'a>(members: &'a [Member], query: &str) -> Vec<&'a Member> {
    let q = query.trim().to_lowercase();
    members
        .iter()
        .filter(|m| {
            q.is_empty()
                || m.handle.to_lowercase().contains(&q)
                || m.display_name.to_lowercase().contains(&q)
        })
        .collect()
}
