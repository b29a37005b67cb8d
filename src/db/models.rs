// Data models — the records the snapshot store persists and hands back.
//
// These are separate from the queries so the diff and history modules can
// work on them without depending on rusqlite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Number of snapshots retained per identity unless configured otherwise.
pub const MAX_SNAPSHOTS: usize = 50;

/// One entry in a followers or following list.
///
/// Field aliases accept the extension payload shape
/// (`username`, `full_name`, `profile_pic_url`) as well as our own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Stable remote identifier. Older payloads may leave it empty, and
    /// extension payloads send numeric ids.
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(alias = "username")]
    pub handle: String,
    #[serde(default, alias = "full_name", deserialize_with = "string_or_null")]
    pub display_name: String,
    #[serde(default, alias = "profile_pic_url", deserialize_with = "string_or_null")]
    pub avatar_url: String,
}

/// Accept `"123"`, `123` or `null` for an identifier field.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Text(text)) => text,
        Some(RawId::Number(number)) => number.to_string(),
        None => String::new(),
    })
}

/// Treat `null` like a missing string.
fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Member {
    /// Build a member that only carries a handle (ids and display fields empty).
    pub fn with_handle(handle: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            handle: handle.into(),
            display_name: String::new(),
            avatar_url: String::new(),
        }
    }
}

/// One point-in-time observation of an identity's membership lists.
///
/// Counts are fixed at construction and travel with the snapshot; they are
/// what the deltas in a diff are computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub identity: String,
    pub taken_at: DateTime<Utc>,
    pub followers: Vec<Member>,
    pub following: Vec<Member>,
    pub follower_count: usize,
    pub following_count: usize,
}

impl Snapshot {
    pub fn new(
        identity: impl Into<String>,
        taken_at: DateTime<Utc>,
        followers: Vec<Member>,
        following: Vec<Member>,
    ) -> Self {
        let follower_count = followers.len();
        let following_count = following.len();
        Self {
            identity: identity.into(),
            taken_at,
            followers,
            following,
            follower_count,
            following_count,
        }
    }

    /// The cheap summary record written alongside every appended snapshot.
    pub fn observation(&self) -> LastObservation {
        LastObservation {
            taken_at: self.taken_at,
            follower_count: self.follower_count,
            following_count: self.following_count,
        }
    }
}

/// Summary of the most recent observation, readable without loading lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastObservation {
    pub taken_at: DateTime<Utc>,
    pub follower_count: usize,
    pub following_count: usize,
}

/// A row of the tracked-identity index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedIdentity {
    pub identity: String,
    pub first_tracked_at: DateTime<Utc>,
    pub last_taken_at: DateTime<Utc>,
    pub snapshot_count: usize,
}

/// Everything stored for one identity, as written by the bulk export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityExport {
    pub identity: String,
    pub snapshots: Vec<Snapshot>,
    pub last_observation: Option<LastObservation>,
}

/// The full persisted state: one entry per tracked identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub exported_at: DateTime<Utc>,
    pub identities: Vec<IdentityExport>,
}
