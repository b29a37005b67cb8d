// Database queries — every read and write of snapshot history.
//
// All SQL lives here. The SnapshotStore implementation in sqlite.rs is a
// thin async wrapper around these functions, and the tests below exercise
// them directly against an in-memory Connection.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{
    ExportDocument, IdentityExport, LastObservation, Member, Snapshot, TrackedIdentity,
};

/// Timestamps are stored as fixed-width RFC 3339 text so they sort lexically.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid stored timestamp: {raw}"))?;
    Ok(parsed.with_timezone(&Utc))
}

// --- History ---

/// Append a snapshot to its identity's history and keep the derived records
/// in step: evict beyond `retention`, then upsert the last-observation and
/// tracked-identity rows. Runs as a single transaction.
pub fn append_snapshot(conn: &Connection, snapshot: &Snapshot, retention: usize) -> Result<()> {
    let followers_json = serde_json::to_string(&snapshot.followers)?;
    let following_json = serde_json::to_string(&snapshot.following)?;
    let taken_at = format_timestamp(&snapshot.taken_at);
    let retention = retention.max(1) as i64;

    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO snapshots
            (identity, taken_at, follower_count, following_count, followers_json, following_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            snapshot.identity,
            taken_at,
            snapshot.follower_count as i64,
            snapshot.following_count as i64,
            followers_json,
            following_json,
        ],
    )?;

    // FIFO eviction: keep only the newest `retention` rows
    tx.execute(
        "DELETE FROM snapshots
         WHERE identity = ?1
           AND id NOT IN (
               SELECT id FROM snapshots WHERE identity = ?1 ORDER BY id DESC LIMIT ?2
           )",
        params![snapshot.identity, retention],
    )?;

    tx.execute(
        "INSERT INTO last_observations (identity, taken_at, follower_count, following_count)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(identity) DO UPDATE SET
            taken_at = ?2,
            follower_count = ?3,
            following_count = ?4",
        params![
            snapshot.identity,
            taken_at,
            snapshot.follower_count as i64,
            snapshot.following_count as i64,
        ],
    )?;

    tx.execute(
        "INSERT INTO tracked_identities (identity, first_tracked_at, last_taken_at, snapshot_count)
         VALUES (?1, ?2, ?2, (SELECT COUNT(*) FROM snapshots WHERE identity = ?1))
         ON CONFLICT(identity) DO UPDATE SET
            last_taken_at = ?2,
            snapshot_count = excluded.snapshot_count",
        params![snapshot.identity, taken_at],
    )?;

    tx.commit()?;
    Ok(())
}

/// Raw snapshot columns, decoded into a Snapshot outside the row closure so
/// JSON errors propagate instead of being swallowed.
struct SnapshotRow {
    identity: String,
    taken_at: String,
    follower_count: i64,
    following_count: i64,
    followers_json: String,
    following_json: String,
}

impl SnapshotRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            identity: row.get(0)?,
            taken_at: row.get(1)?,
            follower_count: row.get(2)?,
            following_count: row.get(3)?,
            followers_json: row.get(4)?,
            following_json: row.get(5)?,
        })
    }

    fn into_snapshot(self) -> Result<Snapshot> {
        let followers: Vec<Member> = serde_json::from_str(&self.followers_json)
            .with_context(|| format!("Corrupt follower list for {}", self.identity))?;
        let following: Vec<Member> = serde_json::from_str(&self.following_json)
            .with_context(|| format!("Corrupt following list for {}", self.identity))?;
        // Counts come from the row, not the decoded lists: they are fixed
        // at creation time.
        Ok(Snapshot {
            taken_at: parse_timestamp(&self.taken_at)?,
            identity: self.identity,
            followers,
            following,
            follower_count: self.follower_count as usize,
            following_count: self.following_count as usize,
        })
    }
}

/// Full retained history for an identity, oldest first. Empty if unknown.
pub fn get_history(conn: &Connection, identity: &str) -> Result<Vec<Snapshot>> {
    let mut stmt = conn.prepare(
        "SELECT identity, taken_at, follower_count, following_count, followers_json, following_json
         FROM snapshots
         WHERE identity = ?1
         ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![identity], SnapshotRow::from_row)?;

    let mut snapshots = Vec::new();
    for row in rows {
        snapshots.push(row?.into_snapshot()?);
    }
    Ok(snapshots)
}

/// The most recently appended snapshot for an identity.
pub fn get_latest(conn: &Connection, identity: &str) -> Result<Option<Snapshot>> {
    let mut stmt = conn.prepare(
        "SELECT identity, taken_at, follower_count, following_count, followers_json, following_json
         FROM snapshots
         WHERE identity = ?1
         ORDER BY id DESC
         LIMIT 1",
    )?;
    let row = stmt
        .query_row(params![identity], SnapshotRow::from_row)
        .optional()?;
    row.map(SnapshotRow::into_snapshot).transpose()
}

// --- Last observation ---

pub fn get_last_observation(conn: &Connection, identity: &str) -> Result<Option<LastObservation>> {
    let mut stmt = conn.prepare(
        "SELECT taken_at, follower_count, following_count
         FROM last_observations WHERE identity = ?1",
    )?;
    let row: Option<(String, i64, i64)> = stmt
        .query_row(params![identity], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .optional()?;

    match row {
        Some((taken_at, followers, following)) => Ok(Some(LastObservation {
            taken_at: parse_timestamp(&taken_at)?,
            follower_count: followers as usize,
            following_count: following as usize,
        })),
        None => Ok(None),
    }
}

// --- Identity lifecycle ---

/// Remove an identity's history, last observation and index row.
/// Returns the number of snapshots removed; unknown identities remove nothing.
pub fn delete_identity(conn: &Connection, identity: &str) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let removed = tx.execute("DELETE FROM snapshots WHERE identity = ?1", params![identity])?;
    tx.execute(
        "DELETE FROM last_observations WHERE identity = ?1",
        params![identity],
    )?;
    tx.execute(
        "DELETE FROM tracked_identities WHERE identity = ?1",
        params![identity],
    )?;
    tx.commit()?;
    Ok(removed)
}

/// Every identity with at least one stored snapshot, ordered by identity.
pub fn get_tracked_identities(conn: &Connection) -> Result<Vec<TrackedIdentity>> {
    let mut stmt = conn.prepare(
        "SELECT identity, first_tracked_at, last_taken_at, snapshot_count
         FROM tracked_identities
         WHERE snapshot_count > 0
         ORDER BY identity ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
        ))
    })?;

    let mut tracked = Vec::new();
    for row in rows {
        let (identity, first, last, count) = row?;
        tracked.push(TrackedIdentity {
            identity,
            first_tracked_at: parse_timestamp(&first)?,
            last_taken_at: parse_timestamp(&last)?,
            snapshot_count: count as usize,
        });
    }
    Ok(tracked)
}

// --- Export ---

/// Dump every identity's history and last observation.
pub fn export_all(conn: &Connection) -> Result<ExportDocument> {
    let mut identities = Vec::new();
    for tracked in get_tracked_identities(conn)? {
        let snapshots = get_history(conn, &tracked.identity)?;
        let last_observation = get_last_observation(conn, &tracked.identity)?;
        identities.push(IdentityExport {
            identity: tracked.identity,
            snapshots,
            last_observation,
        });
    }

    Ok(ExportDocument {
        exported_at: Utc::now(),
        identities,
    })
}
