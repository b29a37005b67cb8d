// Database schema — table creation and migrations.
//
// `create_tables` builds the base tables, then a `schema_version` table
// records which numbered migrations have run. Each migration is a function
// that executes SQL statements and is applied at most once.
// There is no versioning of the stored JSON itself; changing the Member or
// Snapshot layout is a breaking change for existing databases.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// This is idempotent — safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- History records: one row per snapshot, oldest has the lowest id
        CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            identity TEXT NOT NULL,
            taken_at TEXT NOT NULL,            -- RFC 3339, UTC
            follower_count INTEGER NOT NULL,
            following_count INTEGER NOT NULL,
            followers_json TEXT NOT NULL,      -- JSON array of members
            following_json TEXT NOT NULL
        );

        -- Last-observation records, readable without loading member lists
        CREATE TABLE IF NOT EXISTS last_observations (
            identity TEXT PRIMARY KEY,
            taken_at TEXT NOT NULL,
            follower_count INTEGER NOT NULL,
            following_count INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_snapshots_identity
            ON snapshots(identity, id);
        ",
    )
    .context("Failed to create database tables")?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    // Migration v2: explicit tracked-identity index. Earlier databases
    // derived the tracked set from the snapshot rows; backfill from them so
    // the index starts out consistent with the stored histories.
    run_migration(conn, 2, |c| {
        c.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tracked_identities (
                identity TEXT PRIMARY KEY,
                first_tracked_at TEXT NOT NULL,
                last_taken_at TEXT NOT NULL,
                snapshot_count INTEGER NOT NULL
            );

            INSERT OR IGNORE INTO tracked_identities
                (identity, first_tracked_at, last_taken_at, snapshot_count)
            SELECT identity, MIN(taken_at), MAX(taken_at), COUNT(*)
            FROM snapshots
            GROUP BY identity;
            ",
        )
    })?;

    Ok(())
}

/// Run a migration if it hasn't been applied yet.
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
    }

    #[test]
    fn test_table_count() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        // schema_version, snapshots, last_observations, tracked_identities
        assert_eq!(table_count(&conn).unwrap(), 4);
    }

    #[test]
    fn test_migration_versions_recorded_once() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();

        let versions: Vec<i64> = conn
            .prepare("SELECT version FROM schema_version ORDER BY version")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(versions, vec![1, 2]);
    }

    #[test]
    fn test_migration_v2_backfills_index_from_snapshots() {
        let conn = Connection::open_in_memory().unwrap();
        // Simulate a v1 database that already holds history rows.
        conn.execute_batch(
            "
            CREATE TABLE schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            INSERT INTO schema_version (version) VALUES (1);
            CREATE TABLE snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                identity TEXT NOT NULL,
                taken_at TEXT NOT NULL,
                follower_count INTEGER NOT NULL,
                following_count INTEGER NOT NULL,
                followers_json TEXT NOT NULL,
                following_json TEXT NOT NULL
            );
            INSERT INTO snapshots (identity, taken_at, follower_count, following_count, followers_json, following_json)
            VALUES ('alice', '2024-01-01T00:00:00.000Z', 0, 0, '[]', '[]'),
                   ('alice', '2024-01-02T00:00:00.000Z', 0, 0, '[]', '[]'),
                   ('bob', '2024-01-03T00:00:00.000Z', 0, 0, '[]', '[]');
            ",
        )
        .unwrap();

        create_tables(&conn).unwrap();

        let (first, last, count): (String, String, i64) = conn
            .query_row(
                "SELECT first_tracked_at, last_taken_at, snapshot_count
                 FROM tracked_identities WHERE identity = 'alice'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(first, "2024-01-01T00:00:00.000Z");
        assert_eq!(last, "2024-01-02T00:00:00.000Z");
        assert_eq!(count, 2);

        let tracked: i64 = conn
            .query_row("SELECT COUNT(*) FROM tracked_identities", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(tracked, 2);
    }
}
