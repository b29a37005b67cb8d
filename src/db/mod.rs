// Database layer — SQLite storage for snapshot history.
//
// We use rusqlite with the "bundled" feature so there's no system SQLite
// dependency. The database file lives wherever FOLLOWTRAIL_DB_PATH points
// (defaults to ./followtrail.db).

pub mod models;
pub mod queries;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use sqlite::SqliteStore;
pub use traits::SnapshotStore;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

/// Open (or create) the database and run migrations.
///
/// Called by `followtrail init` and by any command that records snapshots.
pub fn initialize(db_path: &str) -> Result<Connection> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for database: {}", db_path))?;
        }
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;

    schema::create_tables(&conn)?;

    Ok(conn)
}

/// Open an existing database (fails if it doesn't exist yet).
pub fn open(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        anyhow::bail!(
            "Database not found at {}. Run `followtrail init` first.",
            db_path
        );
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;

    // Bring older databases up to the current schema.
    schema::create_tables(&conn)?;

    Ok(conn)
}

/// Create (if needed) and open the SQLite store behind the trait object.
pub fn initialize_sqlite(db_path: &str, retention: usize) -> Result<Arc<dyn SnapshotStore>> {
    let conn = initialize(db_path)?;
    Ok(Arc::new(SqliteStore::with_retention(conn, retention)))
}

/// Open an existing SQLite store behind the trait object.
pub fn open_sqlite(db_path: &str, retention: usize) -> Result<Arc<dyn SnapshotStore>> {
    let conn = open(db_path)?;
    Ok(Arc::new(SqliteStore::with_retention(conn, retention)))
}
