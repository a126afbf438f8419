//! Cache database migrations.
//!
//! Migrations are run in order and tracked in the `migrations` table.

use crate::{StoreError, StoreResult};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version.
pub const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> StoreResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM migrations",
        [],
        |row| row.get(0),
    )?;

    if current_version > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "cache schema version {current_version} is newer than supported version {CURRENT_VERSION}"
        )));
    }

    info!(current_version, target_version = CURRENT_VERSION, "Running cache migrations");

    if current_version < 1 {
        migrate_v1_cached_logs(conn)?;
    }

    Ok(())
}

fn record_migration(conn: &Connection, version: i32, name: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![version, name],
    )?;
    debug!(version, name, "Migration applied");
    Ok(())
}

/// V1: Cached log payloads awaiting redelivery.
fn migrate_v1_cached_logs(conn: &Connection) -> StoreResult<()> {
    info!("Applying migration v1: cached logs");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS cached_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            transport_kind TEXT NOT NULL,
            host TEXT NOT NULL,
            port INTEGER NOT NULL,
            max_level INTEGER,
            payload BLOB NOT NULL,
            state TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_cached_logs_state
            ON cached_logs(state, id);
        ",
    )?;

    record_migration(conn, 1, "cached_logs")?;
    Ok(())
}
