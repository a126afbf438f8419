//! SQLite-backed cache store.

use crate::{migrations, CacheStore, CachedEntry, EntryId, EntryState, StoreError, StoreResult};
use logship_core::{Destination, Level, TransportKind};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// State given to rows whose destination could not be decoded.
const INVALID_STATE: &str = "invalid";

/// Cache store persisted in a SQLite database.
///
/// Entries survive process restarts. Rows left in flight by a process that
/// exited mid-pass are returned to pending when the store is opened.
pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteCacheStore {
    /// Open a cache database at the given path, running migrations if needed.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        let store = Self::from_connection(conn, Some(path.to_path_buf()))?;
        info!(path = %path.display(), "Opened cache database");
        Ok(store)
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA temp_store = MEMORY;")?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        migrations::run_migrations(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            path,
        };
        store.recover()?;
        Ok(store)
    }

    /// Database file, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Reset rows left in flight by a previous process back to pending.
    fn recover(&self) -> StoreResult<usize> {
        let reset = self.conn.lock().execute(
            "UPDATE cached_logs SET state = ?1 WHERE state = ?2",
            params![EntryState::Pending.as_str(), EntryState::InFlight.as_str()],
        )?;
        if reset > 0 {
            info!(count = reset, "Recovered in-flight cached entries to pending");
        }
        Ok(reset)
    }

    /// Rows set aside because their destination could not be decoded.
    pub fn invalid_count(&self) -> StoreResult<usize> {
        let count: i64 = self.conn.lock().query_row(
            "SELECT COUNT(*) FROM cached_logs WHERE state = ?1",
            [INVALID_STATE],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

struct CachedRow {
    id: i64,
    transport_kind: String,
    host: String,
    port: i64,
    max_level: Option<i64>,
    payload: Vec<u8>,
}

impl CachedRow {
    fn decode(self) -> StoreResult<CachedEntry> {
        let kind: TransportKind = self
            .transport_kind
            .parse()
            .map_err(|e| StoreError::InvalidData(format!("row {}: {e}", self.id)))?;
        let port = u16::try_from(self.port)
            .map_err(|_| StoreError::InvalidData(format!("row {}: port {} out of range", self.id, self.port)))?;

        let mut destination = Destination::new(kind, self.host, port);
        if let Some(code) = self.max_level {
            let level = Level::try_from(code)
                .map_err(|e| StoreError::InvalidData(format!("row {}: {e}", self.id)))?;
            destination = destination.with_max_level(level);
        }

        Ok(CachedEntry {
            id: EntryId(self.id),
            destination,
            payload: self.payload,
        })
    }
}

impl CacheStore for SqliteCacheStore {
    fn pending_count(&self) -> StoreResult<usize> {
        let count: i64 = self.conn.lock().query_row(
            "SELECT COUNT(*) FROM cached_logs WHERE state IN (?1, ?2)",
            params![EntryState::Pending.as_str(), EntryState::InFlight.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn add(&self, destination: &Destination, payload: &[u8]) -> StoreResult<EntryId> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO cached_logs (transport_kind, host, port, max_level, payload, state)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                destination.kind().as_str(),
                destination.host(),
                i64::from(destination.port()),
                destination.max_level().map(Level::code),
                payload,
                EntryState::Pending.as_str(),
            ],
        )?;
        let id = EntryId(conn.last_insert_rowid());
        debug!(entry_id = %id, destination = %destination, "Cached entry");
        Ok(id)
    }

    fn checkout(&self) -> StoreResult<Vec<CachedEntry>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let rows = {
            let mut stmt = tx.prepare(
                "SELECT id, transport_kind, host, port, max_level, payload
                 FROM cached_logs WHERE state = ?1 ORDER BY id",
            )?;
            let rows = stmt
                .query_map([EntryState::Pending.as_str()], |row| {
                    Ok(CachedRow {
                        id: row.get(0)?,
                        transport_kind: row.get(1)?,
                        host: row.get(2)?,
                        port: row.get(3)?,
                        max_level: row.get(4)?,
                        payload: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match row.decode() {
                Ok(entry) => {
                    tx.execute(
                        "UPDATE cached_logs SET state = ?1 WHERE id = ?2",
                        params![EntryState::InFlight.as_str(), id],
                    )?;
                    entries.push(entry);
                }
                Err(e) => {
                    error!(entry_id = id, error = %e, "Setting aside undecodable cached entry");
                    tx.execute(
                        "UPDATE cached_logs SET state = ?1 WHERE id = ?2",
                        params![INVALID_STATE, id],
                    )?;
                }
            }
        }

        tx.commit()?;
        Ok(entries)
    }

    fn complete(&self, id: EntryId, delivered: bool) -> StoreResult<()> {
        let conn = self.conn.lock();
        if delivered {
            conn.execute("DELETE FROM cached_logs WHERE id = ?1", [id.0])?;
        } else {
            conn.execute(
                "UPDATE cached_logs SET state = ?1 WHERE id = ?2 AND state = ?3",
                params![EntryState::Pending.as_str(), id.0, EntryState::InFlight.as_str()],
            )?;
        }
        Ok(())
    }
}
