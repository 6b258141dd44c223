//! SQLite-backed track store.
//!
//! Uses `rusqlite` with the `bundled` feature so no system SQLite
//! library is required.  All async trait methods are thin wrappers
//! around synchronous rusqlite calls executed under a `Mutex`.
//!
//! The `tracks` table is owned by the ingestion process.  This store only
//! reads it; [`SqliteTrackStore::ensure_schema`] creates a minimal table
//! for local development and tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{Map, Value};

use super::store::{StoreError, Track, TrackId, TrackStore, TrackSummary};

/// Track store backed by a single SQLite database file.
pub struct SqliteTrackStore {
    /// The database connection, guarded by a mutex for Send + Sync.
    conn: Mutex<Connection>,
}

impl SqliteTrackStore {
    /// Open (or create) the database at `path`.
    ///
    /// Passing `":memory:"` creates an in-memory database (useful for tests).
    pub fn new(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.apply_pragmas()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Apply recommended SQLite pragmas. The store never writes in normal
    /// operation, so only the read-relevant ones matter.
    fn apply_pragmas(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;
        Ok(())
    }

    /// Create a minimal `tracks` table if it does not already exist.
    /// Idempotent.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tracks (
                id      INTEGER PRIMARY KEY,
                title   TEXT NOT NULL DEFAULT '',
                artist  TEXT NOT NULL DEFAULT '',
                key     TEXT NOT NULL,
                url     TEXT
            );
            ",
        )?;
        Ok(())
    }

    /// Insert a track row (fixtures only). Returns the new row id.
    #[cfg(test)]
    pub(crate) fn insert_track(
        &self,
        title: &str,
        artist: &str,
        key: &str,
        url: Option<&str>,
    ) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tracks (title, artist, key, url) VALUES (?1, ?2, ?3, ?4)",
            params![title, artist, key, url],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Run arbitrary SQL against the connection (fixtures only).
    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }
}

/// Convert one SQLite cell into JSON.
fn value_ref_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        // Binary columns have no JSON form.
        ValueRef::Blob(_) => Value::Null,
    }
}

/// Read every column of `row` as `(name, value)` pairs.
fn row_columns(row: &Row<'_>, names: &[String]) -> rusqlite::Result<Map<String, Value>> {
    let mut columns = Map::with_capacity(names.len());
    for (idx, name) in names.iter().enumerate() {
        columns.insert(name.clone(), value_ref_to_json(row.get_ref(idx)?));
    }
    Ok(columns)
}

// ── TrackStore implementation ──────────────────────────────────────

impl TrackStore for SqliteTrackStore {
    fn list_tracks(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TrackSummary>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let conn = self.lock()?;
            let mut stmt = conn.prepare("SELECT * FROM tracks ORDER BY id")?;
            let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

            let rows = stmt
                .query_map([], |row| row_columns(row, &names))?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter().map(TrackSummary::from_columns).collect()
        })
    }

    fn get_track(
        &self,
        id: TrackId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Track>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let conn = self.lock()?;
            let mut stmt = conn.prepare("SELECT * FROM tracks WHERE id = ?1")?;
            let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

            let columns = stmt
                .query_row(params![id.get()], |row| row_columns(row, &names))
                .optional()?;

            columns.map(Track::from_columns).transpose()
        })
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let conn = self.lock()?;
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }
}
