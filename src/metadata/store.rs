//! Track metadata types and the abstract store trait.
//!
//! Any metadata backend must implement [`TrackStore`].  The trait uses
//! pinned-future methods (manual `async_trait` desugaring) so both the
//! embedded SQLite store and the networked MySQL store fit behind the
//! same `Arc<dyn TrackStore>`.
//!
//! A full [`Track`] row carries the internal storage `key` and the legacy
//! `url` column.  Neither may leave the process: the only thing handlers
//! serialize is a [`TrackSummary`], which has no field for either.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Column holding the row identifier.
pub const ID_COLUMN: &str = "id";

/// Column holding the object-storage path of the audio file.
pub const KEY_COLUMN: &str = "key";

/// Legacy direct-URL column, never exposed.
pub const URL_COLUMN: &str = "url";

// ── Errors ─────────────────────────────────────────────────────────

/// Failure talking to the metadata store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite query or connection failure.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// MySQL query or connection failure.
    #[error("mysql: {0}")]
    MySql(#[from] sqlx::Error),

    /// The connection mutex was poisoned by a panicking request.
    #[error("store connection lock poisoned")]
    Poisoned,

    /// A row did not have the shape of a track.
    #[error("malformed track row: {0}")]
    MalformedRow(String),
}

/// Rejected track identifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackIdError {
    /// Input is not a run of ASCII digits.
    #[error("track id {0:?} is not numeric")]
    NotNumeric(String),

    /// Digits only, but too large for the id column.
    #[error("track id {0:?} is out of range")]
    OutOfRange(String),
}

// ── Track id ───────────────────────────────────────────────────────

/// Validation shape for raw path segments.
#[derive(Debug, garde::Validate)]
struct RawTrackId {
    #[garde(length(min = 1), pattern(r"^[0-9]+$"))]
    id: String,
}

/// A track identifier that has passed validation.
///
/// The only constructor is [`TrackId::parse`], so every store lookup is
/// guaranteed to be keyed by a well-formed integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(i64);

impl TrackId {
    /// Validate an untrusted path segment.
    ///
    /// Accepts ASCII digits only; signs, whitespace and anything else are
    /// rejected, as are values that overflow `i64`.
    pub fn parse(raw: &str) -> Result<Self, TrackIdError> {
        let candidate = RawTrackId { id: raw.to_string() };
        if garde::Validate::validate(&candidate).is_err() {
            return Err(TrackIdError::NotNumeric(raw.to_string()));
        }
        raw.parse::<i64>()
            .map(TrackId)
            .map_err(|_| TrackIdError::OutOfRange(raw.to_string()))
    }

    /// The numeric value, for binding as a query parameter.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Record types ───────────────────────────────────────────────────

/// A full row from the `tracks` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Primary key.
    pub id: i64,
    /// Object-storage path of the audio file.
    pub key: String,
    /// Legacy raw URL, if the row has one.
    pub url: Option<String>,
    /// Every other column, by name. Opaque to this service.
    pub metadata: Map<String, Value>,
}

/// The public projection of a track: id plus display metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSummary {
    /// Primary key.
    pub id: i64,
    /// Display columns (title, artist, ...).
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Track {
    /// Build a track from `(column, value)` pairs as returned by `SELECT *`.
    pub fn from_columns(
        columns: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<Self, StoreError> {
        let mut id = None;
        let mut key = None;
        let mut url = None;
        let mut metadata = Map::new();

        for (name, value) in columns {
            match name.as_str() {
                ID_COLUMN => id = value.as_i64(),
                KEY_COLUMN => key = value.as_str().map(str::to_string),
                URL_COLUMN => url = value.as_str().map(str::to_string),
                _ => {
                    metadata.insert(name, value);
                }
            }
        }

        let id = id.ok_or_else(|| StoreError::MalformedRow("missing integer id".to_string()))?;
        let key = key.ok_or_else(|| {
            StoreError::MalformedRow(format!("track {id} has no storage key"))
        })?;

        Ok(Self {
            id,
            key,
            url,
            metadata,
        })
    }

    /// Drop the internal fields.
    pub fn into_summary(self) -> TrackSummary {
        TrackSummary {
            id: self.id,
            metadata: self.metadata,
        }
    }
}

impl TrackSummary {
    /// Build a summary straight from `(column, value)` pairs, discarding
    /// `key` and `url` whether or not they are present.
    pub fn from_columns(
        columns: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<Self, StoreError> {
        let mut id = None;
        let mut metadata = Map::new();

        for (name, value) in columns {
            match name.as_str() {
                ID_COLUMN => id = value.as_i64(),
                KEY_COLUMN | URL_COLUMN => {}
                _ => {
                    metadata.insert(name, value);
                }
            }
        }

        let id = id.ok_or_else(|| StoreError::MalformedRow("missing integer id".to_string()))?;
        Ok(Self { id, metadata })
    }
}

// ── Trait ───────────────────────────────────────────────────────────

/// Async track metadata contract.
///
/// All methods are read-only.
pub trait TrackStore: Send + Sync + 'static {
    /// List every track, stripped of internal fields, ordered by id.
    fn list_tracks(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TrackSummary>, StoreError>> + Send + '_>>;

    /// Fetch a single track including its storage key.
    fn get_track(
        &self,
        id: TrackId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Track>, StoreError>> + Send + '_>>;

    /// Round-trip a trivial query to check the connection.
    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Release the underlying connection. Called once at shutdown, after
    /// the server has drained.
    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn columns(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_track_id_accepts_digits() {
        assert_eq!(TrackId::parse("42").unwrap().get(), 42);
        assert_eq!(TrackId::parse("007").unwrap().get(), 7);
    }

    #[test]
    fn test_track_id_rejects_non_digits() {
        for raw in ["", "abc", "1;DROP TABLE tracks", "-1", "+1", " 1", "1.5", "0x10"] {
            assert_eq!(
                TrackId::parse(raw),
                Err(TrackIdError::NotNumeric(raw.to_string())),
                "input {raw:?}"
            );
        }
    }

    #[test]
    fn test_track_id_rejects_overflow() {
        let raw = "99999999999999999999";
        assert_eq!(
            TrackId::parse(raw),
            Err(TrackIdError::OutOfRange(raw.to_string()))
        );
    }

    #[test]
    fn test_track_from_columns_splits_internal_fields() {
        let track = Track::from_columns(columns(&[
            ("id", json!(1)),
            ("title", json!("A")),
            ("key", json!("a.mp3")),
            ("url", json!("http://old")),
        ]))
        .unwrap();

        assert_eq!(track.id, 1);
        assert_eq!(track.key, "a.mp3");
        assert_eq!(track.url.as_deref(), Some("http://old"));
        assert_eq!(track.metadata.len(), 1);
        assert_eq!(track.metadata["title"], json!("A"));
    }

    #[test]
    fn test_track_from_columns_requires_key() {
        let err = Track::from_columns(columns(&[("id", json!(3)), ("title", json!("x"))]))
            .unwrap_err();
        assert!(matches!(err, StoreError::MalformedRow(_)));
    }

    #[test]
    fn test_summary_serializes_without_key_or_url() {
        let summary = Track::from_columns(columns(&[
            ("id", json!(1)),
            ("title", json!("A")),
            ("key", json!("a.mp3")),
            ("url", json!("http://old")),
        ]))
        .unwrap()
        .into_summary();

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value, json!({"id": 1, "title": "A"}));
    }

    #[test]
    fn test_summary_from_columns_tolerates_missing_key() {
        let summary = TrackSummary::from_columns(columns(&[
            ("id", json!(9)),
            ("artist", json!("B")),
            ("url", Value::Null),
        ]))
        .unwrap();
        assert_eq!(
            serde_json::to_value(&summary).unwrap(),
            json!({"id": 9, "artist": "B"})
        );
    }
}
