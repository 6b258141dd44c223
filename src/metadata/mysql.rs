//! MySQL-backed track store.
//!
//! This is the production engine: the `tracks` table lives in a MySQL
//! database populated by the ingestion process.  One connection is opened
//! at startup and held for the life of the process; the sqlx pool is only
//! the container for it and is capped at a single connection.
//!
//! Columns are decoded dynamically because the display columns are not
//! known to this service.  Each cell is decoded by its declared column
//! type: integers, floats and date/time types map to their JSON
//! counterparts, and everything else (`DECIMAL`, `JSON`, `SET`, `ENUM`,
//! text in any collation, binary strings) is read as UTF-8 text whatever
//! its charset flags say.  Cells that fit none of these become `null`.

use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlValue};
use sqlx::{Column, Row, TypeInfo, Value as _, ValueRef};
use tracing::{debug, info};

use super::store::{StoreError, Track, TrackId, TrackStore, TrackSummary};
use crate::config::MySqlConfig;

/// Track store backed by a MySQL database.
pub struct MySqlTrackStore {
    pool: MySqlPool,
}

impl MySqlTrackStore {
    /// Connect to the database described by `config`.
    ///
    /// Connects eagerly so that bad credentials or an unreachable host
    /// fail at startup rather than on the first request.
    pub async fn connect(config: &MySqlConfig) -> Result<Self, StoreError> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(config.password.as_deref().unwrap_or_default())
            .database(&config.database);

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        info!(
            "MySQL track store connected: host={} port={} database={}",
            config.host, config.port, config.database
        );

        Ok(Self { pool })
    }
}

/// How a column's cells are turned into JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Signed,
    Unsigned,
    Float,
    DateTime,
    Date,
    Time,
    Text,
}

/// Pick the decoding for a column from its MySQL type name.
fn cell_kind(type_name: &str) -> CellKind {
    if type_name.ends_with("UNSIGNED") || type_name == "BIT" {
        return CellKind::Unsigned;
    }
    match type_name {
        "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            CellKind::Signed
        }
        "FLOAT" | "DOUBLE" => CellKind::Float,
        "DATETIME" | "TIMESTAMP" => CellKind::DateTime,
        "DATE" => CellKind::Date,
        "TIME" => CellKind::Time,
        _ => CellKind::Text,
    }
}

/// Convert one MySQL cell into JSON.
///
/// Integer and text cells are decoded without sqlx's compatibility check:
/// the column type has already been chosen above, and the check rejects
/// `DECIMAL` and binary-collated strings that are plain text on the wire.
fn value_to_json(column: &str, value: MySqlValue) -> Value {
    if value.is_null() {
        return Value::Null;
    }

    let kind = cell_kind(value.type_info().name());
    let decoded = match kind {
        CellKind::Signed => value.try_decode_unchecked::<i64>().map(Value::from),
        CellKind::Unsigned => value.try_decode_unchecked::<u64>().map(Value::from),
        CellKind::Float => value
            .try_decode::<f64>()
            .or_else(|_| value.try_decode::<f32>().map(f64::from))
            .map(|f| {
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }),
        CellKind::DateTime => value
            .try_decode::<chrono::NaiveDateTime>()
            .map(|dt| Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string())),
        CellKind::Date => value
            .try_decode::<chrono::NaiveDate>()
            .map(|d| Value::String(d.to_string())),
        CellKind::Time => value
            .try_decode::<chrono::NaiveTime>()
            .map(|t| Value::String(t.to_string())),
        CellKind::Text => value.try_decode_unchecked::<String>().map(Value::String),
    };

    decoded.unwrap_or_else(|e| {
        debug!("Column {} ({:?}) has no JSON mapping, returning null: {}", column, kind, e);
        Value::Null
    })
}

/// Read every column of `row` as `(name, value)` pairs.
fn row_columns(row: &MySqlRow) -> Map<String, Value> {
    row.columns()
        .iter()
        .map(|col| {
            let value = match row.try_get_raw(col.ordinal()) {
                Ok(raw) => value_to_json(col.name(), ValueRef::to_owned(&raw)),
                Err(e) => {
                    debug!("Column {} could not be read: {}", col.name(), e);
                    Value::Null
                }
            };
            (col.name().to_string(), value)
        })
        .collect()
}

// ── TrackStore implementation ──────────────────────────────────────

impl TrackStore for MySqlTrackStore {
    fn list_tracks(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TrackSummary>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let rows = sqlx::query("SELECT * FROM tracks ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

            rows.iter()
                .map(|row| TrackSummary::from_columns(row_columns(row)))
                .collect()
        })
    }

    fn get_track(
        &self,
        id: TrackId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Track>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let row = sqlx::query("SELECT * FROM tracks WHERE id = ?")
                .bind(id.get())
                .fetch_optional(&self.pool)
                .await?;

            row.map(|row| Track::from_columns(row_columns(&row)))
                .transpose()
        })
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok(())
        })
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.pool.close().await;
            info!("MySQL track store closed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_types_map_by_signedness() {
        assert_eq!(cell_kind("BIGINT"), CellKind::Signed);
        assert_eq!(cell_kind("BOOLEAN"), CellKind::Signed);
        assert_eq!(cell_kind("INT UNSIGNED"), CellKind::Unsigned);
        assert_eq!(cell_kind("BIGINT UNSIGNED"), CellKind::Unsigned);
        assert_eq!(cell_kind("BIT"), CellKind::Unsigned);
    }

    #[test]
    fn test_temporal_and_float_types() {
        assert_eq!(cell_kind("DOUBLE"), CellKind::Float);
        assert_eq!(cell_kind("TIMESTAMP"), CellKind::DateTime);
        assert_eq!(cell_kind("DATE"), CellKind::Date);
        assert_eq!(cell_kind("TIME"), CellKind::Time);
    }

    #[test]
    fn test_decimal_json_and_binary_strings_read_as_text() {
        for name in [
            "DECIMAL", "JSON", "SET", "ENUM", "VARCHAR", "TEXT", "VARBINARY", "BINARY", "BLOB",
        ] {
            assert_eq!(cell_kind(name), CellKind::Text, "{}", name);
        }
    }

    /// Runs against a live server when `TRACKSTREAM_TEST_MYSQL_URL` is set
    /// (e.g. `mysql://root:pw@localhost/test`); otherwise returns early.
    #[tokio::test]
    async fn test_live_decodes_text_like_columns() {
        let Ok(url) = std::env::var("TRACKSTREAM_TEST_MYSQL_URL") else {
            return;
        };
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .unwrap();
        let store = MySqlTrackStore { pool };

        sqlx::query(
            "CREATE TEMPORARY TABLE tracks (
                id     BIGINT PRIMARY KEY,
                title  VARCHAR(64) NOT NULL,
                price  DECIMAL(5,2),
                tags   JSON,
                length TIME,
                mood   SET('calm','loud'),
                `key`  VARCHAR(255) CHARACTER SET utf8mb4 COLLATE utf8mb4_bin NOT NULL,
                url    VARBINARY(255)
            )",
        )
        .execute(&store.pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO tracks VALUES
                (1, 'A', 1.50, '{\"bpm\": 120}', '00:03:30', 'calm', 'audio/a.mp3', 'http://old')",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let tracks = store.list_tracks().await.unwrap();
        let json = serde_json::to_value(&tracks[0]).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["price"], "1.50");
        assert_eq!(json["length"], "00:03:30");
        assert_eq!(json["mood"], "calm");
        assert!(json["tags"].as_str().unwrap().contains("bpm"), "{}", json);
        assert!(json.get("key").is_none());
        assert!(json.get("url").is_none());

        let track = store
            .get_track(TrackId::parse("1").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(track.key, "audio/a.mp3");
        assert_eq!(track.url.as_deref(), Some("http://old"));

        store.close().await;
    }
}
