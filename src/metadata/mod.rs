//! Track metadata layer.
//!
//! The [`store::TrackStore`] trait defines the read interface;
//! [`sqlite::SqliteTrackStore`] and [`mysql::MySqlTrackStore`] implement it.

pub mod mysql;
pub mod sqlite;
pub mod store;
