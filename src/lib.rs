//! trackstream library -- track metadata and signed download links.
//!
//! This crate provides the components of a small read-only HTTP service:
//! a track metadata store (SQLite or MySQL), a signed-link issuer backed by
//! S3 presigning, and the axum router that composes them.

use std::sync::Arc;

pub mod config;
pub mod errors;
pub mod handlers;
pub mod metadata;
pub mod metrics;
pub mod server;
pub mod storage;

use crate::config::Config;
use crate::metadata::store::TrackStore;
use crate::storage::backend::LinkIssuer;

/// Shared application state passed to all handlers via `axum::extract::State`.
///
/// Built once in `main` and dropped after the server drains; nothing in
/// here is mutated per request.
pub struct AppState {
    /// Service configuration.
    pub config: Config,
    /// Track metadata store.
    pub tracks: Arc<dyn TrackStore>,
    /// Signed-link issuer for the audio bucket.
    pub links: Arc<dyn LinkIssuer>,
}
