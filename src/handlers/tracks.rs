//! Track listing and stream-link handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::ApiError;
use crate::metadata::store::{TrackId, TrackSummary};
use crate::metrics;
use crate::AppState;

/// Body of `GET /tracks`.
#[derive(Debug, Serialize)]
pub struct TrackList {
    pub tracks: Vec<TrackSummary>,
}

/// Body of `GET /tracks/{id}/stream`.
#[derive(Debug, Serialize)]
pub struct StreamLink {
    pub url: String,
}

/// `GET /tracks` -- every track, without storage keys or legacy URLs.
#[utoipa::path(
    get,
    path = "/tracks",
    tag = "Tracks",
    operation_id = "ListTracks",
    responses(
        (status = 200, description = "Track list"),
        (status = 500, description = "Store failure")
    )
)]
pub async fn list_tracks(State(state): State<Arc<AppState>>) -> Result<Json<TrackList>, ApiError> {
    let tracks = state.tracks.list_tracks().await?;
    debug!("Listed {} tracks", tracks.len());
    Ok(Json(TrackList { tracks }))
}

/// `GET /tracks/{id}/stream` -- a fresh 60-second download link.
///
/// The id is validated before the store is touched.  An id with no row
/// is a 404; only store and signing failures are 500s.
#[utoipa::path(
    get,
    path = "/tracks/{id}/stream",
    tag = "Tracks",
    operation_id = "StreamTrack",
    params(("id" = String, Path, description = "Numeric track id")),
    responses(
        (status = 200, description = "Signed download link"),
        (status = 404, description = "No such track"),
        (status = 500, description = "Store or signing failure")
    )
)]
pub async fn stream_track(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StreamLink>, ApiError> {
    let id = TrackId::parse(&id)?;

    let track = state
        .tracks
        .get_track(id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let link = state.links.issue(&track.key).await?;
    metrics::record_link_issued();
    info!(
        track_id = track.id,
        expires_in = link.expires_in.as_secs(),
        "Issued stream link"
    );

    Ok(Json(StreamLink { url: link.url }))
}
