//! Axum router construction.
//!
//! The [`app`] function wires the track endpoints, the infrastructure
//! endpoints and the optional static front-end, and returns a
//! ready-to-serve [`axum::Router`].

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use utoipa::OpenApi;

use crate::handlers::tracks;
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

// -- OpenAPI specification ----------------------------------------------------

/// OpenAPI documentation for the trackstream API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "trackstream API",
        version = "0.1.0",
        description = "Track metadata listing and signed download links"
    ),
    paths(
        health_check,
        crate::handlers::tracks::list_tracks,
        crate::handlers::tracks::stream_track,
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Tracks", description = "Track listing and streaming"),
    )
)]
struct ApiDoc;

/// Build the axum [`Router`] with all routes.
///
/// The returned router is ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/openapi.json", get(openapi_json))
        .route("/tracks", get(tracks::list_tracks))
        .route("/tracks/:id/stream", get(tracks::stream_track));

    if state.config.observability.metrics {
        router = router.route("/metrics", get(metrics_handler));
    }

    // Anything unmatched falls through to the built front-end.
    if let Some(ref dir) = state.config.server.static_dir {
        info!("Serving static files from {}", dir);
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .with_state(state)
        // Layer ordering: inner layers run first, outer layers wrap them.
        // The front-end may be hosted elsewhere, so every response allows
        // any origin.
        .layer(CorsLayer::new().allow_origin(Any))
        // Access log.
        .layer(TraceLayer::new_for_http())
        // metrics_middleware is outermost (captures full request lifecycle).
        .layer(middleware::from_fn(metrics_middleware))
}

// -- Health check ------------------------------------------------------------

/// `GET /health` -- 200 `{"status":"ok"}` when the store answers, 503 otherwise.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    operation_id = "HealthCheck",
    responses(
        (status = 200, description = "Health check OK"),
        (status = 503, description = "Store unreachable")
    )
)]
async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    match state.tracks.ping().await {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "application/json")],
            r#"{"status":"ok"}"#,
        )
            .into_response(),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "application/json")],
                r#"{"status":"unavailable"}"#,
            )
                .into_response()
        }
    }
}

/// `GET /openapi.json` -- the generated OpenAPI document.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

// -- Tests --------------------------------------------------------------------
