//! HTTP-facing error type.
//!
//! Every variant maps to exactly one status code.  The enum implements
//! [`axum::response::IntoResponse`] so handlers can simply return
//! `Err(ApiError::NotFound)` or use `?` on store and signing results.
//! Error responses never carry a body; the cause is logged server-side.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, error};

use crate::metadata::store::{StoreError, TrackIdError};
use crate::metrics;
use crate::storage::backend::SigningError;

/// Request failures, tagged by kind.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No track matches the requested id, or the id is malformed.
    #[error("track not found")]
    NotFound,

    /// The metadata store failed.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    /// The storage provider could not sign a link.
    #[error("signing failure: {0}")]
    Signing(#[from] SigningError),
}

impl From<TrackIdError> for ApiError {
    fn from(err: TrackIdError) -> Self {
        debug!("Rejected track id: {}", err);
        ApiError::NotFound
    }
}

impl ApiError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::NotFound => "not_found",
            ApiError::Store(_) => "store",
            ApiError::Signing(_) => "signing",
        }
    }

    /// Return the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!(kind = self.kind(), "{}", self);
            metrics::record_error(self.kind());
        } else {
            debug!(kind = self.kind(), "{}", self);
        }

        status.into_response()
    }
}
