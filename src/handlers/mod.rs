//! HTTP handlers.
//!
//! Each submodule groups the handlers for one resource.  Handlers return
//! `Result<_, ApiError>` so failures are mapped to status codes in one
//! place.

pub mod tracks;
