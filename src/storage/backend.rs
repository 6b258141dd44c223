//! Abstract link issuer trait.
//!
//! Every object-storage provider must implement [`LinkIssuer`].  The trait
//! hands out short-lived read links for single objects; it never moves the
//! bytes itself, so callers do not need to know which provider is behind it.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

/// Lifetime of every issued link.
pub const LINK_TTL: Duration = Duration::from_secs(60);

/// A freshly signed, read-only download link.
///
/// Never cached: each call to [`LinkIssuer::issue`] mints a new one with
/// its own expiry window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedLink {
    /// The full URL, including signature query parameters.
    pub url: String,
    /// Object-storage key the link is scoped to.
    pub key: String,
    /// How long the link is valid from the moment it was issued.
    pub expires_in: Duration,
}

/// The provider could not produce a link.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The track row had an empty storage key.
    #[error("cannot sign an empty storage key")]
    EmptyKey,

    /// The signing parameters were rejected before reaching the provider.
    #[error("invalid signing configuration: {0}")]
    Config(String),

    /// The provider SDK failed to sign the request.
    #[error("provider failed to sign {key}: {message}")]
    Provider { key: String, message: String },
}

/// Async signed-link contract.
pub trait LinkIssuer: Send + Sync + 'static {
    /// Sign a read-only URL for `key`, valid for [`LINK_TTL`].
    ///
    /// Existence of the object is not checked; the provider rejects the
    /// link at use time if the object is gone.  No retry is attempted.
    fn issue(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<SignedLink, SigningError>> + Send + '_>>;
}
