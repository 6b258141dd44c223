//! Object storage link issuers.
//!
//! The [`backend::LinkIssuer`] trait abstracts over which provider signs
//! download links.  [`aws::S3LinkIssuer`] is the only implementation.

pub mod aws;
pub mod backend;
