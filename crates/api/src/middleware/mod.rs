//! Request extractors guarding the `/api/v1` surface.
//!
//! - [`auth::RequireToken`] -- Requires the configured bearer token, if any.

pub mod auth;
