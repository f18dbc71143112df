//! Request extractors.
//!
//! - [`auth::AuthUser`] -- the author identity from a JWT Bearer token.

pub mod auth;
