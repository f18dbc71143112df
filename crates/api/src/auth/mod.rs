//! Authentication primitives.
//!
//! - [`jwt`] -- HS256 access-token validation.

pub mod jwt;
