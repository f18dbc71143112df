//! Domain core for the revwiki backend: document model, structural and line
//! diffs, and the snapshot/delta revision store.
//!
//! Nothing here knows about SQL or HTTP. Storage is reached through
//! [`repository::PageRepository`].

pub mod document;
pub mod error;
pub mod flatten;
pub mod json_patch;
pub mod line_diff;
pub mod memory;
pub mod recent_changes;
pub mod repository;
pub mod revision;
pub mod revision_store;
pub mod text_count;
pub mod types;
