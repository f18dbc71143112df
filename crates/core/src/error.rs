use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Patch operation {index} failed: {reason}")]
    PatchApplication { index: usize, reason: String },

    #[error("Cannot reconstruct page {page_id} at revision {rev_number}: {reason}")]
    Reconstruction {
        page_id: DbId,
        rev_number: i32,
        reason: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    /// Shorthand for a `NotFound` keyed by anything displayable.
    pub fn not_found(entity: &'static str, key: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}
