/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// A stored document: the JSON tree exactly as the editor submitted it.
///
/// Structural patches address this tree with JSON pointers, so it stays an
/// untyped value; [`crate::document::Node`] is the typed read-only view.
pub type Document = serde_json::Value;
