//! Revision rows. `diff` is stored as a JSONB array of patch operations.

use revwiki_core::json_patch::Patch;
use revwiki_core::repository::{RecentRevisionRow, RevisionMeta, RevisionRecord};
use revwiki_core::types::{DbId, Document, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `revisions` table.
#[derive(Debug, Clone, FromRow)]
pub struct Revision {
    pub id: DbId,
    pub page_id: DbId,
    pub rev_number: i32,
    pub is_snapshot: bool,
    pub content: Option<Document>,
    pub diff: Option<Json<Patch>>,
    pub base_rev: Option<DbId>,
    pub summary: Option<String>,
    pub author_id: Option<DbId>,
    pub created_at: Timestamp,
}

impl From<Revision> for RevisionRecord {
    fn from(row: Revision) -> Self {
        Self {
            id: row.id,
            page_id: row.page_id,
            rev_number: row.rev_number,
            is_snapshot: row.is_snapshot,
            content: row.content,
            diff: row.diff.map(|Json(patch)| patch),
            base_rev: row.base_rev,
            summary: row.summary,
            author_id: row.author_id,
            created_at: row.created_at,
        }
    }
}

/// History row joined with the author's display name.
#[derive(Debug, Clone, FromRow)]
pub struct RevisionHistoryRow {
    pub id: DbId,
    pub page_id: DbId,
    pub rev_number: i32,
    pub is_snapshot: bool,
    pub summary: Option<String>,
    pub author_id: Option<DbId>,
    pub author_name: Option<String>,
    pub created_at: Timestamp,
}

impl From<RevisionHistoryRow> for RevisionMeta {
    fn from(row: RevisionHistoryRow) -> Self {
        Self {
            id: row.id,
            page_id: row.page_id,
            rev_number: row.rev_number,
            is_snapshot: row.is_snapshot,
            summary: row.summary,
            author_id: row.author_id,
            author_name: row.author_name,
            created_at: row.created_at,
        }
    }
}

/// Recent-changes row joined with page title and author display name.
#[derive(Debug, Clone, FromRow)]
pub struct RecentRevision {
    pub revision_id: DbId,
    pub page_id: DbId,
    pub title: String,
    pub rev_number: i32,
    pub is_snapshot: bool,
    pub content: Option<Document>,
    pub diff: Option<Json<Patch>>,
    pub author_name: Option<String>,
    pub created_at: Timestamp,
}

impl From<RecentRevision> for RecentRevisionRow {
    fn from(row: RecentRevision) -> Self {
        Self {
            revision_id: row.revision_id,
            page_id: row.page_id,
            title: row.title,
            rev_number: row.rev_number,
            is_snapshot: row.is_snapshot,
            content: row.content,
            diff: row.diff.map(|Json(patch)| patch),
            author_name: row.author_name,
            created_at: row.created_at,
        }
    }
}
