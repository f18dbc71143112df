//! Page rows.

use revwiki_core::repository::{PageListItem, PageRecord};
use revwiki_core::types::{DbId, Document, Timestamp};
use sqlx::FromRow;

/// A row from the `pages` table.
#[derive(Debug, Clone, FromRow)]
pub struct Page {
    pub id: DbId,
    pub title: String,
    pub current_rev_id: Option<DbId>,
    pub current_rev_number: i32,
    pub content: Option<Document>,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<Page> for PageRecord {
    fn from(row: Page) -> Self {
        Self {
            id: row.id,
            title: row.title,
            current_rev_id: row.current_rev_id,
            current_rev_number: row.current_rev_number,
            content: row.content,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Lightweight page row for recency listings.
#[derive(Debug, Clone, FromRow)]
pub struct PageSummary {
    pub id: DbId,
    pub title: String,
    pub current_rev_number: i32,
    pub updated_at: Timestamp,
}

impl From<PageSummary> for PageListItem {
    fn from(row: PageSummary) -> Self {
        Self {
            id: row.id,
            title: row.title,
            current_rev_number: row.current_rev_number,
            updated_at: row.updated_at,
        }
    }
}
