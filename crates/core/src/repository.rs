//! Persistence collaborator contract.
//!
//! The revision store only talks to storage through [`PageRepository`].
//! `revwiki_db::PgRepository` implements it on PostgreSQL and
//! [`crate::memory::MemoryRepository`] in memory.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CoreError;
use crate::json_patch::Patch;
use crate::types::{DbId, Document, Timestamp};

/// A page row. `content` caches the fully materialized head revision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageRecord {
    pub id: DbId,
    pub title: String,
    /// Id of the head revision; `None` until the first save commits.
    pub current_rev_id: Option<DbId>,
    /// `rev_number` of the head revision; 0 while the page has none.
    pub current_rev_number: i32,
    #[serde(skip)]
    pub content: Option<Document>,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A revision row: either a snapshot (`content`) or a delta (`diff` against
/// `base_rev`). Snapshots also keep the diff from their predecessor.
#[derive(Debug, Clone, PartialEq)]
pub struct RevisionRecord {
    pub id: DbId,
    pub page_id: DbId,
    pub rev_number: i32,
    pub is_snapshot: bool,
    pub content: Option<Document>,
    pub diff: Option<Patch>,
    pub base_rev: Option<DbId>,
    pub summary: Option<String>,
    pub author_id: Option<DbId>,
    pub created_at: Timestamp,
}

/// Insert payload for [`PageRepository::commit_revision`].
#[derive(Debug, Clone)]
pub struct NewRevision {
    pub page_id: DbId,
    pub rev_number: i32,
    pub is_snapshot: bool,
    pub content: Option<Document>,
    pub diff: Patch,
    pub base_rev: Option<DbId>,
    pub summary: Option<String>,
    pub author_id: DbId,
}

/// History listing entry (no document payload).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevisionMeta {
    pub id: DbId,
    pub page_id: DbId,
    pub rev_number: i32,
    pub is_snapshot: bool,
    pub summary: Option<String>,
    pub author_id: Option<DbId>,
    pub author_name: Option<String>,
    pub created_at: Timestamp,
}

/// Recent-changes listing entry, joined with page title and author name.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentRevisionRow {
    pub revision_id: DbId,
    pub page_id: DbId,
    pub title: String,
    pub rev_number: i32,
    pub is_snapshot: bool,
    pub content: Option<Document>,
    pub diff: Option<Patch>,
    pub author_name: Option<String>,
    pub created_at: Timestamp,
}

/// Recently updated page entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageListItem {
    pub id: DbId,
    pub title: String,
    pub current_rev_number: i32,
    pub updated_at: Timestamp,
}

/// Transactional page/revision storage.
///
/// Every method may fail with [`CoreError::Storage`]. Listing methods return
/// rows newest first, breaking timestamp ties by descending id.
#[async_trait]
pub trait PageRepository: Send + Sync {
    /// Cheap connectivity probe.
    async fn health_check(&self) -> Result<(), CoreError>;

    async fn find_page_by_title(&self, title: &str) -> Result<Option<PageRecord>, CoreError>;

    async fn find_page_by_id(&self, id: DbId) -> Result<Option<PageRecord>, CoreError>;

    /// Create an empty page. Fails with [`CoreError::Conflict`] when the
    /// title is taken.
    async fn insert_page(&self, title: &str, created_by: DbId) -> Result<PageRecord, CoreError>;

    async fn find_revision_by_id(&self, id: DbId) -> Result<Option<RevisionRecord>, CoreError>;

    /// Revision with the highest `rev_number` for the page.
    async fn find_latest_revision(&self, page_id: DbId)
        -> Result<Option<RevisionRecord>, CoreError>;

    /// Insert `revision` and advance the page head to it (with `materialized`
    /// as the cached content) in one transaction.
    ///
    /// Fails with [`CoreError::Conflict`] when the page head is no longer
    /// `expected_current_rev` or `(page_id, rev_number)` already exists.
    async fn commit_revision(
        &self,
        revision: &NewRevision,
        expected_current_rev: Option<DbId>,
        materialized: &Document,
    ) -> Result<RevisionRecord, CoreError>;

    /// Overwrite the page head and cached content unconditionally.
    async fn update_page_head(
        &self,
        page_id: DbId,
        current_rev_id: Option<DbId>,
        current_rev_number: i32,
        content: Option<&Document>,
    ) -> Result<(), CoreError>;

    /// Snapshot with the largest `rev_number <= rev_number`.
    async fn find_latest_snapshot_at_or_before(
        &self,
        page_id: DbId,
        rev_number: i32,
    ) -> Result<Option<RevisionRecord>, CoreError>;

    /// Revisions with `after < rev_number <= upto`, ascending.
    async fn find_deltas_in_range(
        &self,
        page_id: DbId,
        after: i32,
        upto: i32,
    ) -> Result<Vec<RevisionRecord>, CoreError>;

    /// One page's history, highest `rev_number` first.
    async fn list_page_revisions(
        &self,
        page_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RevisionMeta>, CoreError>;

    /// Revisions of one page, or of all pages when `page_id` is `None`.
    async fn count_revisions(&self, page_id: Option<DbId>) -> Result<i64, CoreError>;

    async fn list_recent_revisions(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RecentRevisionRow>, CoreError>;

    async fn list_recent_pages(&self, limit: i64, offset: i64)
        -> Result<Vec<PageListItem>, CoreError>;

    async fn count_pages(&self) -> Result<i64, CoreError>;
}
