//! Snapshot/delta revision store.
//!
//! Every save stores the structural diff from the previous head. Revision 1
//! and every `snapshot_threshold`-th revision additionally store the full
//! document, so reading any revision replays at most `snapshot_threshold - 1`
//! patches from the nearest snapshot at or before it.

use std::sync::Arc;

use serde::Serialize;

use crate::document::empty_document;
use crate::error::CoreError;
use crate::json_patch::{self, PatchSummary};
use crate::line_diff::{diff_documents, DocumentDiff, DocumentDiffOptions};
use crate::repository::{
    NewRevision, PageListItem, PageRecord, PageRepository, RevisionMeta, RevisionRecord,
};
use crate::revision::{
    clamp_limit, clamp_offset, is_snapshot, validate_content, validate_title, Pagination,
    RevSelector, DEFAULT_MAX_SAVE_ATTEMPTS, DEFAULT_SNAPSHOT_THRESHOLD, MAX_LIST_LIMIT,
};
use crate::types::{DbId, Document, Timestamp};

/// Default page size for history and page listings.
const DEFAULT_LIST_LIMIT: i64 = 20;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevisionStoreConfig {
    /// Store a full snapshot every this many revisions. Must be >= 1.
    pub snapshot_threshold: i32,
    /// Read-diff-commit attempts per save before a conflict is surfaced.
    pub max_save_attempts: u32,
}

impl Default for RevisionStoreConfig {
    fn default() -> Self {
        Self {
            snapshot_threshold: DEFAULT_SNAPSHOT_THRESHOLD,
            max_save_attempts: DEFAULT_MAX_SAVE_ATTEMPTS,
        }
    }
}

impl RevisionStoreConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.snapshot_threshold < 1 {
            return Err(CoreError::Validation(format!(
                "snapshot_threshold must be at least 1, got {}",
                self.snapshot_threshold
            )));
        }
        if self.max_save_attempts < 1 {
            return Err(CoreError::Validation(
                "max_save_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Requests and views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SavePage {
    pub title: String,
    pub content: Document,
    pub summary: Option<String>,
    /// Verified identity of the caller.
    pub author_id: DbId,
    /// Also return a line diff and unified patch against the previous head.
    pub with_line_diff: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveOutcome {
    pub page_id: DbId,
    pub revision_id: DbId,
    pub rev_number: i32,
    pub is_snapshot: bool,
    /// Structural summary of the stored diff against the previous head.
    pub patch_summary: PatchSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_diff: Option<DocumentDiff>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub page_id: DbId,
    pub title: String,
    pub revision_id: DbId,
    pub rev_number: i32,
    pub content: Document,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevisionView {
    pub revision_id: DbId,
    pub page_id: DbId,
    pub title: String,
    pub rev_number: i32,
    pub is_snapshot: bool,
    pub summary: Option<String>,
    pub author_id: Option<DbId>,
    pub created_at: Timestamp,
    pub content: Document,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevisionHistory {
    pub page_id: DbId,
    pub title: String,
    pub revisions: Vec<RevisionMeta>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone)]
pub struct DiffRequest {
    pub title: String,
    pub left: RevSelector,
    pub right: RevSelector,
    /// Context lines kept around changes; `None` disables clipping.
    pub context: Option<usize>,
    pub with_patch: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiffView {
    pub page_id: DbId,
    pub title: String,
    pub left_rev: i32,
    pub right_rev: i32,
    #[serde(flatten)]
    pub diff: DocumentDiff,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentPages {
    pub pages: Vec<PageListItem>,
    pub pagination: Pagination,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct RevisionStore {
    repo: Arc<dyn PageRepository>,
    config: RevisionStoreConfig,
}

impl RevisionStore {
    pub fn new(
        repo: Arc<dyn PageRepository>,
        config: RevisionStoreConfig,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self { repo, config })
    }

    pub fn config(&self) -> &RevisionStoreConfig {
        &self.config
    }

    pub fn repository(&self) -> &Arc<dyn PageRepository> {
        &self.repo
    }

    /// Append a revision for `request.title`, creating the page on first save.
    ///
    /// The whole read-diff-commit cycle is retried when another writer moves
    /// the page head first.
    pub async fn save_page(&self, request: SavePage) -> Result<SaveOutcome, CoreError> {
        let title = validate_title(&request.title)?;
        validate_content(&request.content)?;

        let mut attempt = 1;
        loop {
            match self.try_save(&title, &request).await {
                Err(CoreError::Conflict(reason)) if attempt < self.config.max_save_attempts => {
                    tracing::warn!(
                        title = %title,
                        attempt,
                        %reason,
                        "Concurrent save detected, retrying",
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn try_save(&self, title: &str, request: &SavePage) -> Result<SaveOutcome, CoreError> {
        let page = self.find_or_create_page(title, request.author_id).await?;
        let last = self.repo.find_latest_revision(page.id).await?;

        let base = match &last {
            Some(rev) => Some(self.head_document(&page, rev).await?),
            None => None,
        };
        let prev_rev_number = last.as_ref().map_or(0, |r| r.rev_number);
        let rev_number = prev_rev_number + 1;
        let snapshot = is_snapshot(rev_number, self.config.snapshot_threshold, base.is_some());

        let base_doc = base.unwrap_or_else(empty_document);
        let diff = json_patch::diff(&base_doc, &request.content);
        let patch_summary = json_patch::summarize(&diff, &base_doc);
        let materialized = if snapshot {
            request.content.clone()
        } else {
            json_patch::apply(&base_doc, &diff, true)?
        };

        let new_revision = NewRevision {
            page_id: page.id,
            rev_number,
            is_snapshot: snapshot,
            content: snapshot.then(|| request.content.clone()),
            diff,
            base_rev: if snapshot { None } else { last.as_ref().map(|r| r.id) },
            summary: request
                .summary
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            author_id: request.author_id,
        };
        let record = self
            .repo
            .commit_revision(&new_revision, page.current_rev_id, &materialized)
            .await?;

        tracing::info!(
            page_id = page.id,
            rev_number,
            is_snapshot = snapshot,
            user_id = request.author_id,
            title = %title,
            "Revision committed",
        );

        let line_diff = request.with_line_diff.then(|| {
            let old_label = format!("{title}@{prev_rev_number}");
            let new_label = format!("{title}@{rev_number}");
            diff_documents(
                &base_doc,
                &materialized,
                &DocumentDiffOptions {
                    with_intra_line: true,
                    context: None,
                    with_patch: true,
                    old_label: &old_label,
                    new_label: &new_label,
                },
            )
        });

        Ok(SaveOutcome {
            page_id: page.id,
            revision_id: record.id,
            rev_number,
            is_snapshot: snapshot,
            patch_summary,
            line_diff,
        })
    }

    async fn find_or_create_page(
        &self,
        title: &str,
        author_id: DbId,
    ) -> Result<PageRecord, CoreError> {
        if let Some(page) = self.repo.find_page_by_title(title).await? {
            return Ok(page);
        }
        match self.repo.insert_page(title, author_id).await {
            Ok(page) => Ok(page),
            // Lost a first-save race; the other writer's page is the one to use.
            Err(CoreError::Conflict(_)) => self
                .repo
                .find_page_by_title(title)
                .await?
                .ok_or_else(|| CoreError::not_found("page", title)),
            Err(e) => Err(e),
        }
    }

    /// Full document at `last`, preferring stored or cached content over replay.
    async fn head_document(
        &self,
        page: &PageRecord,
        last: &RevisionRecord,
    ) -> Result<Document, CoreError> {
        if let Some(content) = &last.content {
            return Ok(content.clone());
        }
        if page.current_rev_id == Some(last.id) {
            if let Some(content) = &page.content {
                return Ok(content.clone());
            }
        }
        self.reconstruct(page.id, last.rev_number).await
    }

    /// Materialize revision `target_rev` of a page.
    ///
    /// Starts from the nearest snapshot at or before `target_rev` and applies
    /// each later delta in order. With no snapshot at all (a page without
    /// revisions) the empty document is returned.
    pub async fn reconstruct(&self, page_id: DbId, target_rev: i32) -> Result<Document, CoreError> {
        let Some(snapshot) = self
            .repo
            .find_latest_snapshot_at_or_before(page_id, target_rev)
            .await?
        else {
            tracing::debug!(page_id, rev_number = target_rev, "No snapshot, empty document");
            return Ok(empty_document());
        };

        let corrupt = |rev_number: i32, reason: String| {
            tracing::error!(page_id, rev_number, %reason, "Reconstruction failed");
            CoreError::Reconstruction {
                page_id,
                rev_number,
                reason,
            }
        };

        let mut doc = snapshot
            .content
            .clone()
            .ok_or_else(|| corrupt(snapshot.rev_number, "snapshot has no content".into()))?;
        if snapshot.rev_number == target_rev {
            return Ok(doc);
        }

        let deltas = self
            .repo
            .find_deltas_in_range(page_id, snapshot.rev_number, target_rev)
            .await?;
        tracing::debug!(
            page_id,
            rev_number = target_rev,
            snapshot_rev = snapshot.rev_number,
            deltas = deltas.len(),
            "Reconstructing revision",
        );

        let mut expected = snapshot.rev_number + 1;
        for delta in &deltas {
            if delta.rev_number != expected {
                return Err(corrupt(
                    target_rev,
                    format!("revision {expected} is missing from the history"),
                ));
            }
            doc = match (&delta.content, &delta.diff) {
                (Some(content), _) if delta.is_snapshot => content.clone(),
                (_, Some(diff)) => json_patch::apply(&doc, diff, true)
                    .map_err(|e| corrupt(delta.rev_number, e.to_string()))?,
                (_, None) => {
                    return Err(corrupt(delta.rev_number, "delta has no stored diff".into()))
                }
            };
            expected += 1;
        }
        if expected <= target_rev {
            return Err(corrupt(
                target_rev,
                format!("history ends at revision {}", expected - 1),
            ));
        }
        Ok(doc)
    }

    async fn require_page(&self, title: &str) -> Result<PageRecord, CoreError> {
        let title = validate_title(title)?;
        self.repo
            .find_page_by_title(&title)
            .await?
            .ok_or_else(|| CoreError::not_found("page", title))
    }

    /// Head revision of a page.
    pub async fn get_page(&self, title: &str) -> Result<PageView, CoreError> {
        let page = self.require_page(title).await?;
        let Some(revision_id) = page.current_rev_id else {
            return Err(CoreError::not_found("revision", format!("{}@current", page.title)));
        };
        let content = match page.content.clone() {
            Some(content) => content,
            None => self.reconstruct(page.id, page.current_rev_number).await?,
        };
        Ok(PageView {
            page_id: page.id,
            title: page.title,
            revision_id,
            rev_number: page.current_rev_number,
            content,
            created_at: page.created_at,
            updated_at: page.updated_at,
        })
    }

    pub async fn get_revision(&self, revision_id: DbId) -> Result<RevisionView, CoreError> {
        let revision = self
            .repo
            .find_revision_by_id(revision_id)
            .await?
            .ok_or_else(|| CoreError::not_found("revision", revision_id))?;
        let page = self
            .repo
            .find_page_by_id(revision.page_id)
            .await?
            .ok_or_else(|| CoreError::not_found("page", revision.page_id))?;
        let content = match revision.content.clone() {
            Some(content) => content,
            None => self.reconstruct(page.id, revision.rev_number).await?,
        };
        Ok(RevisionView {
            revision_id: revision.id,
            page_id: page.id,
            title: page.title,
            rev_number: revision.rev_number,
            is_snapshot: revision.is_snapshot,
            summary: revision.summary,
            author_id: revision.author_id,
            created_at: revision.created_at,
            content,
        })
    }

    /// History of a page, newest revision first.
    pub async fn list_revisions(
        &self,
        title: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<RevisionHistory, CoreError> {
        let page = self.require_page(title).await?;
        let limit = clamp_limit(limit, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT);
        let offset = clamp_offset(offset);
        let revisions = self.repo.list_page_revisions(page.id, limit, offset).await?;
        let total = self.repo.count_revisions(Some(page.id)).await?;
        Ok(RevisionHistory {
            page_id: page.id,
            title: page.title,
            pagination: Pagination::new(total, limit, offset, revisions.len()),
            revisions,
        })
    }

    /// Line diff between two revisions of a page.
    pub async fn diff_revisions(&self, request: DiffRequest) -> Result<DiffView, CoreError> {
        let page = self.require_page(&request.title).await?;
        let head = page.current_rev_number;
        if head == 0 {
            return Err(CoreError::not_found("revision", format!("{}@current", page.title)));
        }

        let left = request.left.resolve(head);
        let right = request.right.resolve(head);
        for rev in [left, right] {
            if rev > head {
                return Err(CoreError::not_found("revision", format!("{}@{rev}", page.title)));
            }
        }

        let (old, new) = futures::try_join!(
            self.reconstruct(page.id, left),
            self.reconstruct(page.id, right)
        )?;
        let old_label = format!("{}@{left}", page.title);
        let new_label = format!("{}@{right}", page.title);
        let diff = diff_documents(
            &old,
            &new,
            &DocumentDiffOptions {
                with_intra_line: true,
                context: request.context,
                with_patch: request.with_patch,
                old_label: &old_label,
                new_label: &new_label,
            },
        );

        Ok(DiffView {
            page_id: page.id,
            title: page.title,
            left_rev: left,
            right_rev: right,
            diff,
        })
    }

    /// Recompute a page's head pointer and cached content from its history.
    pub async fn repair_page(&self, page_id: DbId) -> Result<PageRecord, CoreError> {
        let page = self
            .repo
            .find_page_by_id(page_id)
            .await?
            .ok_or_else(|| CoreError::not_found("page", page_id))?;

        match self.repo.find_latest_revision(page.id).await? {
            Some(latest) => {
                let content = self.reconstruct(page.id, latest.rev_number).await?;
                self.repo
                    .update_page_head(page.id, Some(latest.id), latest.rev_number, Some(&content))
                    .await?;
                tracing::info!(page_id, rev_number = latest.rev_number, "Page head repaired");
            }
            None => {
                self.repo.update_page_head(page.id, None, 0, None).await?;
                tracing::info!(page_id, "Page head cleared, no revisions");
            }
        }

        self.repo
            .find_page_by_id(page_id)
            .await?
            .ok_or_else(|| CoreError::not_found("page", page_id))
    }

    /// Pages with at least one revision, most recently updated first.
    pub async fn recent_pages(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<RecentPages, CoreError> {
        let limit = clamp_limit(limit, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT);
        let offset = clamp_offset(offset);
        let pages = self.repo.list_recent_pages(limit, offset).await?;
        let total = self.repo.count_pages().await?;
        Ok(RecentPages {
            pagination: Pagination::new(total, limit, offset, pages.len()),
            pages,
        })
    }
}
