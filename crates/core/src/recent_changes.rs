//! Recent-changes feed with per-revision character deltas.

use std::collections::HashMap;

use futures::future::try_join_all;
use serde::Serialize;

use crate::document::empty_document;
use crate::error::CoreError;
use crate::flatten::extract_text;
use crate::json_patch;
use crate::repository::RecentRevisionRow;
use crate::revision::{clamp_limit, clamp_offset, Pagination, DEFAULT_RECENT_LIMIT, MAX_LIST_LIMIT};
use crate::revision_store::RevisionStore;
use crate::text_count::char_delta;
use crate::types::{DbId, Document, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentChange {
    pub revision_id: DbId,
    pub page_id: DbId,
    pub title: String,
    /// Display name of the author, when known.
    pub modifier: Option<String>,
    pub edited_at: Timestamp,
    pub rev_number: i32,
    pub added_count: usize,
    pub removed_count: usize,
    /// `min(added, removed)`: an estimate of replaced characters.
    pub modified_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentChanges {
    pub changes: Vec<RecentChange>,
    pub pagination: Pagination,
}

impl RevisionStore {
    /// The most recent revisions across all pages, newest first, each with
    /// the character delta against its predecessor.
    pub async fn recent_changes(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<RecentChanges, CoreError> {
        let limit = clamp_limit(limit, DEFAULT_RECENT_LIMIT, MAX_LIST_LIMIT);
        let offset = clamp_offset(offset);

        let repo = self.repository();
        let rows = repo.list_recent_revisions(limit, offset).await?;
        let total = repo.count_revisions(None).await?;

        // Each distinct predecessor is reconstructed once, concurrently.
        let mut keys: Vec<(DbId, i32)> = rows
            .iter()
            .filter(|row| row.rev_number > 1)
            .map(|row| (row.page_id, row.rev_number - 1))
            .collect();
        keys.sort_unstable();
        keys.dedup();
        let previous: HashMap<(DbId, i32), Document> =
            try_join_all(keys.into_iter().map(|(page_id, rev_number)| async move {
                let doc = self.reconstruct(page_id, rev_number).await?;
                Ok::<_, CoreError>(((page_id, rev_number), doc))
            }))
            .await?
            .into_iter()
            .collect();

        let mut changes = Vec::with_capacity(rows.len());
        for row in &rows {
            let empty = empty_document();
            let prev = previous
                .get(&(row.page_id, row.rev_number - 1))
                .unwrap_or(&empty);
            let current = self.current_document(row, prev).await?;
            let delta = char_delta(&extract_text(prev), &extract_text(&current));
            changes.push(RecentChange {
                revision_id: row.revision_id,
                page_id: row.page_id,
                title: row.title.clone(),
                modifier: row.author_name.clone(),
                edited_at: row.created_at,
                rev_number: row.rev_number,
                added_count: delta.added,
                removed_count: delta.removed,
                modified_count: delta.replacements,
            });
        }

        tracing::debug!(count = changes.len(), limit, offset, "Recent changes assembled");
        Ok(RecentChanges {
            pagination: Pagination::new(total, limit, offset, changes.len()),
            changes,
        })
    }

    /// Document at `row`: its snapshot content, or its diff applied to `prev`.
    /// Falls back to a full reconstruction if the diff does not apply.
    async fn current_document(
        &self,
        row: &RecentRevisionRow,
        prev: &Document,
    ) -> Result<Document, CoreError> {
        if let Some(content) = &row.content {
            return Ok(content.clone());
        }
        let Some(diff) = &row.diff else {
            return Ok(prev.clone());
        };
        match json_patch::apply(prev, diff, true) {
            Ok(doc) => Ok(doc),
            Err(err) => {
                tracing::warn!(
                    page_id = row.page_id,
                    rev_number = row.rev_number,
                    error = %err,
                    "Stored diff does not apply to predecessor, reconstructing",
                );
                self.reconstruct(row.page_id, row.rev_number).await
            }
        }
    }
}
