//! In-memory [`PageRepository`] for tests and database-less development.
//!
//! One `RwLock` guards the whole state, so every method (and in particular
//! `commit_revision`) is atomic with respect to the others.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::repository::{
    NewRevision, PageListItem, PageRecord, PageRepository, RecentRevisionRow, RevisionMeta,
    RevisionRecord,
};
use crate::types::{DbId, Document};

#[derive(Debug, Default)]
struct State {
    pages: Vec<PageRecord>,
    revisions: Vec<RevisionRecord>,
    users: HashMap<DbId, String>,
    next_page_id: DbId,
    next_revision_id: DbId,
}

impl State {
    fn page_mut(&mut self, id: DbId) -> Option<&mut PageRecord> {
        self.pages.iter_mut().find(|p| p.id == id)
    }

    fn page_revisions(&self, page_id: DbId) -> impl Iterator<Item = &RevisionRecord> {
        self.revisions.iter().filter(move |r| r.page_id == page_id)
    }
}

#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a display name for an author id.
    pub async fn insert_user(&self, id: DbId, display_name: impl Into<String>) {
        self.state.write().await.users.insert(id, display_name.into());
    }
}

fn page_window<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    let offset = usize::try_from(offset).unwrap_or(0);
    let limit = usize::try_from(limit).unwrap_or(0);
    items.into_iter().skip(offset).take(limit).collect()
}

#[async_trait]
impl PageRepository for MemoryRepository {
    async fn health_check(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn find_page_by_title(&self, title: &str) -> Result<Option<PageRecord>, CoreError> {
        let state = self.state.read().await;
        Ok(state.pages.iter().find(|p| p.title == title).cloned())
    }

    async fn find_page_by_id(&self, id: DbId) -> Result<Option<PageRecord>, CoreError> {
        let state = self.state.read().await;
        Ok(state.pages.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_page(&self, title: &str, created_by: DbId) -> Result<PageRecord, CoreError> {
        let mut state = self.state.write().await;
        if state.pages.iter().any(|p| p.title == title) {
            return Err(CoreError::Conflict(format!(
                "A page titled '{title}' already exists"
            )));
        }
        state.next_page_id += 1;
        let now = Utc::now();
        let page = PageRecord {
            id: state.next_page_id,
            title: title.to_string(),
            current_rev_id: None,
            current_rev_number: 0,
            content: None,
            created_by: Some(created_by),
            created_at: now,
            updated_at: now,
        };
        state.pages.push(page.clone());
        Ok(page)
    }

    async fn find_revision_by_id(&self, id: DbId) -> Result<Option<RevisionRecord>, CoreError> {
        let state = self.state.read().await;
        Ok(state.revisions.iter().find(|r| r.id == id).cloned())
    }

    async fn find_latest_revision(
        &self,
        page_id: DbId,
    ) -> Result<Option<RevisionRecord>, CoreError> {
        let state = self.state.read().await;
        let latest = state
            .page_revisions(page_id)
            .max_by_key(|r| r.rev_number)
            .cloned();
        Ok(latest)
    }

    async fn commit_revision(
        &self,
        revision: &NewRevision,
        expected_current_rev: Option<DbId>,
        materialized: &Document,
    ) -> Result<RevisionRecord, CoreError> {
        let mut state = self.state.write().await;

        let head = state
            .pages
            .iter()
            .find(|p| p.id == revision.page_id)
            .map(|p| p.current_rev_id)
            .ok_or_else(|| CoreError::not_found("page", revision.page_id))?;
        if head != expected_current_rev {
            return Err(CoreError::Conflict(format!(
                "Page {} head moved from {expected_current_rev:?} to {head:?}",
                revision.page_id
            )));
        }
        if state
            .page_revisions(revision.page_id)
            .any(|r| r.rev_number == revision.rev_number)
        {
            return Err(CoreError::Conflict(format!(
                "Revision {} of page {} already exists",
                revision.rev_number, revision.page_id
            )));
        }

        state.next_revision_id += 1;
        let now = Utc::now();
        let record = RevisionRecord {
            id: state.next_revision_id,
            page_id: revision.page_id,
            rev_number: revision.rev_number,
            is_snapshot: revision.is_snapshot,
            content: revision.content.clone(),
            diff: Some(revision.diff.clone()),
            base_rev: revision.base_rev,
            summary: revision.summary.clone(),
            author_id: Some(revision.author_id),
            created_at: now,
        };
        state.revisions.push(record.clone());

        if let Some(page) = state.page_mut(revision.page_id) {
            page.current_rev_id = Some(record.id);
            page.current_rev_number = record.rev_number;
            page.content = Some(materialized.clone());
            page.updated_at = now;
        }
        Ok(record)
    }

    async fn update_page_head(
        &self,
        page_id: DbId,
        current_rev_id: Option<DbId>,
        current_rev_number: i32,
        content: Option<&Document>,
    ) -> Result<(), CoreError> {
        let mut state = self.state.write().await;
        let page = state
            .page_mut(page_id)
            .ok_or_else(|| CoreError::not_found("page", page_id))?;
        page.current_rev_id = current_rev_id;
        page.current_rev_number = current_rev_number;
        page.content = content.cloned();
        page.updated_at = Utc::now();
        Ok(())
    }

    async fn find_latest_snapshot_at_or_before(
        &self,
        page_id: DbId,
        rev_number: i32,
    ) -> Result<Option<RevisionRecord>, CoreError> {
        let state = self.state.read().await;
        let snapshot = state
            .page_revisions(page_id)
            .filter(|r| r.is_snapshot && r.rev_number <= rev_number)
            .max_by_key(|r| r.rev_number)
            .cloned();
        Ok(snapshot)
    }

    async fn find_deltas_in_range(
        &self,
        page_id: DbId,
        after: i32,
        upto: i32,
    ) -> Result<Vec<RevisionRecord>, CoreError> {
        let state = self.state.read().await;
        let mut deltas: Vec<RevisionRecord> = state
            .page_revisions(page_id)
            .filter(|r| r.rev_number > after && r.rev_number <= upto)
            .cloned()
            .collect();
        deltas.sort_by_key(|r| r.rev_number);
        Ok(deltas)
    }

    async fn list_page_revisions(
        &self,
        page_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RevisionMeta>, CoreError> {
        let state = self.state.read().await;
        let mut metas: Vec<RevisionMeta> = state
            .page_revisions(page_id)
            .map(|r| RevisionMeta {
                id: r.id,
                page_id: r.page_id,
                rev_number: r.rev_number,
                is_snapshot: r.is_snapshot,
                summary: r.summary.clone(),
                author_id: r.author_id,
                author_name: r.author_id.and_then(|id| state.users.get(&id).cloned()),
                created_at: r.created_at,
            })
            .collect();
        metas.sort_by(|a, b| b.rev_number.cmp(&a.rev_number));
        Ok(page_window(metas, limit, offset))
    }

    async fn count_revisions(&self, page_id: Option<DbId>) -> Result<i64, CoreError> {
        let state = self.state.read().await;
        let count = match page_id {
            Some(id) => state.page_revisions(id).count(),
            None => state.revisions.len(),
        };
        Ok(count as i64)
    }

    async fn list_recent_revisions(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RecentRevisionRow>, CoreError> {
        let state = self.state.read().await;
        let mut ordered: Vec<&RevisionRecord> = state.revisions.iter().collect();
        ordered.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let rows = ordered
            .into_iter()
            .filter_map(|r| {
                let page = state.pages.iter().find(|p| p.id == r.page_id)?;
                Some(RecentRevisionRow {
                    revision_id: r.id,
                    page_id: r.page_id,
                    title: page.title.clone(),
                    rev_number: r.rev_number,
                    is_snapshot: r.is_snapshot,
                    content: r.content.clone(),
                    diff: r.diff.clone(),
                    author_name: r.author_id.and_then(|id| state.users.get(&id).cloned()),
                    created_at: r.created_at,
                })
            })
            .collect();
        Ok(page_window(rows, limit, offset))
    }

    async fn list_recent_pages(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PageListItem>, CoreError> {
        let state = self.state.read().await;
        let mut pages: Vec<&PageRecord> = state
            .pages
            .iter()
            .filter(|p| p.current_rev_id.is_some())
            .collect();
        pages.sort_by(|a, b| (b.updated_at, b.id).cmp(&(a.updated_at, a.id)));
        let items = pages
            .into_iter()
            .map(|p| PageListItem {
                id: p.id,
                title: p.title.clone(),
                current_rev_number: p.current_rev_number,
                updated_at: p.updated_at,
            })
            .collect();
        Ok(page_window(items, limit, offset))
    }

    async fn count_pages(&self) -> Result<i64, CoreError> {
        let state = self.state.read().await;
        Ok(state
            .pages
            .iter()
            .filter(|p| p.current_rev_id.is_some())
            .count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn new_revision(page_id: DbId, rev_number: i32) -> NewRevision {
        NewRevision {
            page_id,
            rev_number,
            is_snapshot: rev_number == 1,
            content: (rev_number == 1).then(|| json!({"type": "doc", "content": []})),
            diff: Vec::new(),
            base_rev: None,
            summary: None,
            author_id: 7,
        }
    }

    #[tokio::test]
    async fn insert_page_rejects_duplicate_titles() {
        let repo = MemoryRepository::new();
        repo.insert_page("Home", 1).await.unwrap();
        assert_matches!(repo.insert_page("Home", 2).await, Err(CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn commit_advances_the_page_head() {
        let repo = MemoryRepository::new();
        let page = repo.insert_page("Home", 1).await.unwrap();
        let doc = json!({"type": "doc", "content": []});
        let rev = repo
            .commit_revision(&new_revision(page.id, 1), None, &doc)
            .await
            .unwrap();

        let page = repo.find_page_by_id(page.id).await.unwrap().unwrap();
        assert_eq!(page.current_rev_id, Some(rev.id));
        assert_eq!(page.current_rev_number, 1);
        assert_eq!(page.content, Some(doc));
    }

    #[tokio::test]
    async fn commit_rejects_stale_head() {
        let repo = MemoryRepository::new();
        let page = repo.insert_page("Home", 1).await.unwrap();
        let doc = json!({});
        let first = repo
            .commit_revision(&new_revision(page.id, 1), None, &doc)
            .await
            .unwrap();

        // A second writer that still believes the page is empty.
        let stale = repo.commit_revision(&new_revision(page.id, 2), None, &doc).await;
        assert_matches!(stale, Err(CoreError::Conflict(_)));

        // Same rev number against the right head is also refused.
        let duplicate = repo
            .commit_revision(&new_revision(page.id, 1), Some(first.id), &doc)
            .await;
        assert_matches!(duplicate, Err(CoreError::Conflict(_)));
        assert_eq!(repo.count_revisions(Some(page.id)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn latest_revision_lookups_follow_the_head() {
        let repo = MemoryRepository::new();
        let page = repo.insert_page("Home", 1).await.unwrap();
        let other = repo.insert_page("Other", 1).await.unwrap();
        assert!(repo.find_latest_revision(page.id).await.unwrap().is_none());
        assert!(repo
            .find_latest_snapshot_at_or_before(page.id, 5)
            .await
            .unwrap()
            .is_none());

        let doc = json!({});
        let first = repo.commit_revision(&new_revision(page.id, 1), None, &doc).await.unwrap();
        let second = repo
            .commit_revision(&new_revision(page.id, 2), Some(first.id), &doc)
            .await
            .unwrap();
        repo.commit_revision(&new_revision(other.id, 1), None, &doc).await.unwrap();

        let latest = repo.find_latest_revision(page.id).await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        let snap = repo
            .find_latest_snapshot_at_or_before(page.id, 2)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snap.id, first.id);
    }

    #[tokio::test]
    async fn recent_revisions_are_newest_first_with_author_names() {
        let repo = MemoryRepository::new();
        repo.insert_user(7, "alice").await;
        let a = repo.insert_page("A", 7).await.unwrap();
        let b = repo.insert_page("B", 7).await.unwrap();
        let doc = json!({});
        let ra = repo.commit_revision(&new_revision(a.id, 1), None, &doc).await.unwrap();
        let rb = repo.commit_revision(&new_revision(b.id, 1), None, &doc).await.unwrap();

        let rows = repo.list_recent_revisions(10, 0).await.unwrap();
        let ids: Vec<DbId> = rows.iter().map(|r| r.revision_id).collect();
        assert_eq!(ids, vec![rb.id, ra.id]);
        assert_eq!(rows[0].title, "B");
        assert_eq!(rows[0].author_name.as_deref(), Some("alice"));

        let second_page = repo.list_recent_revisions(1, 1).await.unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].revision_id, ra.id);
    }

    #[tokio::test]
    async fn snapshot_and_delta_range_queries() {
        let repo = MemoryRepository::new();
        let page = repo.insert_page("Home", 1).await.unwrap();
        let doc = json!({});
        let mut head = None;
        for n in 1..=4 {
            let mut rev = new_revision(page.id, n);
            rev.is_snapshot = n == 1 || n == 3;
            let record = repo.commit_revision(&rev, head, &doc).await.unwrap();
            head = Some(record.id);
        }

        let snap = repo
            .find_latest_snapshot_at_or_before(page.id, 4)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snap.rev_number, 3);
        let snap = repo
            .find_latest_snapshot_at_or_before(page.id, 2)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snap.rev_number, 1);

        let deltas = repo.find_deltas_in_range(page.id, 1, 3).await.unwrap();
        let numbers: Vec<i32> = deltas.iter().map(|r| r.rev_number).collect();
        assert_eq!(numbers, vec![2, 3]);
    }
}
