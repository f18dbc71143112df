//! [`PageRepository`] backed by PostgreSQL.

use async_trait::async_trait;
use revwiki_core::error::CoreError;
use revwiki_core::repository::{
    NewRevision, PageListItem, PageRecord, PageRepository, RecentRevisionRow, RevisionMeta,
    RevisionRecord,
};
use revwiki_core::types::{DbId, Document};

use crate::repositories::{PageRepo, RevisionRepo};
use crate::DbPool;

#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: DbPool,
}

impl PgRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Map a sqlx error into the core taxonomy.
///
/// Unique violations on `uq_` constraints become [`CoreError::Conflict`];
/// everything else is [`CoreError::Storage`].
fn map_db_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            let constraint = db_err.constraint().unwrap_or("unknown");
            if constraint.starts_with("uq_") {
                return CoreError::Conflict(format!(
                    "Duplicate value violates unique constraint: {constraint}"
                ));
            }
        }
    }
    CoreError::Storage(err.to_string())
}

#[async_trait]
impl PageRepository for PgRepository {
    async fn health_check(&self) -> Result<(), CoreError> {
        crate::health_check(&self.pool).await.map_err(map_db_error)
    }

    async fn find_page_by_title(&self, title: &str) -> Result<Option<PageRecord>, CoreError> {
        let page = PageRepo::find_by_title(&self.pool, title)
            .await
            .map_err(map_db_error)?;
        Ok(page.map(Into::into))
    }

    async fn find_page_by_id(&self, id: DbId) -> Result<Option<PageRecord>, CoreError> {
        let page = PageRepo::find_by_id(&self.pool, id)
            .await
            .map_err(map_db_error)?;
        Ok(page.map(Into::into))
    }

    async fn insert_page(&self, title: &str, created_by: DbId) -> Result<PageRecord, CoreError> {
        let page = PageRepo::create(&self.pool, title, created_by)
            .await
            .map_err(map_db_error)?;
        Ok(page.into())
    }

    async fn find_revision_by_id(&self, id: DbId) -> Result<Option<RevisionRecord>, CoreError> {
        let rev = RevisionRepo::find_by_id(&self.pool, id)
            .await
            .map_err(map_db_error)?;
        Ok(rev.map(Into::into))
    }

    async fn find_latest_revision(
        &self,
        page_id: DbId,
    ) -> Result<Option<RevisionRecord>, CoreError> {
        let rev = RevisionRepo::find_latest(&self.pool, page_id)
            .await
            .map_err(map_db_error)?;
        Ok(rev.map(Into::into))
    }

    async fn commit_revision(
        &self,
        revision: &NewRevision,
        expected_current_rev: Option<DbId>,
        materialized: &Document,
    ) -> Result<RevisionRecord, CoreError> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let inserted = RevisionRepo::create(&mut *tx, revision)
            .await
            .map_err(map_db_error)?;

        let advanced = PageRepo::advance_head(
            &mut *tx,
            revision.page_id,
            expected_current_rev,
            inserted.id,
            inserted.rev_number,
            materialized,
        )
        .await
        .map_err(map_db_error)?;

        if !advanced {
            tx.rollback().await.map_err(map_db_error)?;
            tracing::debug!(
                page_id = revision.page_id,
                rev_number = revision.rev_number,
                "Page head moved during commit",
            );
            return Err(CoreError::Conflict(format!(
                "Page {} was modified concurrently",
                revision.page_id
            )));
        }

        tx.commit().await.map_err(map_db_error)?;
        Ok(inserted.into())
    }

    async fn update_page_head(
        &self,
        page_id: DbId,
        current_rev_id: Option<DbId>,
        current_rev_number: i32,
        content: Option<&Document>,
    ) -> Result<(), CoreError> {
        let updated =
            PageRepo::set_head(&self.pool, page_id, current_rev_id, current_rev_number, content)
                .await
                .map_err(map_db_error)?;
        if updated {
            Ok(())
        } else {
            Err(CoreError::not_found("Page", page_id))
        }
    }

    async fn find_latest_snapshot_at_or_before(
        &self,
        page_id: DbId,
        rev_number: i32,
    ) -> Result<Option<RevisionRecord>, CoreError> {
        let rev = RevisionRepo::find_latest_snapshot_at_or_before(&self.pool, page_id, rev_number)
            .await
            .map_err(map_db_error)?;
        Ok(rev.map(Into::into))
    }

    async fn find_deltas_in_range(
        &self,
        page_id: DbId,
        after: i32,
        upto: i32,
    ) -> Result<Vec<RevisionRecord>, CoreError> {
        let revs = RevisionRepo::list_in_range(&self.pool, page_id, after, upto)
            .await
            .map_err(map_db_error)?;
        Ok(revs.into_iter().map(Into::into).collect())
    }

    async fn list_page_revisions(
        &self,
        page_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RevisionMeta>, CoreError> {
        let rows = RevisionRepo::list_by_page(&self.pool, page_id, limit, offset)
            .await
            .map_err(map_db_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_revisions(&self, page_id: Option<DbId>) -> Result<i64, CoreError> {
        RevisionRepo::count(&self.pool, page_id)
            .await
            .map_err(map_db_error)
    }

    async fn list_recent_revisions(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RecentRevisionRow>, CoreError> {
        let rows = RevisionRepo::list_recent(&self.pool, limit, offset)
            .await
            .map_err(map_db_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_recent_pages(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PageListItem>, CoreError> {
        let rows = PageRepo::list_recent(&self.pool, limit, offset)
            .await
            .map_err(map_db_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_pages(&self) -> Result<i64, CoreError> {
        PageRepo::count_with_revisions(&self.pool)
            .await
            .map_err(map_db_error)
    }
}
