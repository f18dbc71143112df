//! Repository for the `pages` table.

use revwiki_core::types::{DbId, Document};
use sqlx::PgExecutor;

use crate::models::page::{Page, PageSummary};

/// Column list for pages queries.
const COLUMNS: &str = "id, title, current_rev_id, current_rev_number, content, created_by, \
                       created_at, updated_at";

pub struct PageRepo;

impl PageRepo {
    pub async fn find_by_title<'e>(
        executor: impl PgExecutor<'e>,
        title: &str,
    ) -> Result<Option<Page>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM pages WHERE title = $1");
        sqlx::query_as::<_, Page>(&query)
            .bind(title)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<Page>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM pages WHERE id = $1");
        sqlx::query_as::<_, Page>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Insert an empty page. Duplicate titles violate `uq_pages_title`.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        title: &str,
        created_by: DbId,
    ) -> Result<Page, sqlx::Error> {
        let query = format!(
            "INSERT INTO pages (title, created_by)
             VALUES ($1, $2)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Page>(&query)
            .bind(title)
            .bind(created_by)
            .fetch_one(executor)
            .await
    }

    /// Move the head to `rev_id` only if it is still `expected`.
    /// Returns `false` when another writer got there first.
    pub async fn advance_head<'e>(
        executor: impl PgExecutor<'e>,
        page_id: DbId,
        expected: Option<DbId>,
        rev_id: DbId,
        rev_number: i32,
        content: &Document,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE pages
             SET current_rev_id = $3, current_rev_number = $4, content = $5, updated_at = now()
             WHERE id = $1 AND current_rev_id IS NOT DISTINCT FROM $2",
        )
        .bind(page_id)
        .bind(expected)
        .bind(rev_id)
        .bind(rev_number)
        .bind(content)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Overwrite the head unconditionally. Returns `false` if the page is gone.
    pub async fn set_head<'e>(
        executor: impl PgExecutor<'e>,
        page_id: DbId,
        rev_id: Option<DbId>,
        rev_number: i32,
        content: Option<&Document>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE pages
             SET current_rev_id = $2, current_rev_number = $3, content = $4, updated_at = now()
             WHERE id = $1",
        )
        .bind(page_id)
        .bind(rev_id)
        .bind(rev_number)
        .bind(content)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Pages with at least one revision, most recently updated first.
    pub async fn list_recent<'e>(
        executor: impl PgExecutor<'e>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PageSummary>, sqlx::Error> {
        sqlx::query_as::<_, PageSummary>(
            "SELECT id, title, current_rev_number, updated_at FROM pages
             WHERE current_rev_id IS NOT NULL
             ORDER BY updated_at DESC, id DESC
             LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await
    }

    pub async fn count_with_revisions<'e>(
        executor: impl PgExecutor<'e>,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM pages WHERE current_rev_id IS NOT NULL")
                .fetch_one(executor)
                .await?;
        Ok(count)
    }
}
