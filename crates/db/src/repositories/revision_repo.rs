//! Repository for the `revisions` table.
//!
//! Revisions are append-only: there is no update or delete here.

use revwiki_core::repository::NewRevision;
use revwiki_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgExecutor;

use crate::models::revision::{RecentRevision, Revision, RevisionHistoryRow};

/// Column list for revisions queries.
const COLUMNS: &str = "id, page_id, rev_number, is_snapshot, content, diff, base_rev, summary, \
                       author_id, created_at";

pub struct RevisionRepo;

impl RevisionRepo {
    /// Insert a revision. A taken `(page_id, rev_number)` violates
    /// `uq_revisions_page_rev`.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        input: &NewRevision,
    ) -> Result<Revision, sqlx::Error> {
        let query = format!(
            "INSERT INTO revisions
                (page_id, rev_number, is_snapshot, content, diff, base_rev, summary, author_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Revision>(&query)
            .bind(input.page_id)
            .bind(input.rev_number)
            .bind(input.is_snapshot)
            .bind(&input.content)
            .bind(Json(&input.diff))
            .bind(input.base_rev)
            .bind(&input.summary)
            .bind(input.author_id)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<Revision>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM revisions WHERE id = $1");
        sqlx::query_as::<_, Revision>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_latest<'e>(
        executor: impl PgExecutor<'e>,
        page_id: DbId,
    ) -> Result<Option<Revision>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM revisions
             WHERE page_id = $1
             ORDER BY rev_number DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, Revision>(&query)
            .bind(page_id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_latest_snapshot_at_or_before<'e>(
        executor: impl PgExecutor<'e>,
        page_id: DbId,
        rev_number: i32,
    ) -> Result<Option<Revision>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM revisions
             WHERE page_id = $1 AND is_snapshot AND rev_number <= $2
             ORDER BY rev_number DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, Revision>(&query)
            .bind(page_id)
            .bind(rev_number)
            .fetch_optional(executor)
            .await
    }

    /// Revisions with `after < rev_number <= upto`, ascending.
    pub async fn list_in_range<'e>(
        executor: impl PgExecutor<'e>,
        page_id: DbId,
        after: i32,
        upto: i32,
    ) -> Result<Vec<Revision>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM revisions
             WHERE page_id = $1 AND rev_number > $2 AND rev_number <= $3
             ORDER BY rev_number ASC"
        );
        sqlx::query_as::<_, Revision>(&query)
            .bind(page_id)
            .bind(after)
            .bind(upto)
            .fetch_all(executor)
            .await
    }

    /// One page's history, newest first, without document payloads.
    pub async fn list_by_page<'e>(
        executor: impl PgExecutor<'e>,
        page_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RevisionHistoryRow>, sqlx::Error> {
        sqlx::query_as::<_, RevisionHistoryRow>(
            "SELECT r.id, r.page_id, r.rev_number, r.is_snapshot, r.summary, r.author_id,
                    u.display_name AS author_name, r.created_at
             FROM revisions r
             LEFT JOIN users u ON u.id = r.author_id
             WHERE r.page_id = $1
             ORDER BY r.rev_number DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(page_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await
    }

    /// Count revisions of one page, or of every page when `page_id` is `None`.
    pub async fn count<'e>(
        executor: impl PgExecutor<'e>,
        page_id: Option<DbId>,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM revisions WHERE $1::BIGINT IS NULL OR page_id = $1",
        )
        .bind(page_id)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    /// Newest revisions across all pages; `id` breaks timestamp ties.
    pub async fn list_recent<'e>(
        executor: impl PgExecutor<'e>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RecentRevision>, sqlx::Error> {
        sqlx::query_as::<_, RecentRevision>(
            "SELECT r.id AS revision_id, r.page_id, p.title, r.rev_number, r.is_snapshot,
                    r.content, r.diff, u.display_name AS author_name, r.created_at
             FROM revisions r
             JOIN pages p ON p.id = r.page_id
             LEFT JOIN users u ON u.id = r.author_id
             ORDER BY r.created_at DESC, r.id DESC
             LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await
    }
}
