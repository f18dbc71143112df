pub mod diff;
pub mod health;
pub mod page;
pub mod recent;
pub mod revision;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /pages                          save (auth), get by title
/// /pages/revisions                history by title
/// /revisions/{revision_id}        single revision
/// /diff                           line diff between two revisions
/// /recent-changes                 per-revision character deltas
/// /recent-changes/pages           recently updated pages
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/pages", page::router())
        .nest("/revisions", revision::router())
        .nest("/diff", diff::router())
        .nest("/recent-changes", recent::router())
}
