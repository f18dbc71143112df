//! Route definitions for the `/pages` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::page;
use crate::state::AppState;

/// Routes mounted at `/pages`.
///
/// ```text
/// GET    /?title=              -> get_by_title
/// POST   /                     -> save
/// GET    /revisions?title=     -> list_revisions
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(page::get_by_title).post(page::save))
        .route("/revisions", get(page::list_revisions))
}
