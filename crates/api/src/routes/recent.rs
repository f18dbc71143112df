use axum::routing::get;
use axum::Router;

use crate::handlers::recent;
use crate::state::AppState;

/// Routes mounted at `/recent-changes`.
///
/// ```text
/// GET /?limit=&offset=         -> list_changes
/// GET /pages?limit=&offset=    -> list_pages
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(recent::list_changes))
        .route("/pages", get(recent::list_pages))
}
