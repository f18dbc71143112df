use axum::routing::get;
use axum::Router;

use crate::handlers::revision;
use crate::state::AppState;

/// Routes mounted at `/revisions`.
pub fn router() -> Router<AppState> {
    Router::new().route("/{revision_id}", get(revision::get_by_id))
}
