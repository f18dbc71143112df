use axum::routing::get;
use axum::Router;

use crate::handlers::diff;
use crate::state::AppState;

/// Routes mounted at `/diff`.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(diff::get_diff))
}
