use axum::extract::{Query, State};
use axum::Json;
use revwiki_core::recent_changes::RecentChanges;
use revwiki_core::revision_store::RecentPages;

use crate::error::AppResult;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/recent-changes?limit=&offset=
pub async fn list_changes(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<RecentChanges>>> {
    let changes = state
        .store
        .recent_changes(params.limit, params.offset)
        .await?;
    Ok(Json(DataResponse { data: changes }))
}

/// GET /api/v1/recent-changes/pages?limit=&offset=
pub async fn list_pages(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<RecentPages>>> {
    let pages = state.store.recent_pages(params.limit, params.offset).await?;
    Ok(Json(DataResponse { data: pages }))
}
