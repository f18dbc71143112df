use axum::extract::{Path, State};
use axum::Json;
use revwiki_core::revision_store::RevisionView;
use revwiki_core::types::DbId;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/revisions/{revision_id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(revision_id): Path<DbId>,
) -> AppResult<Json<DataResponse<RevisionView>>> {
    let revision = state.store.get_revision(revision_id).await?;
    Ok(Json(DataResponse { data: revision }))
}
