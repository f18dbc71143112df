//! Handlers for the `/pages` resource.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use revwiki_core::revision_store::{PageView, RevisionHistory, SaveOutcome, SavePage};
use revwiki_core::types::Document;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::query::{is_truthy, TitleParams};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of a page save. Missing fields fall through to store validation.
#[derive(Debug, Deserialize)]
pub struct SavePageRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: Document,
    pub summary: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveParams {
    pub with_line_diff: Option<String>,
}

/// POST /api/v1/pages
pub async fn save(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<SaveParams>,
    Json(input): Json<SavePageRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<SaveOutcome>>)> {
    let outcome = state
        .store
        .save_page(SavePage {
            title: input.title,
            content: input.content,
            summary: input.summary,
            author_id: user.user_id,
            with_line_diff: is_truthy(params.with_line_diff.as_deref()),
        })
        .await?;
    tracing::info!(
        page_id = outcome.page_id,
        rev_number = outcome.rev_number,
        user_id = user.user_id,
        "Page saved",
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: outcome })))
}

/// GET /api/v1/pages?title=
pub async fn get_by_title(
    State(state): State<AppState>,
    Query(params): Query<TitleParams>,
) -> AppResult<Json<DataResponse<PageView>>> {
    let page = state.store.get_page(&params.title).await?;
    Ok(Json(DataResponse { data: page }))
}

/// GET /api/v1/pages/revisions?title=&limit=&offset=
pub async fn list_revisions(
    State(state): State<AppState>,
    Query(params): Query<TitleParams>,
) -> AppResult<Json<DataResponse<RevisionHistory>>> {
    let history = state
        .store
        .list_revisions(&params.title, params.limit, params.offset)
        .await?;
    Ok(Json(DataResponse { data: history }))
}
