//! Handler for the revision diff endpoint.

use axum::extract::{Query, State};
use axum::Json;
use revwiki_core::revision::RevSelector;
use revwiki_core::revision_store::{DiffRequest, DiffView};
use serde::Deserialize;

use crate::error::AppResult;
use crate::query::is_truthy;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DiffParams {
    #[serde(default)]
    pub title: String,
    pub left_rev: Option<String>,
    pub right_rev: Option<String>,
    pub context: Option<String>,
    pub with_patch: Option<String>,
}

/// Context lines for a diff request.
///
/// `all` disables clipping. Absent or unparseable values use `default`.
pub fn parse_context(raw: Option<&str>, default: usize) -> Option<usize> {
    match raw.map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("all") => None,
        Some(v) => Some(v.parse().unwrap_or(default)),
        None => Some(default),
    }
}

/// GET /api/v1/diff?title=&left_rev=&right_rev=&context=&with_patch=
pub async fn get_diff(
    State(state): State<AppState>,
    Query(params): Query<DiffParams>,
) -> AppResult<Json<DataResponse<DiffView>>> {
    let request = DiffRequest {
        title: params.title,
        left: RevSelector::parse_optional(params.left_rev.as_deref())?,
        right: RevSelector::parse_optional(params.right_rev.as_deref())?,
        context: parse_context(params.context.as_deref(), state.config.default_diff_context),
        with_patch: is_truthy(params.with_patch.as_deref()),
    };
    let diff = state.store.diff_revisions(request).await?;
    Ok(Json(DataResponse { data: diff }))
}
