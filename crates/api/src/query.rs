//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// Generic pagination parameters (`?limit=&offset=`).
///
/// Values are clamped by the revision store.
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `?title=` lookup, with optional pagination for history listings.
#[derive(Debug, Deserialize)]
pub struct TitleParams {
    #[serde(default)]
    pub title: String,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Interpret a query flag: `1`, `true`, `yes` and `on` are true, case-insensitive.
pub fn is_truthy(raw: Option<&str>) -> bool {
    raw.map(str::trim).is_some_and(|v| {
        ["1", "true", "yes", "on"]
            .iter()
            .any(|t| v.eq_ignore_ascii_case(t))
    })
}
