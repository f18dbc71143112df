//! Revision policy: snapshot cadence, revision selectors, input validation,
//! and listing bounds.
//!
//! Pure functions only; the revision store composes them with persistence.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Every revision whose number is a multiple of this is stored in full.
pub const DEFAULT_SNAPSHOT_THRESHOLD: i32 = 50;

/// Attempts at the read-diff-commit cycle before a save gives up on conflicts.
pub const DEFAULT_MAX_SAVE_ATTEMPTS: u32 = 3;

/// Maximum title length in characters.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Default page size for recent-changes listings.
pub const DEFAULT_RECENT_LIMIT: i64 = 10;

/// Maximum page size for any listing.
pub const MAX_LIST_LIMIT: i64 = 100;

// ---------------------------------------------------------------------------
// Snapshot cadence
// ---------------------------------------------------------------------------

/// Whether revision `rev_number` is stored as a full snapshot.
///
/// The first revision always is (so is any revision with nothing to diff
/// against); after that, every `threshold`-th revision is.
pub fn is_snapshot(rev_number: i32, threshold: i32, has_base: bool) -> bool {
    rev_number <= 1 || !has_base || (threshold > 0 && rev_number % threshold == 0)
}

// ---------------------------------------------------------------------------
// Revision selectors
// ---------------------------------------------------------------------------

/// Which revision of a page a diff side refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevSelector {
    Current,
    Number(i32),
}

impl RevSelector {
    /// Parse an optional query value; absent means [`RevSelector::Current`].
    pub fn parse_optional(raw: Option<&str>) -> Result<Self, CoreError> {
        raw.map_or(Ok(Self::Current), str::parse)
    }

    /// Resolve against the page's head revision number.
    pub fn resolve(self, current_rev: i32) -> i32 {
        match self {
            Self::Current => current_rev,
            Self::Number(n) => n,
        }
    }
}

impl FromStr for RevSelector {
    type Err = CoreError;

    /// Accepts `current`, an empty string, `N`, or `vN` with `N >= 1`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("current") {
            return Ok(Self::Current);
        }
        let digits = trimmed
            .strip_prefix(['v', 'V'])
            .unwrap_or(trimmed);
        match digits.parse::<i32>() {
            Ok(n) if n >= 1 => Ok(Self::Number(n)),
            _ => Err(CoreError::Validation(format!(
                "Invalid revision selector '{raw}': expected 'current' or a positive revision number"
            ))),
        }
    }
}

impl fmt::Display for RevSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => f.write_str("current"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate and normalize a page title: trimmed, non-empty, at most
/// [`MAX_TITLE_LENGTH`] characters.
pub fn validate_title(title: &str) -> Result<String, CoreError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Title must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_TITLE_LENGTH {
        return Err(CoreError::Validation(format!(
            "Title must be at most {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Document content must be a non-empty JSON object.
pub fn validate_content(content: &Value) -> Result<(), CoreError> {
    match content.as_object() {
        Some(map) if !map.is_empty() => Ok(()),
        Some(_) => Err(CoreError::Validation("Content must not be empty".into())),
        None => Err(CoreError::Validation(
            "Content must be a JSON document object".into(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Listing bounds
// ---------------------------------------------------------------------------

/// Clamp a user-provided limit to valid bounds.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).max(1).min(max)
}

/// Clamp a user-provided offset to non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

/// Number of pages needed to show `total` items, `limit` at a time.
pub fn total_pages(total: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

/// Paging metadata returned alongside every listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total_count: i64,
    pub total_pages: i64,
    pub has_more: bool,
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    /// `returned` is the number of items actually in this page.
    pub fn new(total_count: i64, limit: i64, offset: i64, returned: usize) -> Self {
        Self {
            total_count,
            total_pages: total_pages(total_count, limit),
            has_more: offset + (returned as i64) < total_count,
            limit,
            offset,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    // -- is_snapshot ---------------------------------------------------------

    #[test]
    fn first_revision_is_always_a_snapshot() {
        assert!(is_snapshot(1, 50, true));
        assert!(is_snapshot(1, 50, false));
    }

    #[test]
    fn every_threshold_multiple_is_a_snapshot() {
        let snapshots: Vec<i32> = (1..=120).filter(|&n| is_snapshot(n, 50, true)).collect();
        assert_eq!(snapshots, vec![1, 50, 100]);
    }

    #[test]
    fn missing_base_forces_a_snapshot() {
        assert!(is_snapshot(7, 50, false));
    }

    #[test]
    fn threshold_of_one_snapshots_everything() {
        assert!((1..=10).all(|n| is_snapshot(n, 1, true)));
    }

    // -- RevSelector ---------------------------------------------------------

    #[test]
    fn selector_accepts_current_and_empty() {
        assert_eq!("current".parse::<RevSelector>().unwrap(), RevSelector::Current);
        assert_eq!("CURRENT".parse::<RevSelector>().unwrap(), RevSelector::Current);
        assert_eq!("".parse::<RevSelector>().unwrap(), RevSelector::Current);
        assert_eq!(RevSelector::parse_optional(None).unwrap(), RevSelector::Current);
    }

    #[test]
    fn selector_accepts_numbers_with_optional_prefix() {
        assert_eq!("3".parse::<RevSelector>().unwrap(), RevSelector::Number(3));
        assert_eq!("v12".parse::<RevSelector>().unwrap(), RevSelector::Number(12));
        assert_eq!("V2".parse::<RevSelector>().unwrap(), RevSelector::Number(2));
    }

    #[test]
    fn selector_rejects_garbage() {
        for raw in ["0", "-1", "v", "latest", "1.5", "v0"] {
            assert_matches!(raw.parse::<RevSelector>(), Err(CoreError::Validation(_)), "{raw}");
        }
    }

    #[test]
    fn selector_resolves_against_head() {
        assert_eq!(RevSelector::Current.resolve(9), 9);
        assert_eq!(RevSelector::Number(4).resolve(9), 4);
    }

    // -- validation ----------------------------------------------------------

    #[test]
    fn title_is_trimmed() {
        assert_eq!(validate_title("  Home ").unwrap(), "Home");
    }

    #[test]
    fn title_rejects_empty_and_long() {
        assert_matches!(validate_title("   "), Err(CoreError::Validation(_)));
        assert_matches!(validate_title(&"x".repeat(201)), Err(CoreError::Validation(_)));
        assert!(validate_title(&"가".repeat(200)).is_ok());
    }

    #[test]
    fn content_must_be_non_empty_object() {
        assert!(validate_content(&json!({"type": "doc", "content": []})).is_ok());
        assert_matches!(validate_content(&json!({})), Err(CoreError::Validation(_)));
        assert_matches!(validate_content(&json!(null)), Err(CoreError::Validation(_)));
        assert_matches!(validate_content(&json!("text")), Err(CoreError::Validation(_)));
    }

    // -- listing bounds ------------------------------------------------------

    #[test]
    fn clamp_limit_uses_default_when_none() {
        assert_eq!(clamp_limit(None, DEFAULT_RECENT_LIMIT, MAX_LIST_LIMIT), 10);
    }

    #[test]
    fn clamp_limit_respects_bounds() {
        assert_eq!(clamp_limit(Some(1000), 10, 100), 100);
        assert_eq!(clamp_limit(Some(0), 10, 100), 1);
        assert_eq!(clamp_limit(Some(25), 10, 100), 25);
    }

    #[test]
    fn clamp_offset_floors_at_zero() {
        assert_eq!(clamp_offset(None), 0);
        assert_eq!(clamp_offset(Some(-5)), 0);
        assert_eq!(clamp_offset(Some(30)), 30);
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
    }

    #[test]
    fn pagination_reports_more_pages() {
        let page = Pagination::new(25, 10, 10, 10);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_more);
        assert!(!Pagination::new(25, 10, 20, 5).has_more);
    }
}
