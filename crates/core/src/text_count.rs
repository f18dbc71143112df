//! Visible-character counting over arbitrary JSON fragments.
//!
//! Patch values can be whole nodes, arrays of nodes, or bare strings (a
//! replaced `text` field), so counting works on raw JSON rather than only on
//! parsed documents.

use serde::Serialize;
use serde_json::Value;
use similar::{ChangeTag, TextDiff};

use crate::document::Node;

/// Count visible characters in a JSON fragment.
///
/// - arrays sum their elements
/// - strings count their own characters
/// - objects are parsed as document nodes and count their text leaves
/// - anything else counts as zero
pub fn count_chars(value: &Value) -> usize {
    match value {
        Value::Array(items) => items.iter().map(count_chars).sum(),
        Value::String(s) => s.chars().count(),
        Value::Object(_) => Node::from_value(value).visible_chars(),
        _ => 0,
    }
}

/// Edit-size weight of an inserted or removed fragment: an image node counts
/// as a single unit, everything else by its visible characters.
pub fn edit_weight(value: &Value) -> usize {
    if value.get("type").and_then(Value::as_str) == Some("image") {
        1
    } else {
        count_chars(value)
    }
}

/// Character-level difference between two texts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CharDelta {
    pub added: usize,
    pub removed: usize,
    /// Estimated replaced characters: `min(added, removed)`. An approximation,
    /// not an exact edit-script count.
    pub replacements: usize,
}

/// Diff two texts character by character and tally inserted/deleted chars.
pub fn char_delta(old: &str, new: &str) -> CharDelta {
    let diff = TextDiff::from_chars(old, new);
    let mut delta = CharDelta::default();
    for change in diff.iter_all_changes() {
        let n = change.value().chars().count();
        match change.tag() {
            ChangeTag::Insert => delta.added += n,
            ChangeTag::Delete => delta.removed += n,
            ChangeTag::Equal => {}
        }
    }
    delta.replacements = delta.added.min(delta.removed);
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn counts_nested_text_nodes() {
        let doc = json!({
            "type": "doc",
            "content": [
                {"type": "paragraph", "content": [{"type": "text", "text": "Hello"}]},
                {"type": "paragraph", "content": [{"type": "text", "text": " world"}]}
            ]
        });
        assert_eq!(count_chars(&doc), 11);
    }

    #[test]
    fn counts_arrays_and_strings() {
        let fragment = json!([
            {"type": "text", "text": "ab"},
            "cde"
        ]);
        assert_eq!(count_chars(&fragment), 5);
    }

    #[test]
    fn counts_unicode_scalars_not_bytes() {
        assert_eq!(count_chars(&json!("안녕하세요")), 5);
    }

    #[test]
    fn scalars_count_zero() {
        assert_eq!(count_chars(&json!(12)), 0);
        assert_eq!(count_chars(&json!(null)), 0);
    }

    #[test]
    fn char_delta_counts_insertions_and_deletions() {
        let delta = char_delta("Hello", "Hello world");
        assert_eq!(delta.added, 6);
        assert_eq!(delta.removed, 0);
        assert_eq!(delta.replacements, 0);
    }

    #[test]
    fn char_delta_estimates_replacements() {
        let delta = char_delta("cat", "cot");
        assert_eq!(delta.added, 1);
        assert_eq!(delta.removed, 1);
        assert_eq!(delta.replacements, 1);
        assert_eq!(char_delta("same", "same"), CharDelta::default());
    }

    #[test]
    fn image_weighs_one_unit() {
        let image = json!({"type": "image", "attrs": {"src": "x.png"}});
        assert_eq!(edit_weight(&image), 1);
        assert_eq!(edit_weight(&json!({"type": "text", "text": "abc"})), 3);
    }
}
