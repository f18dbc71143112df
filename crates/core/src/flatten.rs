//! Projection of document trees onto plain text and display lines.
//!
//! This is a lossy, display-oriented rendering used for line diffs and
//! character deltas; it is not a reversible serialization.

use serde_json::Value;

use crate::document::{is_doc_tree, Node};

/// Concatenate every text leaf of a document, depth-first, in document order.
pub fn extract_text(doc: &Value) -> String {
    let mut out = String::new();
    Node::from_value(doc).collect_text(&mut out);
    out
}

/// Flatten a document tree into display lines.
///
/// | Node          | Lines                                        |
/// |---------------|----------------------------------------------|
/// | heading       | `"#" * level + " " + text`                   |
/// | paragraph     | inline text split on hard breaks             |
/// | code block    | raw code split on `\n`                       |
/// | image         | `![alt](src)` (`alt` defaults to `image`)    |
/// | containers    | children only                                |
/// | anything else | inline text split on `\n`, if non-empty      |
pub fn to_lines(doc: &Value) -> Vec<String> {
    let mut lines = Vec::new();
    walk(&Node::from_value(doc), &mut lines);
    lines
}

fn walk(node: &Node, lines: &mut Vec<String>) {
    match node {
        Node::Container { content, .. } => content.iter().for_each(|c| walk(c, lines)),
        Node::Heading { level, .. } => {
            lines.push(format!(
                "{} {}",
                "#".repeat(usize::from(*level)),
                node.inline_text()
            ));
        }
        Node::Paragraph(_) => push_split(lines, &node.inline_text()),
        Node::CodeBlock { text, .. } => {
            let code = text.clone().unwrap_or_else(|| node.inline_text());
            push_split(lines, &code);
        }
        Node::Image { src, alt } => {
            lines.push(format!("![{}]({src})", alt.as_deref().unwrap_or("image")));
        }
        Node::Text(_) | Node::HardBreak | Node::Unknown { .. } => {
            let text = node.inline_text();
            if !text.is_empty() {
                push_split(lines, &text);
            }
        }
    }
}

fn push_split(lines: &mut Vec<String>, text: &str) {
    lines.extend(text.split('\n').map(str::to_string));
}

/// Render any stored value as text suitable for line diffing.
///
/// `null` is empty, strings are used verbatim, document trees are flattened
/// with [`to_lines`], and any other JSON is pretty-printed.
pub fn doc_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        v if is_doc_tree(v) => to_lines(v).join("\n"),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(t: &str) -> Value {
        json!({"type": "text", "text": t})
    }

    // -- extract_text --------------------------------------------------------

    #[test]
    fn extract_text_concatenates_in_order() {
        let doc = json!({
            "type": "doc",
            "content": [
                {"type": "paragraph", "content": [text("Hello"), text(", ")]},
                {"type": "bullet_list", "content": [
                    {"type": "list_item", "content": [
                        {"type": "paragraph", "content": [text("world")]}
                    ]}
                ]},
                {"type": "image", "attrs": {"src": "x.png"}}
            ]
        });
        assert_eq!(extract_text(&doc), "Hello, world");
    }

    #[test]
    fn extract_text_of_empty_document_is_empty() {
        assert_eq!(extract_text(&json!({})), "");
    }

    // -- to_lines ------------------------------------------------------------

    #[test]
    fn headings_paragraphs_and_images() {
        let doc = json!({
            "type": "doc",
            "content": [
                {"type": "heading", "attrs": {"level": 3}, "content": [text("Intro")]},
                {"type": "paragraph", "content": [text("a"), {"type": "hardBreak"}, text("b")]},
                {"type": "image", "attrs": {"src": "cat.png", "alt": "Cat"}},
                {"type": "image", "attrs": {"src": "dog.png"}}
            ]
        });
        assert_eq!(
            to_lines(&doc),
            vec!["### Intro", "a", "b", "![Cat](cat.png)", "![image](dog.png)"]
        );
    }

    #[test]
    fn empty_paragraph_is_a_blank_line() {
        let doc = json!({"type": "doc", "content": [{"type": "paragraph"}]});
        assert_eq!(to_lines(&doc), vec![""]);
    }

    #[test]
    fn code_block_prefers_raw_text() {
        let doc = json!({
            "type": "doc",
            "content": [
                {"type": "code_block", "text": "fn main() {\n}"},
                {"type": "codeBlock", "content": [text("x = 1\ny = 2")]}
            ]
        });
        assert_eq!(to_lines(&doc), vec!["fn main() {", "}", "x = 1", "y = 2"]);
    }

    #[test]
    fn tables_recurse_into_cells() {
        let doc = json!({
            "type": "doc",
            "content": [{"type": "table", "content": [
                {"type": "table_row", "content": [
                    {"type": "table_header", "content": [{"type": "paragraph", "content": [text("h")]}]},
                    {"type": "table_cell", "content": [{"type": "paragraph", "content": [text("c")]}]}
                ]}
            ]}]
        });
        assert_eq!(to_lines(&doc), vec!["h", "c"]);
    }

    #[test]
    fn unknown_blocks_fall_back_to_inline_text() {
        let doc = json!({
            "type": "doc",
            "content": [
                {"type": "callout", "content": [text("note"), {"type": "hardBreak"}, text("more")]},
                {"type": "horizontal_rule"}
            ]
        });
        assert_eq!(to_lines(&doc), vec!["note", "more"]);
    }

    // -- doc_to_text ---------------------------------------------------------

    #[test]
    fn doc_to_text_handles_every_shape() {
        assert_eq!(doc_to_text(&Value::Null), "");
        assert_eq!(doc_to_text(&json!("plain")), "plain");
        let doc = json!({"type": "doc", "content": [
            {"type": "paragraph", "content": [text("x")]},
            {"type": "paragraph", "content": [text("y")]}
        ]});
        assert_eq!(doc_to_text(&doc), "x\ny");
        assert_eq!(doc_to_text(&json!({"a": 1})), "{\n  \"a\": 1\n}");
    }
}
