//! Typed view over rich-text document trees.
//!
//! Documents are stored and patched as raw JSON ([`Document`]) so structural
//! patches round-trip exactly. Anything that needs to *understand* the tree
//! (character counting, flattening to lines) parses it into [`Node`] first.
//!
//! Both ProseMirror (`bullet_list`) and Tiptap (`bulletList`) type names are
//! accepted. Node types we do not know about become [`Node::Unknown`] and keep
//! their children, so their text is still reachable.

use serde_json::{json, Map, Value};

use crate::types::Document;

/// Block types that only group other blocks and never render a line themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Doc,
    Blockquote,
    BulletList,
    OrderedList,
    ListItem,
    Table,
    TableRow,
    TableCell,
    TableHeader,
}

impl ContainerKind {
    fn from_type_name(name: &str) -> Option<Self> {
        let kind = match name {
            "doc" => Self::Doc,
            "blockquote" => Self::Blockquote,
            "bullet_list" | "bulletList" => Self::BulletList,
            "ordered_list" | "orderedList" => Self::OrderedList,
            "list_item" | "listItem" => Self::ListItem,
            "table" => Self::Table,
            "table_row" | "tableRow" => Self::TableRow,
            "table_cell" | "tableCell" => Self::TableCell,
            "table_header" | "tableHeader" => Self::TableHeader,
            _ => return None,
        };
        Some(kind)
    }
}

/// One node of a rich-text document.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    HardBreak,
    Paragraph(Vec<Node>),
    Heading {
        /// Always within `1..=6`.
        level: u8,
        content: Vec<Node>,
    },
    CodeBlock {
        text: Option<String>,
        content: Vec<Node>,
    },
    Image {
        src: String,
        alt: Option<String>,
    },
    Container {
        kind: ContainerKind,
        content: Vec<Node>,
    },
    Unknown {
        node_type: Option<String>,
        content: Vec<Node>,
    },
}

impl Node {
    /// Parse a JSON value into a node. Never fails: malformed input degrades to
    /// [`Node::Unknown`] with whatever children could be found.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Node::Text(s.clone()),
            Value::Object(obj) => Self::from_object(obj),
            _ => Node::Unknown {
                node_type: None,
                content: Vec::new(),
            },
        }
    }

    fn from_object(obj: &Map<String, Value>) -> Self {
        let node_type = obj.get("type").and_then(Value::as_str);
        let content = || -> Vec<Node> {
            obj.get("content")
                .and_then(Value::as_array)
                .map(|children| children.iter().map(Node::from_value).collect())
                .unwrap_or_default()
        };
        let attr = |key: &str| obj.get("attrs").and_then(|attrs| attrs.get(key));

        match node_type {
            Some("text") => Node::Text(
                obj.get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            ),
            Some("hardBreak") | Some("hard_break") => Node::HardBreak,
            Some("paragraph") => Node::Paragraph(content()),
            Some("heading") => {
                let level = attr("level").and_then(Value::as_u64).unwrap_or(1).clamp(1, 6) as u8;
                Node::Heading {
                    level,
                    content: content(),
                }
            }
            Some("code_block") | Some("codeBlock") => Node::CodeBlock {
                text: obj
                    .get("text")
                    .and_then(Value::as_str)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
                content: content(),
            },
            Some("image") => Node::Image {
                src: attr("src")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                alt: attr("alt")
                    .and_then(Value::as_str)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string),
            },
            Some(name) => match ContainerKind::from_type_name(name) {
                Some(kind) => Node::Container {
                    kind,
                    content: content(),
                },
                None => Node::Unknown {
                    node_type: Some(name.to_string()),
                    content: content(),
                },
            },
            None => Node::Unknown {
                node_type: None,
                content: content(),
            },
        }
    }

    /// Child nodes in document order (empty for leaves).
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Paragraph(content)
            | Node::Heading { content, .. }
            | Node::CodeBlock { content, .. }
            | Node::Container { content, .. }
            | Node::Unknown { content, .. } => content,
            Node::Text(_) | Node::HardBreak | Node::Image { .. } => &[],
        }
    }

    /// Inline text of this node with hard breaks rendered as `\n`.
    pub fn inline_text(&self) -> String {
        match self {
            Node::Text(text) => text.clone(),
            _ => {
                let mut out = String::new();
                for child in self.children() {
                    match child {
                        Node::HardBreak => out.push('\n'),
                        Node::Text(text) => out.push_str(text),
                        other => out.push_str(&other.inline_text()),
                    }
                }
                out
            }
        }
    }

    /// Append every text leaf of this subtree to `out`, depth-first.
    pub fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            _ => self.children().iter().for_each(|c| c.collect_text(out)),
        }
    }

    /// Number of visible characters (Unicode scalar values) in text leaves.
    pub fn visible_chars(&self) -> usize {
        match self {
            Node::Text(text) => text.chars().count(),
            _ => self.children().iter().map(Node::visible_chars).sum(),
        }
    }
}

/// The document returned for pages that have no snapshot yet, and the base
/// every page's first diff is computed against.
pub fn empty_document() -> Document {
    json!({})
}

/// Whether a JSON value is a document tree (an object with a `type` of `doc`
/// and a `content` array).
pub fn is_doc_tree(value: &Value) -> bool {
    value.get("type").and_then(Value::as_str) == Some("doc")
        && value.get("content").is_some_and(Value::is_array)
}
