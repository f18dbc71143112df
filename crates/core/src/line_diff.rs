//! Git-style line diffs over flattened documents.
//!
//! Ops carry 1-based `old_start`/`new_start` line numbers. Concatenating the
//! old side (`equal`, `del`, `modify.old_lines`) reproduces the old text's
//! lines; the new side (`equal`, `add`, `modify.new_lines`) reproduces the new
//! text's lines. Clipped output replaces long unchanged stretches with
//! [`LineOp::Elided`] markers, which go over the wire as an `equal` op whose
//! only line is [`ELLIPSIS`] plus the number of lines it stands for:
//!
//! ```json
//! {"type": "equal", "old_start": 1, "new_start": 1, "lines": ["…"], "count": 7}
//! ```

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use similar::{capture_diff_slices, Algorithm, ChangeTag, DiffOp, TextDiff};

use crate::flatten::to_lines;

/// The single display line an elided stretch renders as.
pub const ELLIPSIS: &str = "…";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOp {
    Equal {
        old_start: usize,
        new_start: usize,
        lines: Vec<String>,
    },
    Add {
        new_start: usize,
        lines: Vec<String>,
    },
    Del {
        old_start: usize,
        lines: Vec<String>,
    },
    /// A deleted block immediately followed by an added block.
    Modify {
        old_start: usize,
        new_start: usize,
        old_lines: Vec<String>,
        new_lines: Vec<String>,
        /// One segment list per line pair, padded to the longer side.
        word_diffs: Option<Vec<Vec<WordSegment>>>,
    },
    /// `count` unchanged lines omitted by context clipping.
    Elided {
        old_start: usize,
        new_start: usize,
        count: usize,
    },
}

impl LineOp {
    pub fn is_change(&self) -> bool {
        matches!(self, LineOp::Add { .. } | LineOp::Del { .. } | LineOp::Modify { .. })
    }

    /// Render as prefixed display lines (` `, `-`, `+`, or the ellipsis).
    pub fn display_lines(&self) -> Vec<String> {
        let prefixed = |prefix: char, lines: &[String]| -> Vec<String> {
            lines.iter().map(|l| format!("{prefix}{l}")).collect()
        };
        match self {
            LineOp::Equal { lines, .. } => prefixed(' ', lines),
            LineOp::Add { lines, .. } => prefixed('+', lines),
            LineOp::Del { lines, .. } => prefixed('-', lines),
            LineOp::Modify {
                old_lines,
                new_lines,
                ..
            } => {
                let mut out = prefixed('-', old_lines);
                out.extend(prefixed('+', new_lines));
                out
            }
            LineOp::Elided { .. } => vec![ELLIPSIS.to_string()],
        }
    }
}

impl Serialize for LineOp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self {
            LineOp::Equal {
                old_start,
                new_start,
                lines,
            } => {
                map.serialize_entry("type", "equal")?;
                map.serialize_entry("old_start", old_start)?;
                map.serialize_entry("new_start", new_start)?;
                map.serialize_entry("lines", lines)?;
            }
            LineOp::Add { new_start, lines } => {
                map.serialize_entry("type", "add")?;
                map.serialize_entry("new_start", new_start)?;
                map.serialize_entry("lines", lines)?;
            }
            LineOp::Del { old_start, lines } => {
                map.serialize_entry("type", "del")?;
                map.serialize_entry("old_start", old_start)?;
                map.serialize_entry("lines", lines)?;
            }
            LineOp::Modify {
                old_start,
                new_start,
                old_lines,
                new_lines,
                word_diffs,
            } => {
                map.serialize_entry("type", "modify")?;
                map.serialize_entry("old_start", old_start)?;
                map.serialize_entry("new_start", new_start)?;
                map.serialize_entry("old_lines", old_lines)?;
                map.serialize_entry("new_lines", new_lines)?;
                if let Some(word_diffs) = word_diffs {
                    map.serialize_entry("word_diffs", word_diffs)?;
                }
            }
            LineOp::Elided {
                old_start,
                new_start,
                count,
            } => {
                map.serialize_entry("type", "equal")?;
                map.serialize_entry("old_start", old_start)?;
                map.serialize_entry("new_start", new_start)?;
                map.serialize_entry("lines", &[ELLIPSIS])?;
                map.serialize_entry("count", count)?;
            }
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Add,
    Del,
    Equal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordSegment {
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LineDiffSummary {
    pub added: usize,
    pub deleted: usize,
    pub modified: usize,
}

/// Split text into lines on `\n`, dropping one trailing empty segment so
/// `"a\n"` and `"a"` both have a single line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }
    lines
}

fn owned(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|l| l.to_string()).collect()
}

/// Line diff of two texts.
pub fn line_diff(old: &str, new: &str, with_intra_line: bool) -> Vec<LineOp> {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);
    let raw = capture_diff_slices(Algorithm::Myers, &old_lines, &new_lines);

    let modify = |old_index: usize, old_len: usize, new_index: usize, new_len: usize| {
        let olds = &old_lines[old_index..old_index + old_len];
        let news = &new_lines[new_index..new_index + new_len];
        LineOp::Modify {
            old_start: old_index + 1,
            new_start: new_index + 1,
            old_lines: owned(olds),
            new_lines: owned(news),
            word_diffs: with_intra_line.then(|| pairwise_word_diffs(olds, news)),
        }
    };

    let mut ops = Vec::with_capacity(raw.len());
    let mut iter = raw.iter().peekable();
    while let Some(op) = iter.next() {
        match *op {
            DiffOp::Equal {
                old_index,
                new_index,
                len,
            } => ops.push(LineOp::Equal {
                old_start: old_index + 1,
                new_start: new_index + 1,
                lines: owned(&old_lines[old_index..old_index + len]),
            }),
            DiffOp::Delete {
                old_index, old_len, ..
            } => match iter.peek() {
                Some(&&DiffOp::Insert {
                    new_index, new_len, ..
                }) => {
                    iter.next();
                    ops.push(modify(old_index, old_len, new_index, new_len));
                }
                _ => ops.push(LineOp::Del {
                    old_start: old_index + 1,
                    lines: owned(&old_lines[old_index..old_index + old_len]),
                }),
            },
            DiffOp::Insert {
                new_index, new_len, ..
            } => ops.push(LineOp::Add {
                new_start: new_index + 1,
                lines: owned(&new_lines[new_index..new_index + new_len]),
            }),
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => ops.push(modify(old_index, old_len, new_index, new_len)),
        }
    }
    ops
}

fn pairwise_word_diffs(olds: &[&str], news: &[&str]) -> Vec<Vec<WordSegment>> {
    (0..olds.len().max(news.len()))
        .map(|k| {
            word_diff(
                olds.get(k).copied().unwrap_or_default(),
                news.get(k).copied().unwrap_or_default(),
            )
        })
        .collect()
}

/// Word-level diff of one line pair, merging consecutive same-kind tokens.
pub fn word_diff(old: &str, new: &str) -> Vec<WordSegment> {
    let diff = TextDiff::from_words(old, new);
    let mut segments: Vec<WordSegment> = Vec::new();
    for change in diff.iter_all_changes() {
        let kind = match change.tag() {
            ChangeTag::Equal => SegmentKind::Equal,
            ChangeTag::Delete => SegmentKind::Del,
            ChangeTag::Insert => SegmentKind::Add,
        };
        match segments.last_mut() {
            Some(last) if last.kind == kind => last.text.push_str(change.value()),
            _ => segments.push(WordSegment {
                kind,
                text: change.value().to_string(),
            }),
        }
    }
    segments
}

pub fn summarize_ops(ops: &[LineOp]) -> LineDiffSummary {
    ops.iter()
        .fold(LineDiffSummary::default(), |mut summary, op| {
            match op {
                LineOp::Add { lines, .. } => summary.added += lines.len(),
                LineOp::Del { lines, .. } => summary.deleted += lines.len(),
                LineOp::Modify {
                    old_lines,
                    new_lines,
                    ..
                } => summary.modified += old_lines.len().max(new_lines.len()),
                LineOp::Equal { .. } | LineOp::Elided { .. } => {}
            }
            summary
        })
}

/// Unified diff text with `---`/`+++` headers.
///
/// `context` is the number of unchanged lines around each hunk; `None` shows
/// the whole file as context.
pub fn unified_patch(
    old: &str,
    new: &str,
    old_label: &str,
    new_label: &str,
    context: Option<usize>,
) -> String {
    let radius = context.unwrap_or_else(|| split_lines(old).len().max(split_lines(new).len()));
    let diff = TextDiff::from_lines(old, new);
    let mut out = format!("--- {old_label}\n+++ {new_label}\n");
    for hunk in diff.unified_diff().context_radius(radius).iter_hunks() {
        out.push_str(&hunk.to_string());
    }
    out
}

/// Collapse unchanged stretches to at most `context` lines next to each
/// change. `None` leaves the ops untouched.
///
/// With no changes at all, the head and tail `context` lines of the text are
/// kept around a single ellipsis (text of `2 * context` lines or fewer is
/// kept whole). Clipping is idempotent.
pub fn clip_by_context(ops: &[LineOp], context: Option<usize>) -> Vec<LineOp> {
    let Some(context) = context else {
        return ops.to_vec();
    };
    let has_change = ops.iter().any(LineOp::is_change);

    let mut out: Vec<LineOp> = Vec::with_capacity(ops.len());
    let mut i = 0;
    while i < ops.len() {
        if !matches!(ops[i], LineOp::Equal { .. }) {
            push_merging(&mut out, ops[i].clone());
            i += 1;
            continue;
        }

        let start = i;
        let mut run: Vec<(usize, usize, String)> = Vec::new();
        while let Some(LineOp::Equal {
            old_start,
            new_start,
            lines,
        }) = ops.get(i)
        {
            run.extend(
                lines
                    .iter()
                    .enumerate()
                    .map(|(k, l)| (old_start + k, new_start + k, l.clone())),
            );
            i += 1;
        }

        let anchored = |neighbour: Option<&LineOp>| match neighbour {
            Some(op) => op.is_change(),
            None => !has_change,
        };
        let head = anchored(start.checked_sub(1).map(|p| &ops[p]));
        let tail = anchored(ops.get(i));

        let len = run.len();
        let (keep_head, keep_tail) = match (head, tail) {
            (true, true) if len <= 2 * context => (len, 0),
            (true, true) => (context, context),
            (true, false) => (context.min(len), 0),
            (false, true) => (0, context.min(len)),
            (false, false) => (0, 0),
        };

        push_equal(&mut out, &run[..keep_head]);
        if keep_head + keep_tail < len {
            let (old_start, new_start, _) = &run[keep_head];
            push_merging(
                &mut out,
                LineOp::Elided {
                    old_start: *old_start,
                    new_start: *new_start,
                    count: len - keep_head - keep_tail,
                },
            );
        }
        push_equal(&mut out, &run[len - keep_tail..]);
    }
    out
}

fn push_equal(out: &mut Vec<LineOp>, lines: &[(usize, usize, String)]) {
    if let Some((old_start, new_start, _)) = lines.first() {
        out.push(LineOp::Equal {
            old_start: *old_start,
            new_start: *new_start,
            lines: lines.iter().map(|(_, _, l)| l.clone()).collect(),
        });
    }
}

fn push_merging(out: &mut Vec<LineOp>, op: LineOp) {
    if let (Some(LineOp::Elided { count: total, .. }), LineOp::Elided { count, .. }) =
        (out.last_mut(), &op)
    {
        *total += count;
        return;
    }
    out.push(op);
}

/// Options for [`diff_documents`].
#[derive(Debug, Clone)]
pub struct DocumentDiffOptions<'a> {
    pub with_intra_line: bool,
    /// Context lines kept around changes in `ops`; `None` keeps everything.
    pub context: Option<usize>,
    pub with_patch: bool,
    pub old_label: &'a str,
    pub new_label: &'a str,
}

impl Default for DocumentDiffOptions<'_> {
    fn default() -> Self {
        Self {
            with_intra_line: true,
            context: Some(3),
            with_patch: false,
            old_label: "old",
            new_label: "new",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentDiff {
    pub ops: Vec<LineOp>,
    /// Computed before clipping, so it always covers the whole document.
    pub summary: LineDiffSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
}

/// Flatten both documents and line-diff them.
pub fn diff_documents(old: &Value, new: &Value, options: &DocumentDiffOptions<'_>) -> DocumentDiff {
    let old_text = to_lines(old).join("\n");
    let new_text = to_lines(new).join("\n");
    diff_texts(&old_text, &new_text, options)
}

/// [`diff_documents`] for texts that are already flattened.
pub fn diff_texts(old_text: &str, new_text: &str, options: &DocumentDiffOptions<'_>) -> DocumentDiff {
    let ops = line_diff(old_text, new_text, options.with_intra_line);
    let summary = summarize_ops(&ops);
    let patch = options.with_patch.then(|| {
        unified_patch(
            old_text,
            new_text,
            options.old_label,
            options.new_label,
            options.context,
        )
    });
    DocumentDiff {
        ops: clip_by_context(&ops, options.context),
        summary,
        patch,
    }
}
