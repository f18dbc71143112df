//! Structural diff engine: JSON-pointer patches between document trees.
//!
//! A [`Patch`] is an ordered list of [`PatchOp`]s in the RFC 6902 wire shape
//! (`{"op": "...", "path": "...", "value": ..., "from": "..."}`). Patches are
//! the on-disk representation of delta revisions, so [`diff`] output must
//! replay exactly through [`apply`].
//!
//! Patches produced by [`diff`] are always invertible:
//! - every `remove` carries the removed value inline
//! - every `replace` is preceded by a `test` of the old value at the same path

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use similar::{capture_diff_slices_deadline, Algorithm, DiffOp};

use crate::error::CoreError;
use crate::text_count::{char_delta, count_chars, edit_weight};

/// One structural edit operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add {
        path: String,
        value: Value,
    },
    Remove {
        path: String,
        /// The removed value, recorded so the op can be inverted and
        /// summarized without the prior document.
        #[serde(
            default,
            deserialize_with = "present_value",
            skip_serializing_if = "Option::is_none"
        )]
        value: Option<Value>,
    },
    Replace {
        path: String,
        value: Value,
    },
    Move {
        from: String,
        path: String,
    },
    Copy {
        from: String,
        path: String,
    },
    Test {
        path: String,
        value: Value,
    },
}

pub type Patch = Vec<PatchOp>;

/// Keep an explicit `"value": null` as `Some(Null)`; only an absent key is `None`.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl PatchOp {
    /// The pointer this op writes to (or asserts on, for `test`).
    pub fn path(&self) -> &str {
        match self {
            PatchOp::Add { path, .. }
            | PatchOp::Remove { path, .. }
            | PatchOp::Replace { path, .. }
            | PatchOp::Move { path, .. }
            | PatchOp::Copy { path, .. }
            | PatchOp::Test { path, .. } => path,
        }
    }
}

// ---------------------------------------------------------------------------
// JSON pointers
// ---------------------------------------------------------------------------

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn child_path(parent: &str, token: &str) -> String {
    format!("{parent}/{}", escape_token(token))
}

fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}/{index}")
}

/// Split a pointer into unescaped reference tokens. `""` is the root.
fn parse_pointer(pointer: &str) -> Result<Vec<String>, String> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(format!("invalid pointer '{pointer}': must start with '/'"));
    };
    Ok(rest
        .split('/')
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect())
}

fn parse_index(token: &str) -> Option<usize> {
    if token.is_empty() || (token.len() > 1 && token.starts_with('0')) {
        return None;
    }
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn resolve<'a>(doc: &'a Value, tokens: &[String]) -> Option<&'a Value> {
    tokens.iter().try_fold(doc, |node, token| match node {
        Value::Object(map) => map.get(token),
        Value::Array(items) => parse_index(token).and_then(|i| items.get(i)),
        _ => None,
    })
}

fn resolve_mut<'a>(doc: &'a mut Value, tokens: &[String]) -> Option<&'a mut Value> {
    tokens.iter().try_fold(doc, |node, token| match node {
        Value::Object(map) => map.get_mut(token),
        Value::Array(items) => parse_index(token).and_then(move |i| items.get_mut(i)),
        _ => None,
    })
}

/// Resolve a pointer against a document without failing.
pub fn lookup<'a>(doc: &'a Value, pointer: &str) -> Option<&'a Value> {
    parse_pointer(pointer).ok().and_then(|t| resolve(doc, &t))
}

// ---------------------------------------------------------------------------
// Primitive edits
// ---------------------------------------------------------------------------

fn parent_of<'a>(
    doc: &'a mut Value,
    tokens: &[String],
) -> Result<(&'a mut Value, String), String> {
    let (last, parents) = tokens
        .split_last()
        .ok_or_else(|| "operation cannot target the document root".to_string())?;
    let parent = resolve_mut(doc, parents)
        .ok_or_else(|| format!("parent of '/{}' does not exist", tokens.join("/")))?;
    Ok((parent, last.clone()))
}

fn add_at(doc: &mut Value, tokens: &[String], value: Value) -> Result<(), String> {
    if tokens.is_empty() {
        *doc = value;
        return Ok(());
    }
    let (parent, key) = parent_of(doc, tokens)?;
    match parent {
        Value::Object(map) => {
            map.insert(key, value);
            Ok(())
        }
        Value::Array(items) => {
            if key == "-" {
                items.push(value);
                return Ok(());
            }
            match parse_index(&key) {
                Some(i) if i <= items.len() => {
                    items.insert(i, value);
                    Ok(())
                }
                _ => Err(format!(
                    "array index '{key}' out of bounds (length {})",
                    items.len()
                )),
            }
        }
        _ => Err(format!("cannot add '{key}' to a scalar")),
    }
}

fn remove_at(doc: &mut Value, tokens: &[String]) -> Result<Value, String> {
    let (parent, key) = parent_of(doc, tokens)?;
    match parent {
        Value::Object(map) => map
            .remove(&key)
            .ok_or_else(|| format!("key '{key}' does not exist")),
        Value::Array(items) => match parse_index(&key) {
            Some(i) if i < items.len() => Ok(items.remove(i)),
            _ => Err(format!(
                "array index '{key}' out of bounds (length {})",
                items.len()
            )),
        },
        _ => Err(format!("cannot remove '{key}' from a scalar")),
    }
}

fn replace_at(doc: &mut Value, tokens: &[String], value: Value) -> Result<Value, String> {
    let target = resolve_mut(doc, tokens)
        .ok_or_else(|| format!("path '/{}' does not exist", tokens.join("/")))?;
    Ok(std::mem::replace(target, value))
}

fn get_at<'a>(doc: &'a Value, tokens: &[String]) -> Result<&'a Value, String> {
    resolve(doc, tokens).ok_or_else(|| format!("path '/{}' does not exist", tokens.join("/")))
}

/// Apply a single op in place. On error the document may only have been
/// changed by a `move` whose insertion failed, in which case the moved value
/// is put back where it came from.
fn apply_op(doc: &mut Value, op: &PatchOp) -> Result<(), String> {
    match op {
        PatchOp::Add { path, value } => add_at(doc, &parse_pointer(path)?, value.clone()),
        PatchOp::Remove { path, .. } => remove_at(doc, &parse_pointer(path)?).map(|_| ()),
        PatchOp::Replace { path, value } => {
            replace_at(doc, &parse_pointer(path)?, value.clone()).map(|_| ())
        }
        PatchOp::Move { from, path } => {
            if from == path {
                return Ok(());
            }
            if path.starts_with(&format!("{from}/")) {
                return Err(format!("cannot move '{from}' into its own child '{path}'"));
            }
            let from_tokens = parse_pointer(from)?;
            let to_tokens = parse_pointer(path)?;
            let moved = remove_at(doc, &from_tokens)?;
            if let Err(reason) = add_at(doc, &to_tokens, moved.clone()) {
                let _ = add_at(doc, &from_tokens, moved);
                return Err(reason);
            }
            Ok(())
        }
        PatchOp::Copy { from, path } => {
            let copied = get_at(doc, &parse_pointer(from)?)?.clone();
            add_at(doc, &parse_pointer(path)?, copied)
        }
        PatchOp::Test { path, value } => {
            let actual = get_at(doc, &parse_pointer(path)?)?;
            if actual == value {
                Ok(())
            } else {
                Err(format!("test at '{path}' failed: value differs"))
            }
        }
    }
}

/// Apply `patch` to a copy of `doc`.
///
/// With `validate`, the first op that does not apply cleanly (unresolvable
/// path, out-of-range index, failed `test`) aborts with
/// [`CoreError::PatchApplication`]. Without it, faulty ops are skipped.
pub fn apply(doc: &Value, patch: &[PatchOp], validate: bool) -> Result<Value, CoreError> {
    let mut out = doc.clone();
    for (index, op) in patch.iter().enumerate() {
        if let Err(reason) = apply_op(&mut out, op) {
            if validate {
                return Err(CoreError::PatchApplication { index, reason });
            }
            tracing::trace!(index, %reason, "Skipping patch operation");
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// Compute the patch turning `base` into `target`.
///
/// Deterministic for a given ordered pair of documents; equal documents yield
/// an empty patch.
pub fn diff(base: &Value, target: &Value) -> Patch {
    let mut ops = Vec::new();
    diff_values(base, target, "", &mut ops);
    ops
}

fn diff_values(old: &Value, new: &Value, path: &str, ops: &mut Patch) {
    if old == new {
        return;
    }
    match (old, new) {
        (Value::Object(a), Value::Object(b)) => diff_objects(a, b, path, ops),
        (Value::Array(a), Value::Array(b)) => diff_arrays(a, b, path, ops),
        _ => {
            ops.push(PatchOp::Test {
                path: path.to_string(),
                value: old.clone(),
            });
            ops.push(PatchOp::Replace {
                path: path.to_string(),
                value: new.clone(),
            });
        }
    }
}

fn diff_objects(a: &Map<String, Value>, b: &Map<String, Value>, path: &str, ops: &mut Patch) {
    for (key, old) in a {
        if !b.contains_key(key) {
            ops.push(PatchOp::Remove {
                path: child_path(path, key),
                value: Some(old.clone()),
            });
        }
    }
    for (key, new) in b {
        match a.get(key) {
            Some(old) => diff_values(old, new, &child_path(path, key), ops),
            None => ops.push(PatchOp::Add {
                path: child_path(path, key),
                value: new.clone(),
            }),
        }
    }
}

/// Where an element of the target array comes from.
#[derive(Debug, Clone, Copy)]
enum Source {
    /// An unchanged old element (LCS anchor or relocated duplicate).
    Kept(usize),
    /// An old element edited in place.
    Paired(usize),
    Inserted,
}

fn diff_arrays(a: &[Value], b: &[Value], path: &str, ops: &mut Patch) {
    let a_keys: Vec<String> = a.iter().map(Value::to_string).collect();
    let b_keys: Vec<String> = b.iter().map(Value::to_string).collect();
    let anchors = lcs_matches(&a_keys, &b_keys);

    let mut sources = vec![Source::Inserted; b.len()];
    let mut used_old = vec![false; a.len()];
    for &(i, j) in &anchors {
        sources[j] = Source::Kept(i);
        used_old[i] = true;
    }

    // Elements that only changed position.
    let mut unused_by_key: HashMap<&str, VecDeque<usize>> = HashMap::new();
    for i in (0..a.len()).filter(|&i| !used_old[i]) {
        unused_by_key.entry(a_keys[i].as_str()).or_default().push_back(i);
    }
    for j in 0..b.len() {
        if !matches!(sources[j], Source::Inserted) {
            continue;
        }
        if let Some(i) = unused_by_key
            .get_mut(b_keys[j].as_str())
            .and_then(VecDeque::pop_front)
        {
            sources[j] = Source::Kept(i);
            used_old[i] = true;
        }
    }

    // Within each gap between anchors, pair leftovers of the same kind so an
    // edited element becomes a nested diff instead of remove + add.
    let mut bounds: Vec<(usize, usize)> = anchors.clone();
    bounds.push((a.len(), b.len()));
    let (mut old_start, mut new_start) = (0, 0);
    for (old_end, new_end) in bounds {
        let olds: Vec<usize> = (old_start..old_end).filter(|&i| !used_old[i]).collect();
        let news: Vec<usize> = (new_start..new_end)
            .filter(|&j| matches!(sources[j], Source::Inserted))
            .collect();
        for (i, j) in olds.into_iter().zip(news) {
            if same_kind(&a[i], &b[j]) {
                sources[j] = Source::Paired(i);
                used_old[i] = true;
            }
        }
        old_start = old_end + 1;
        new_start = new_end + 1;
    }

    // Replay against a simulated working array so every emitted index is
    // valid at the moment its op is applied.
    for i in (0..a.len()).rev() {
        if !used_old[i] {
            ops.push(PatchOp::Remove {
                path: index_path(path, i),
                value: Some(a[i].clone()),
            });
        }
    }
    let mut working: Vec<Option<usize>> =
        (0..a.len()).filter(|&i| used_old[i]).map(Some).collect();

    for (j, source) in sources.iter().enumerate() {
        match *source {
            Source::Kept(i) | Source::Paired(i) => {
                let position = if working.get(j) == Some(&Some(i)) {
                    j
                } else {
                    working.iter().position(|&w| w == Some(i)).unwrap_or(j)
                };
                if position != j {
                    let element = working.remove(position);
                    working.insert(j, element);
                    ops.push(PatchOp::Move {
                        from: index_path(path, position),
                        path: index_path(path, j),
                    });
                }
                if let Source::Paired(i) = *source {
                    diff_values(&a[i], &b[j], &index_path(path, j), ops);
                }
            }
            Source::Inserted => {
                working.insert(j, None);
                ops.push(PatchOp::Add {
                    path: index_path(path, j),
                    value: b[j].clone(),
                });
            }
        }
    }
}

/// Whether two array elements are similar enough to diff against each other.
fn same_kind(x: &Value, y: &Value) -> bool {
    match (x, y) {
        (Value::Object(a), Value::Object(b)) => a.get("type") == b.get("type"),
        (Value::Array(_), Value::Array(_))
        | (Value::String(_), Value::String(_))
        | (Value::Number(_), Value::Number(_))
        | (Value::Bool(_), Value::Bool(_)) => true,
        _ => false,
    }
}

/// Largest middle section, in table cells, matched with the exact LCS table.
const MAX_LCS_CELLS: usize = 1 << 22;

/// Time allowed for matching a middle section too large for the table.
const LARGE_MATCH_DEADLINE: Duration = Duration::from_millis(250);

/// Common subsequence of whole-element equality over serialized elements,
/// as ascending `(old_index, new_index)` pairs.
///
/// Exact for middles up to [`MAX_LCS_CELLS`]; larger ones use a
/// linear-space Myers pass bounded by [`LARGE_MATCH_DEADLINE`].
fn lcs_matches(a: &[String], b: &[String]) -> Vec<(usize, usize)> {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];

    let mut matches: Vec<(usize, usize)> = (0..prefix).map(|k| (k, k)).collect();
    let cells = (a_mid.len() + 1).saturating_mul(b_mid.len() + 1);
    if cells <= MAX_LCS_CELLS {
        matches.extend(
            table_lcs(a_mid, b_mid)
                .into_iter()
                .map(|(i, j)| (prefix + i, prefix + j)),
        );
    } else {
        tracing::debug!(
            old_len = a_mid.len(),
            new_len = b_mid.len(),
            "Array middle too large for exact LCS, using bounded Myers"
        );
        let deadline = Instant::now() + LARGE_MATCH_DEADLINE;
        for op in capture_diff_slices_deadline(Algorithm::Myers, a_mid, b_mid, Some(deadline)) {
            if let DiffOp::Equal {
                old_index,
                new_index,
                len,
            } = op
            {
                matches.extend((0..len).map(|k| (prefix + old_index + k, prefix + new_index + k)));
            }
        }
    }
    matches.extend((0..suffix).map(|k| (a.len() - suffix + k, b.len() - suffix + k)));
    matches
}

/// Exact LCS through a dense `(m+1) * (n+1)` table.
fn table_lcs(a: &[String], b: &[String]) -> Vec<(usize, usize)> {
    let (m, n) = (a.len(), b.len());
    let at = |i: usize, j: usize| i * (n + 1) + j;

    let mut table = vec![0u32; (m + 1) * (n + 1)];
    for i in (0..m).rev() {
        for j in (0..n).rev() {
            table[at(i, j)] = if a[i] == b[j] {
                table[at(i + 1, j + 1)] + 1
            } else {
                table[at(i + 1, j)].max(table[at(i, j + 1)])
            };
        }
    }

    let mut matches = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < m && j < n {
        if a[i] == b[j] {
            matches.push((i, j));
            i += 1;
            j += 1;
        } else if table[at(i + 1, j)] >= table[at(i, j + 1)] {
            i += 1;
        } else {
            j += 1;
        }
    }
    matches
}

// ---------------------------------------------------------------------------
// Invert
// ---------------------------------------------------------------------------

/// Build the patch that undoes `patch`.
///
/// Requires the invertible form [`diff`] produces: inline values on every
/// `remove` and a `test` of the old value right before every `replace`.
/// Standalone `test` ops assert on the pre-state and are dropped.
pub fn invert(patch: &[PatchOp]) -> Result<Patch, CoreError> {
    let not_invertible =
        |index: usize, why: &str| CoreError::Validation(format!("operation {index} {why}"));

    let mut inverted = Vec::with_capacity(patch.len());
    let mut index = patch.len();
    while index > 0 {
        index -= 1;
        match &patch[index] {
            PatchOp::Add { path, value } => {
                if path.ends_with("/-") {
                    return Err(not_invertible(index, "appends with '-' and cannot be inverted"));
                }
                inverted.push(PatchOp::Remove {
                    path: path.clone(),
                    value: Some(value.clone()),
                });
            }
            PatchOp::Remove { path, value } => {
                let value = value
                    .clone()
                    .ok_or_else(|| not_invertible(index, "removes a value that was not recorded"))?;
                inverted.push(PatchOp::Add {
                    path: path.clone(),
                    value,
                });
            }
            PatchOp::Replace { path, value } => {
                let old = match index.checked_sub(1).map(|prev| &patch[prev]) {
                    Some(PatchOp::Test { path: tested, value: old }) if tested == path => {
                        old.clone()
                    }
                    _ => {
                        return Err(not_invertible(
                            index,
                            "replaces a value without a preceding test",
                        ))
                    }
                };
                index -= 1;
                inverted.push(PatchOp::Test {
                    path: path.clone(),
                    value: value.clone(),
                });
                inverted.push(PatchOp::Replace {
                    path: path.clone(),
                    value: old,
                });
            }
            PatchOp::Move { from, path } => inverted.push(PatchOp::Move {
                from: path.clone(),
                path: from.clone(),
            }),
            PatchOp::Copy { path, .. } => inverted.push(PatchOp::Remove {
                path: path.clone(),
                value: None,
            }),
            PatchOp::Test { .. } => {}
        }
    }
    Ok(inverted)
}

// ---------------------------------------------------------------------------
// Summarize
// ---------------------------------------------------------------------------

/// Character-level accounting of a patch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSummary {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
}

/// Summarize `patch` as applied to `previous`.
///
/// Ops are resolved against a working copy that is advanced op by op, so each
/// path is read in the state it was written for. Unresolvable paths
/// contribute nothing.
pub fn summarize(patch: &[PatchOp], previous: &Value) -> PatchSummary {
    let mut working = previous.clone();
    let mut summary = PatchSummary::default();

    for op in patch {
        match op {
            PatchOp::Add { value, .. } => summary.added += edit_weight(value),
            PatchOp::Copy { from, .. } => {
                if let Some(copied) = lookup(&working, from) {
                    summary.added += edit_weight(copied);
                }
            }
            PatchOp::Remove { path, value } => {
                let removed = value.as_ref().or_else(|| lookup(&working, path));
                if let Some(removed) = removed {
                    summary.removed += edit_weight(removed);
                }
            }
            PatchOp::Replace { path, value } => {
                summary.modified += 1;
                let old = lookup(&working, path);
                match (old, value) {
                    (Some(Value::String(old)), Value::String(new)) if is_text_field(path) => {
                        let delta = char_delta(old, new);
                        summary.added += delta.added;
                        summary.removed += delta.removed;
                    }
                    (old, new) if new.is_object() || new.is_array() => {
                        summary.removed += old.map(count_chars).unwrap_or(0);
                        summary.added += count_chars(new);
                    }
                    _ => {}
                }
            }
            PatchOp::Move { .. } => summary.modified += 1,
            PatchOp::Test { .. } => {}
        }
        let _ = apply_op(&mut working, op);
    }
    summary
}

fn is_text_field(path: &str) -> bool {
    path.rsplit('/').next() == Some("text")
}
