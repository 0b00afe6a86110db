use std::borrow::Cow;
use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Delta {
    pub changes: Vec<Change>,
    pub old_line_count: usize,
    pub new_line_count: usize,
    pub old_length: usize,
    pub new_length: usize,
}

impl Delta {
    /// Serializes the delta to the JSON shape stored in `diff_data` columns.
    pub fn to_value(&self) -> Value { serde_json::to_value(self).unwrap_or(Value::Null) }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Change {
    pub op:  ChangeOp,
    pub old: Span,
    pub new: Span,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Replace,
    Delete,
    Insert,
}

/// A half-open `[start, end)` range of lines on one side of a change.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Span {
    pub start: usize,
    pub end:   usize,
    pub lines: Vec<String>,
}

/// Collapses CRLF and lone CR line endings to LF.
fn normalize(text: &str) -> Cow<'_, str> {
    if text.contains('\r') { Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n")) } else { Cow::Borrowed(text) }
}

/// Splits normalized text into lines. The empty document has no lines at all,
/// so diffing "" against anything is a pure insert.
fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n').collect()
}

/// Finds the longest block of lines equal between `a[alo..ahi]` and `b[blo..bhi]`.
fn longest_match(
    a: &[&str],
    b2j: &HashMap<&str, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let mut besti: usize = alo;
    let mut bestj: usize = blo;
    let mut bestsize: usize = 0;

    // j2len[j] = length of the longest match ending at a[i - 1], b[j]
    let mut j2len: HashMap<usize, usize> = HashMap::new();
    for (i, line) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut newj2len: HashMap<usize, usize> = HashMap::new();
        if let Some(indices) = b2j.get(line) {
            for &j in indices {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = if j > 0 { j2len.get(&(j - 1)).copied().unwrap_or(0) + 1 } else { 1 };
                newj2len.insert(j, k);
                if k > bestsize {
                    besti = i + 1 - k;
                    bestj = j + 1 - k;
                    bestsize = k;
                }
            }
        }
        j2len = newj2len;
    }

    (besti, bestj, bestsize)
}

/// Computes the maximal matching blocks between two line sequences, ending with
/// the `(a.len(), b.len(), 0)` sentinel.
fn matching_blocks(a: &[&str], b: &[&str]) -> Vec<(usize, usize, usize)> {
    let mut b2j: HashMap<&str, Vec<usize>> = HashMap::new();
    for (j, &line) in b.iter().enumerate() {
        b2j.entry(line).or_default().push(j);
    }

    let mut queue: Vec<(usize, usize, usize, usize)> = vec![(0, a.len(), 0, b.len())];
    let mut blocks: Vec<(usize, usize, usize)> = Vec::new();
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, &b2j, alo, ahi, blo, bhi);
        if k > 0 {
            blocks.push((i, j, k));
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }
    }
    blocks.sort_unstable();

    // Adjacent blocks are merged so opcode spans come out maximal.
    let mut merged: Vec<(usize, usize, usize)> = Vec::new();
    let (mut i1, mut j1, mut k1): (usize, usize, usize) = (0, 0, 0);
    for (i2, j2, k2) in blocks {
        if i1 + k1 == i2 && j1 + k1 == j2 {
            k1 += k2;
        } else {
            if k1 > 0 {
                merged.push((i1, j1, k1));
            }
            i1 = i2;
            j1 = j2;
            k1 = k2;
        }
    }
    if k1 > 0 {
        merged.push((i1, j1, k1));
    }
    merged.push((a.len(), b.len(), 0));
    merged
}

/// Computes the line-level delta that turns `old` into `new`.
///
/// Line endings are normalized to LF on both sides before comparison. Equal
/// spans are implicit; only `replace`/`delete`/`insert` spans are recorded,
/// with half-open line ranges that are monotonically non-decreasing and
/// non-overlapping on both sides.
pub fn compute(old: &str, new: &str) -> Delta {
    let old_norm = normalize(old);
    let new_norm = normalize(new);
    let old_lines = split_lines(&old_norm);
    let new_lines = split_lines(&new_norm);

    let mut changes: Vec<Change> = Vec::new();
    let mut i: usize = 0;
    let mut j: usize = 0;
    for (ai, bj, size) in matching_blocks(&old_lines, &new_lines) {
        let op = if i < ai && j < bj {
            Some(ChangeOp::Replace)
        } else if i < ai {
            Some(ChangeOp::Delete)
        } else if j < bj {
            Some(ChangeOp::Insert)
        } else {
            None
        };
        if let Some(op) = op {
            changes.push(Change {
                op,
                old: Span { start: i, end: ai, lines: old_lines[i..ai].iter().map(|l| (*l).to_string()).collect() },
                new: Span { start: j, end: bj, lines: new_lines[j..bj].iter().map(|l| (*l).to_string()).collect() },
            });
        }
        i = ai + size;
        j = bj + size;
    }

    Delta {
        changes,
        old_line_count: old_lines.len(),
        new_line_count: new_lines.len(),
        old_length: old_norm.chars().count(),
        new_length: new_norm.chars().count(),
    }
}

/// Applies a stored delta to `base`, reproducing the successor document.
///
/// The walker is deliberately tolerant: a delta that is not an object, has no
/// `changes` list, contains non-object changes, unknown ops, out-of-range
/// indices or ill-typed lines never panics. Structural damage is logged and
/// the affected change (or the whole delta) is skipped, falling back to `base`
/// so a corrupt row cannot take the read path down with it.
pub fn apply(base: &str, delta: &Value) -> String {
    let changes = match delta.get("changes").and_then(Value::as_array) {
        Some(changes) => changes,
        None => {
            warn!("Invalid delta structure: missing 'changes' list; returning base unchanged");
            return base.to_string();
        },
    };

    let base_norm = normalize(base);
    let old_lines = split_lines(&base_norm);
    let total_old = old_lines.len();

    let mut result: Vec<&str> = Vec::new();
    let mut cursor: usize = 0;
    for (idx, change) in changes.iter().enumerate() {
        let change = match change.as_object() {
            Some(change) => change,
            None => {
                warn!("Skipping invalid change at index {idx}");
                continue;
            },
        };

        let op = change.get("op").and_then(Value::as_str).unwrap_or("replace");
        let i1 = change.get("old").and_then(|o| o.get("start")).and_then(Value::as_u64).unwrap_or(0) as usize;
        let i2 = change.get("old").and_then(|o| o.get("end")).and_then(Value::as_u64).unwrap_or(0) as usize;
        let i1 = i1.min(total_old);
        let i2 = i2.min(total_old);

        if cursor < i1 {
            result.extend(&old_lines[cursor..i1]);
        }
        match op {
            "replace" | "insert" => {
                if let Some(lines) = change.get("new").and_then(|n| n.get("lines")).and_then(Value::as_array) {
                    result.extend(lines.iter().filter_map(Value::as_str));
                }
            },
            "delete" => {},
            other => {
                warn!("Unknown change op '{other}' at index {idx}; skipping");
            },
        }
        cursor = i2;
    }
    if cursor < total_old {
        result.extend(&old_lines[cursor..]);
    }

    result.join("\n")
}

/// As [`apply`], but for deltas persisted as raw JSON text. A string that does
/// not parse leaves `base` unchanged.
pub fn apply_str(base: &str, raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(delta) => apply(base, &delta),
        Err(err) => {
            warn!("Failed to parse raw delta ({err}); returning base unchanged");
            base.to_string()
        },
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn roundtrip(old: &str, new: &str) {
        let delta = compute(old, new);
        assert_eq!(apply(old, &delta.to_value()), new, "round-trip failed for {old:?} -> {new:?}");
    }

    #[test]
    fn compute_emits_only_unequal_spans() {
        let delta = compute("a\nb\nc", "a\nx\nc");
        assert_eq!(delta.changes.len(), 1);
        let change = &delta.changes[0];
        assert_eq!(change.op, ChangeOp::Replace);
        assert_eq!((change.old.start, change.old.end), (1, 2));
        assert_eq!((change.new.start, change.new.end), (1, 2));
        assert_eq!(change.old.lines, vec!["b"]);
        assert_eq!(change.new.lines, vec!["x"]);
        assert_eq!(delta.old_line_count, 3);
        assert_eq!(delta.new_line_count, 3);
    }

    #[test]
    fn compute_from_empty_is_a_single_insert() {
        let delta = compute("", "<h1>P</h1>");
        assert_eq!(delta.changes.len(), 1);
        assert_eq!(delta.changes[0].op, ChangeOp::Insert);
        assert_eq!(delta.old_line_count, 0);
        assert_eq!(delta.new_line_count, 1);
    }

    #[test]
    fn compute_to_empty_is_a_single_delete() {
        let delta = compute("a\nb", "");
        assert_eq!(delta.changes.len(), 1);
        assert_eq!(delta.changes[0].op, ChangeOp::Delete);
        assert_eq!(delta.new_line_count, 0);
    }

    #[test]
    fn roundtrip_law_holds() {
        roundtrip("", "");
        roundtrip("", "<h1>P</h1>");
        roundtrip("<h1>P</h1>", "");
        roundtrip("<h1>P</h1>", "<h1>P</h1>\n<p>X</p>");
        roundtrip("a\nb\nc\nd\ne", "a\nc\nd\nx\ne\nf");
        roundtrip("line", "completely different\nwith more lines");
        roundtrip("same\nsame\nsame", "same\nsame\nsame");
        roundtrip("<p>á é ü</p>\n<p>end</p>", "<p>á é ü</p>\n<p>mid</p>\n<p>end</p>");
    }

    #[test]
    fn roundtrip_with_repeated_lines() {
        roundtrip("x\nx\nx\ny\nx", "x\ny\nx\nx");
        roundtrip("<br>\n<br>\n<br>", "<br>\n<p>a</p>\n<br>\n<br>");
    }

    #[test]
    fn self_diff_normalizes_line_endings() {
        let base = "a\r\nb\rc";
        let delta = compute(base, base);
        assert!(delta.changes.is_empty());
        assert_eq!(apply(base, &delta.to_value()), "a\nb\nc");
    }

    #[test]
    fn crlf_input_diffs_like_lf() {
        let delta = compute("a\r\nb", "a\nb\nc");
        assert_eq!(apply("a\r\nb", &delta.to_value()), "a\nb\nc");
    }

    #[test]
    fn apply_tolerates_missing_changes() {
        assert_eq!(apply("base", &Value::Null), "base");
        assert_eq!(apply("base", &json!({})), "base");
        assert_eq!(apply("base", &json!({"changes": "nope"})), "base");
        assert_eq!(apply("base", &json!([1, 2, 3])), "base");
    }

    #[test]
    fn apply_skips_invalid_change_entries() {
        let delta = json!({"changes": [42, "x", null]});
        assert_eq!(apply("a\nb", &delta), "a\nb");
    }

    #[test]
    fn apply_clamps_out_of_range_spans() {
        let delta = json!({"changes": [
            {"op": "replace", "old": {"start": 90, "end": 120, "lines": []}, "new": {"start": 0, "end": 1, "lines": ["tail"]}},
        ]});
        assert_eq!(apply("a\nb", &delta), "a\nb\ntail");
    }

    #[test]
    fn apply_ignores_unknown_ops() {
        let delta = json!({"changes": [
            {"op": "transmogrify", "old": {"start": 0, "end": 1, "lines": ["a"]}, "new": {"start": 0, "end": 1, "lines": ["z"]}},
        ]});
        assert_eq!(apply("a\nb", &delta), "b");
    }

    #[test]
    fn apply_on_empty_base_with_delete_is_a_noop() {
        let delta = json!({"changes": [
            {"op": "delete", "old": {"start": 0, "end": 5, "lines": []}, "new": {"start": 0, "end": 0, "lines": []}},
        ]});
        assert_eq!(apply("", &delta), "");
    }

    #[test]
    fn apply_str_falls_back_on_parse_failure() {
        assert_eq!(apply_str("base", "{not json"), "base");
        assert_eq!(apply_str("a\nb", r#"{"changes": []}"#), "a\nb");
    }

    #[test]
    fn delta_serialization_is_stable() {
        let delta = compute("a", "b");
        let value = delta.to_value();
        assert_eq!(value["changes"][0]["op"], "replace");
        assert_eq!(value["old_line_count"], 1);
        assert_eq!(value["new_line_count"], 1);
        // Readers must tolerate unknown fields in stored deltas.
        let mut with_extra = value.clone();
        with_extra["some_future_field"] = json!(true);
        let reparsed: Delta = serde_json::from_value(with_extra).unwrap();
        assert_eq!(reparsed.changes.len(), 1);
    }
}
