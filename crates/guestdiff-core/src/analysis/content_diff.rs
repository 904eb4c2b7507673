/// Aligned content comparison of two file payloads.
///
/// Produces a classified row table (equal / inserted-left / inserted-right
/// / replaced) from two payloads, either as text lines or as fixed-width
/// hex rows for binary content. Output is diff data only; colouring and
/// layout belong to the frontend.
use serde::{Deserialize, Serialize};

/// Single line standing in for a side whose file does not exist, so the
/// renderer still produces an aligned table instead of an empty column.
pub const MISSING_SIDE_SENTINEL: &str = "[FILE DOES NOT EXIST]";

/// Byte tokens per row in binary mode. Diff granularity in binary mode is
/// per 32-byte row, not per byte; frontends rely on this exact width when
/// they lay out the two columns.
pub const BINARY_ROW_TOKENS: usize = 32;

/// Cell cap for the quadratic alignment table (~16 MB of `u32` at the
/// cap). Inputs whose line counts multiply out beyond this are aligned
/// positionally instead — still deterministic, just without
/// insertion/deletion detection.
const MAX_ALIGNMENT_CELLS: usize = 4_000_000;

/// How to interpret the payload bytes before aligning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffMode {
    Text,
    Binary,
}

/// Classification of one aligned row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    /// Both sides carry the same line.
    Equal,
    /// The line exists only on the left side.
    InsertedLeft,
    /// The line exists only on the right side.
    InsertedRight,
    /// Both sides carry a line, but the lines differ.
    Replaced,
}

/// One aligned row of the comparison table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffRow {
    pub kind: RowKind,
    pub left: Option<String>,
    pub right: Option<String>,
}

impl DiffRow {
    fn equal(line: &str) -> Self {
        Self {
            kind: RowKind::Equal,
            left: Some(line.to_string()),
            right: Some(line.to_string()),
        }
    }

    fn inserted_left(line: &str) -> Self {
        Self {
            kind: RowKind::InsertedLeft,
            left: Some(line.to_string()),
            right: None,
        }
    }

    fn inserted_right(line: &str) -> Self {
        Self {
            kind: RowKind::InsertedRight,
            left: None,
            right: Some(line.to_string()),
        }
    }

    fn replaced(left: &str, right: &str) -> Self {
        Self {
            kind: RowKind::Replaced,
            left: Some(left.to_string()),
            right: Some(right.to_string()),
        }
    }
}

/// Compare two payloads and return the aligned row table.
///
/// `None` marks a missing side (file absent on that disk) and renders as
/// the single [`MISSING_SIDE_SENTINEL`] line in either mode. In binary
/// mode each side is tokenized into uppercase two-digit hex bytes and
/// regrouped into rows of exactly [`BINARY_ROW_TOKENS`] tokens before
/// aligning; a side whose tokenization yields zero tokens falls back to
/// its raw lines.
pub fn diff_contents(left: Option<&[u8]>, right: Option<&[u8]>, mode: DiffMode) -> Vec<DiffRow> {
    let left_lines = side_lines(left, mode);
    let right_lines = side_lines(right, mode);
    align(&left_lines, &right_lines)
}

fn side_lines(payload: Option<&[u8]>, mode: DiffMode) -> Vec<String> {
    let bytes = match payload {
        None => return vec![MISSING_SIDE_SENTINEL.to_string()],
        Some(bytes) => bytes,
    };
    match mode {
        DiffMode::Text => text_lines(bytes),
        DiffMode::Binary => {
            let rows = hex_rows(bytes);
            if rows.is_empty() {
                text_lines(bytes)
            } else {
                rows
            }
        }
    }
}

/// Split a payload into lines, decoding invalid UTF-8 lossily. An empty
/// payload has no lines.
fn text_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_string)
        .collect()
}

/// Regroup a payload into rows of [`BINARY_ROW_TOKENS`] space-joined
/// uppercase hex byte tokens. The final row carries whatever is left.
fn hex_rows(bytes: &[u8]) -> Vec<String> {
    bytes
        .chunks(BINARY_ROW_TOKENS)
        .map(|chunk| {
            let tokens: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
            tokens.join(" ")
        })
        .collect()
}

/// Align two line sequences into classified rows.
///
/// The common prefix and suffix are peeled off first so the quadratic
/// table only covers the region where the sides actually disagree.
fn align(left: &[String], right: &[String]) -> Vec<DiffRow> {
    let prefix = left
        .iter()
        .zip(right.iter())
        .take_while(|(l, r)| l == r)
        .count();
    let suffix = left[prefix..]
        .iter()
        .rev()
        .zip(right[prefix..].iter().rev())
        .take_while(|(l, r)| l == r)
        .count();

    let mut rows: Vec<DiffRow> = left[..prefix].iter().map(|l| DiffRow::equal(l)).collect();
    rows.extend(align_middle(
        &left[prefix..left.len() - suffix],
        &right[prefix..right.len() - suffix],
    ));
    rows.extend(left[left.len() - suffix..].iter().map(|l| DiffRow::equal(l)));
    rows
}

fn align_middle(left: &[String], right: &[String]) -> Vec<DiffRow> {
    if left.is_empty() {
        return right.iter().map(|r| DiffRow::inserted_right(r)).collect();
    }
    if right.is_empty() {
        return left.iter().map(|l| DiffRow::inserted_left(l)).collect();
    }
    if left.len().saturating_mul(right.len()) > MAX_ALIGNMENT_CELLS {
        return pair_positionally(left, right);
    }

    // Longest-common-subsequence lengths, one row ahead: table[i][j] is
    // the LCS length of left[i..] and right[j..].
    let width = right.len() + 1;
    let mut table = vec![0u32; (left.len() + 1) * width];
    for i in (0..left.len()).rev() {
        for j in (0..right.len()).rev() {
            table[i * width + j] = if left[i] == right[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    // Walk the table forward, batching one-sided runs so an adjacent
    // delete/insert pair becomes a Replaced row rather than two rows.
    let mut rows = Vec::new();
    let mut pending_left: Vec<&String> = Vec::new();
    let mut pending_right: Vec<&String> = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        if left[i] == right[j] {
            flush_pending(&mut rows, &mut pending_left, &mut pending_right);
            rows.push(DiffRow::equal(&left[i]));
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            pending_left.push(&left[i]);
            i += 1;
        } else {
            pending_right.push(&right[j]);
            j += 1;
        }
    }
    pending_left.extend(&left[i..]);
    pending_right.extend(&right[j..]);
    flush_pending(&mut rows, &mut pending_left, &mut pending_right);
    rows
}

/// Emit batched one-sided runs: overlapping lines pair into Replaced rows,
/// the longer run's tail spills into one-sided rows.
fn flush_pending(
    rows: &mut Vec<DiffRow>,
    pending_left: &mut Vec<&String>,
    pending_right: &mut Vec<&String>,
) {
    let pairs = pending_left.len().min(pending_right.len());
    for k in 0..pairs {
        rows.push(DiffRow::replaced(pending_left[k], pending_right[k]));
    }
    for l in &pending_left[pairs..] {
        rows.push(DiffRow::inserted_left(l));
    }
    for r in &pending_right[pairs..] {
        rows.push(DiffRow::inserted_right(r));
    }
    pending_left.clear();
    pending_right.clear();
}

/// Degenerate alignment for oversized inputs: k-th line against k-th line,
/// tails one-sided.
fn pair_positionally(left: &[String], right: &[String]) -> Vec<DiffRow> {
    let pairs = left.len().min(right.len());
    let mut rows = Vec::with_capacity(left.len().max(right.len()));
    for k in 0..pairs {
        if left[k] == right[k] {
            rows.push(DiffRow::equal(&left[k]));
        } else {
            rows.push(DiffRow::replaced(&left[k], &right[k]));
        }
    }
    rows.extend(left[pairs..].iter().map(|l| DiffRow::inserted_left(l)));
    rows.extend(right[pairs..].iter().map(|r| DiffRow::inserted_right(r)));
    rows
}
