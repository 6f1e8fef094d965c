// ============================================================
// TABLE TYPES
// ============================================================
// Raw tokenized CSV and the normalized, name-keyed output table

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Header consulted for a row title when no designated column yields one.
pub const CUSTOMER_NAME_COLUMN: &str = "Customer Name";

const MAX_FILENAME_LEN: usize = 80;

static UNSAFE_FILENAME_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\s-]").unwrap());
static WHITESPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// One output row, keyed by output header name.
pub type Record = HashMap<String, String>;

/// Tokenized CSV: first record as headers, the rest as (possibly ragged) rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Cell at `index`, with short rows treated as padded by empty cells.
pub fn cell_at(row: &[String], index: usize) -> &str {
    row.get(index).map(String::as_str).unwrap_or("")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Record>,
}

impl NormalizedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Display title for row `index` (0-based). See [`resolve_title`].
    pub fn title_for(&self, index: usize, title_column: Option<&str>) -> String {
        match self.rows.get(index) {
            Some(record) => resolve_title(&self.headers, record, index, title_column),
            None => fallback_title(index),
        }
    }
}

/// Resolve a row's title in priority order:
/// designated column, then "Customer Name" (both trimmed), then the first
/// header's value as-is, then `row_{n}` with the 1-based ordinal.
pub fn resolve_title(
    headers: &[String],
    record: &Record,
    index: usize,
    title_column: Option<&str>,
) -> String {
    let non_empty = |column: &str| {
        record
            .get(column)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    title_column
        .and_then(non_empty)
        .or_else(|| non_empty(CUSTOMER_NAME_COLUMN))
        .or_else(|| {
            headers
                .first()
                .and_then(|first| record.get(first))
                .filter(|value| !value.is_empty())
                .cloned()
        })
        .unwrap_or_else(|| fallback_title(index))
}

fn fallback_title(index: usize) -> String {
    format!("row_{}", index + 1)
}

/// Reduce a title to a filesystem-safe stem: ASCII alphanumerics, `-` and `_` only,
/// whitespace collapsed to `_`, at most 80 chars, `row` if nothing is left.
pub fn sanitize_filename(title: &str) -> String {
    let stripped = UNSAFE_FILENAME_CHARS.replace_all(title, "");
    let collapsed = WHITESPACE_RUNS.replace_all(stripped.trim(), "_");
    let stem: String = collapsed.chars().take(MAX_FILENAME_LEN).collect();
    if stem.is_empty() {
        "row".to_string()
    } else {
        stem
    }
}

/// Hands out `{stem}.{ext}` names, suffixing `_2`, `_3`, ... on collisions.
#[derive(Debug, Default)]
pub struct FilenameAllocator {
    taken: HashSet<String>,
}

impl FilenameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, title: &str, extension: &str) -> String {
        let stem = sanitize_filename(title);
        let mut candidate = format!("{}.{}", stem, extension);
        let mut counter = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{}_{}.{}", stem, counter, extension);
            counter += 1;
        }
        self.taken.insert(candidate.clone());
        candidate
    }
}
