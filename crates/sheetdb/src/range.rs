//! A1-style range addressing for sheet-qualified ranges (`Table!A2:Z10`).
//!
//! Every range the stores send to a backend is built here, so the exact text
//! of those ranges is fixed in one place:
//!
//! | purpose        | text                     |
//! |----------------|--------------------------|
//! | header row     | `{table}!A1:Z1`          |
//! | single row     | `{table}!A{row}:Z{row}`  |
//! | row slice      | `{table}!A{start}:Z{end}`|
//! | write anchor   | `{table}!A{row}`         |
//! | open data area | `{table}!A{start}:Z`     |
//!
//! Columns are capped at `Z` (26 columns) throughout.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Index of column `Z`, the widest column any store reads or writes.
pub const LAST_COLUMN: u32 = 25;

/// Row 1 holds headers/titles; data starts on this row.
pub const FIRST_DATA_ROW: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeParseError {
    #[error("empty range")]
    Empty,
    #[error("range {0:?} is not qualified by a table name")]
    MissingTable(String),
    #[error("invalid column in {0:?}")]
    Column(String),
    #[error("invalid row in {0:?}")]
    Row(String),
    #[error("range {0:?} has no start row")]
    OpenStart(String),
}

/// A rectangle of cells. Columns are 0-based (`A` = 0); rows are sheet rows
/// (1-based). `end_row: None` runs down to the last occupied row (`A2:Z`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start_col: u32,
    pub start_row: u32,
    pub end_col: u32,
    pub end_row: Option<u32>,
}

impl Range {
    /// Full-width rows `first..=last`.
    pub fn rows(first: u32, last: u32) -> Self {
        let first = first.max(1);
        Self {
            start_col: 0,
            start_row: first,
            end_col: LAST_COLUMN,
            end_row: Some(last.max(first)),
        }
    }

    /// Full-width rows from `first` down.
    pub fn rows_from(first: u32) -> Self {
        Self {
            start_col: 0,
            start_row: first.max(1),
            end_col: LAST_COLUMN,
            end_row: None,
        }
    }

    /// Column `A` of `row`.
    pub fn anchor(row: u32) -> Self {
        let row = row.max(1);
        Self {
            start_col: 0,
            start_row: row,
            end_col: 0,
            end_row: Some(row),
        }
    }

    pub fn is_single_cell(&self) -> bool {
        self.start_col == self.end_col && self.end_row == Some(self.start_row)
    }

    /// Parse `B3`, `A1:Z10` or `A2:Z`. `$` markers are ignored.
    pub fn parse(text: &str) -> Result<Self, RangeParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RangeParseError::Empty);
        }
        let (first, last) = text.split_once(':').unwrap_or((text, text));
        let (col_a, row_a) = parse_ref(first)?;
        let row_a = row_a.ok_or_else(|| RangeParseError::OpenStart(text.to_string()))?;
        let (col_b, row_b) = parse_ref(last)?;
        Ok(Self {
            start_col: col_a.min(col_b),
            start_row: row_b.map_or(row_a, |b| row_a.min(b)),
            end_col: col_a.max(col_b),
            end_row: row_b.map(|b| row_a.max(b)),
        })
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_name(self.start_col), self.start_row)?;
        if self.is_single_cell() {
            return Ok(());
        }
        write!(f, ":{}", column_name(self.end_col))?;
        if let Some(row) = self.end_row {
            write!(f, "{row}")?;
        }
        Ok(())
    }
}

/// A range qualified by the table (tab) it lives in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SheetRange {
    pub table: String,
    pub range: Range,
}

impl SheetRange {
    pub fn new(table: impl Into<String>, range: Range) -> Self {
        Self {
            table: table.into(),
            range,
        }
    }

    /// `{table}!A1:Z1`
    pub fn header(table: &str) -> Self {
        Self::row(table, 1)
    }

    /// `{table}!A{row}:Z{row}`
    pub fn row(table: &str, row: u32) -> Self {
        Self::rows(table, row, row)
    }

    /// `{table}!A{start}:Z{end}`
    pub fn rows(table: &str, start: u32, end: u32) -> Self {
        Self::new(table, Range::rows(start, end))
    }

    /// `{table}!A{row}`, the anchor for writes and appends.
    pub fn anchor(table: &str, row: u32) -> Self {
        Self::new(table, Range::anchor(row))
    }

    /// `{table}!A{start}:Z`
    pub fn open_rows(table: &str, start: u32) -> Self {
        Self::new(table, Range::rows_from(start))
    }

    /// Parse `Table!A1:Z1`. The table name may be single-quoted with `''` escapes.
    pub fn parse(text: &str) -> Result<Self, RangeParseError> {
        let missing = || RangeParseError::MissingTable(text.to_string());
        let (table, range) = text.rsplit_once('!').ok_or_else(missing)?;
        let table = match table.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
            Some(quoted) => quoted.replace("''", "'"),
            None => table.to_string(),
        };
        if table.is_empty() {
            return Err(missing());
        }
        Ok(Self::new(table, Range::parse(range)?))
    }
}

impl fmt::Display for SheetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.table, self.range)
    }
}

/// Recover the first written row from an append response's `updatedRange`
/// (e.g. `Users!A7:D8` yields `7`).
///
/// Returns `None` when the text does not contain `!A<digits>:` or the row is zero.
pub fn appended_start_row(updated_range: &str) -> Option<u32> {
    static APPEND_START_RE: OnceLock<Regex> = OnceLock::new();
    let re = APPEND_START_RE.get_or_init(|| Regex::new(r"!A([0-9]+):").expect("valid regex"));
    let row: u32 = re.captures(updated_range)?.get(1)?.as_str().parse().ok()?;
    (row > 0).then_some(row)
}

/// Letters of a 0-based column index (`0` is `A`, `26` is `AA`).
pub(crate) fn column_name(col: u32) -> String {
    let mut n = u64::from(col) + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(char::from(b'A' + (n % 26) as u8));
        n /= 26;
    }
    letters.iter().rev().collect()
}

/// `B12` → `(1, Some(12))`, `B` → `(1, None)`.
fn parse_ref(text: &str) -> Result<(u32, Option<u32>), RangeParseError> {
    let cleaned = text.trim().replace('$', "");
    let split = cleaned
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(cleaned.len());
    let (letters, digits) = cleaned.split_at(split);

    let col = letters
        .bytes()
        .try_fold(0u32, |acc, b| {
            acc.checked_mul(26)?
                .checked_add(u32::from(b.to_ascii_uppercase() - b'A') + 1)
        })
        .filter(|n| *n > 0)
        .ok_or_else(|| RangeParseError::Column(text.to_string()))?;

    if digits.is_empty() {
        return Ok((col - 1, None));
    }
    match digits.parse::<u32>() {
        Ok(row) if row > 0 => Ok((col - 1, Some(row))),
        _ => Err(RangeParseError::Row(text.to_string())),
    }
}
