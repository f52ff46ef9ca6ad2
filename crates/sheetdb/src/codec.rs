//! Conversion between raw cell grids and typed records.
//!
//! Decoding infers a scalar type for every cell:
//! - `^-?[0-9]+(\.[0-9]+)?$` becomes a number (integers stay integers)
//! - `true` / `false` in any letter case become booleans
//! - anything else stays a string
//!
//! Column names containing dots address nested objects: a column named
//! `address.city` reads and writes `{"address": {"city": ...}}`.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::client::RawGrid;
use crate::range::FIRST_DATA_ROW;

/// Field values of a record, keyed by column name (or nested by path segment).
pub type Fields = Map<String, Value>;

/// Name of the synthetic row-position field.
pub const ROW_FIELD: &str = "_row";

/// Row position of the record returned when a requested row is empty.
pub const NOT_FOUND_ROW: i64 = -99;

/// A dotted column name split into its path segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(name: &str) -> Self {
        Self {
            raw: name.to_string(),
            segments: name.split('.').map(str::to_string).collect(),
        }
    }

    /// The name as written, dots included.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Resolve against `fields`. A literal key equal to the full name wins
    /// over nested lookup.
    pub fn get<'a>(&self, fields: &'a Fields) -> Option<&'a Value> {
        if let Some(value) = fields.get(&self.raw) {
            return Some(value);
        }
        let (first, rest) = self.segments.split_first()?;
        rest.iter()
            .try_fold(fields.get(first)?, |value, segment| value.as_object()?.get(segment))
    }

    /// Assign `value`, creating (or replacing non-object) intermediate objects.
    pub fn set(&self, fields: &mut Fields, value: Value) {
        let Some((last, parents)) = self.segments.split_last() else {
            return;
        };
        let mut target = fields;
        for segment in parents {
            let slot = target
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            target = match slot {
                Value::Object(map) => map,
                _ => unreachable!("slot was just made an object"),
            };
        }
        target.insert(last.clone(), value);
    }
}

impl From<&str> for FieldPath {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl From<String> for FieldPath {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// One table row as a record, stamped with its 1-based sheet row.
///
/// Serializes flat, with the row position under `_row`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "_row")]
    pub row: i64,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    pub fn new(row: i64) -> Self {
        Self {
            row,
            fields: Fields::new(),
        }
    }

    pub fn with_fields(row: i64, fields: Fields) -> Self {
        Self { row, fields }
    }

    /// The sentinel returned for a row with no data.
    pub fn not_found() -> Self {
        Self::new(NOT_FOUND_ROW)
    }

    pub fn is_not_found(&self) -> bool {
        self.row == NOT_FOUND_ROW
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        FieldPath::parse(path).get(&self.fields)
    }

    pub fn set(&mut self, path: &str, value: impl Into<Value>) {
        FieldPath::parse(path).set(&mut self.fields, value.into());
    }

    /// Like [`FieldPath::get`], but `_row` resolves to the row position.
    pub fn lookup(&self, path: &FieldPath) -> Option<Cow<'_, Value>> {
        if path.as_str() == ROW_FIELD {
            return Some(Cow::Owned(Value::from(self.row)));
        }
        path.get(&self.fields).map(Cow::Borrowed)
    }

    pub fn into_fields(self) -> Fields {
        self.fields
    }
}

/// Infer the scalar a raw cell holds.
pub fn infer_scalar(cell: &str) -> Value {
    if let Some(number) = parse_number(cell) {
        return Value::Number(number);
    }
    if cell.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if cell.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    Value::String(cell.to_string())
}

fn parse_number(cell: &str) -> Option<Number> {
    let digits = cell.strip_prefix('-').unwrap_or(cell);
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int) || !frac.map_or(true, all_digits) {
        return None;
    }
    if frac.is_none() {
        if let Ok(n) = cell.parse::<i64>() {
            return Some(Number::from(n));
        }
    }
    cell.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Text written to a cell for `value`. Null becomes empty.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => decimal_text(f),
            _ => n.to_string(),
        },
        nested => nested.to_string(),
    }
}

/// Plain decimal text for a float, never exponent notation. Integral values
/// keep a `.0` so they decode back as floats.
fn decimal_text(f: f64) -> String {
    let text = f.to_string();
    if f.is_finite() && !text.contains('.') {
        format!("{text}.0")
    } else {
        text
    }
}

/// Decode raw rows into records. Row `i` is stamped `row_offset + i + 2`.
pub fn decode_rows(columns: &[String], rows: &[Vec<String>], row_offset: i64) -> Vec<Record> {
    let paths: Vec<FieldPath> = columns.iter().map(|c| FieldPath::parse(c)).collect();
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let position = row_offset + i as i64 + i64::from(FIRST_DATA_ROW);
            let mut record = Record::new(position);
            for (j, path) in paths.iter().enumerate() {
                let cell = row.get(j).map(String::as_str).unwrap_or("");
                path.set(&mut record.fields, infer_scalar(cell));
            }
            record
        })
        .collect()
}

/// Encode records into one row per record, one cell per column in schema order.
pub fn encode_records<'a, I>(columns: &[String], records: I) -> RawGrid
where
    I: IntoIterator<Item = &'a Fields>,
{
    let paths: Vec<FieldPath> = columns.iter().map(|c| FieldPath::parse(c)).collect();
    records
        .into_iter()
        .map(|fields| {
            paths
                .iter()
                .map(|path| path.get(fields).map(stringify).unwrap_or_default())
                .collect()
        })
        .collect()
}
