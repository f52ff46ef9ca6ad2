//! In-process sort / filter / query / pagination over materialized records.
//!
//! [`apply`] runs a fixed pipeline, always in this order:
//!
//! 1. sort ascending (stable) by one or more keys
//! 2. reverse the whole sequence when `sort_desc` is set, sorted or not
//! 3. structural filter: keep records partially deep-equal to a pattern object
//! 4. predicate query (see [`Predicate::parse`])
//! 5. drop `offset` records when `offset > 0`
//! 6. keep `limit` records when `limit > 0`
//!
//! A missing option skips its stage. A `filter` or `query` that is not a JSON
//! object is treated as missing.

use std::borrow::Cow;
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{FieldPath, Record};
use crate::error::{Result, SheetDbError};

pub const DEFAULT_SEARCH_LIMIT: i64 = 25;

/// One sort key or an ordered list of keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortKeys {
    One(String),
    Many(Vec<String>),
}

impl SortKeys {
    pub fn paths(&self) -> Vec<FieldPath> {
        match self {
            SortKeys::One(key) => vec![FieldPath::parse(key)],
            SortKeys::Many(keys) => keys.iter().map(|k| FieldPath::parse(k)).collect(),
        }
    }
}

impl From<&str> for SortKeys {
    fn from(key: &str) -> Self {
        SortKeys::One(key.to_string())
    }
}

impl<const N: usize> From<[&str; N]> for SortKeys {
    fn from(keys: [&str; N]) -> Self {
        SortKeys::Many(keys.iter().map(|k| k.to_string()).collect())
    }
}

impl From<Vec<String>> for SortKeys {
    fn from(keys: Vec<String>) -> Self {
        SortKeys::Many(keys)
    }
}

/// Options for [`crate::BasicStore::search`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchOptions {
    /// Max records returned; `<= 0` means unbounded (default: 25).
    pub limit: i64,
    /// Records skipped after filtering (default: 0).
    pub offset: i64,
    pub sort: Option<SortKeys>,
    pub sort_desc: bool,
    /// Pattern object, e.g. `{"id": 2}`.
    pub filter: Option<Value>,
    /// Predicate object, e.g. `{"id": {"$gt": 1, "$lte": 3}}`.
    pub query: Option<Value>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SEARCH_LIMIT,
            offset: 0,
            sort: None,
            sort_desc: false,
            filter: None,
            query: None,
        }
    }
}

impl SearchOptions {
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_sort(mut self, keys: impl Into<SortKeys>) -> Self {
        self.sort = Some(keys.into());
        self
    }

    pub fn descending(mut self) -> Self {
        self.sort_desc = true;
        self
    }

    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_query(mut self, query: Value) -> Self {
        self.query = Some(query);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A compiled query predicate.
///
/// Grammar of the JSON form accepted by [`Predicate::parse`]:
///
/// ```text
/// query    := { clause, ... }                      all clauses must hold
/// clause   := "$and": [query, ...]
///           | "$or":  [query, ...]
///           | field: scalar-or-object              equality
///           | field: { op: operand, ... }          every operator must hold
/// op       := $eq | $ne | $gt | $gte | $lt | $lte  operand: any value
///           | $in | $nin                           operand: array
/// ```
///
/// `field` may be dotted or `_row`. Ordering operators only hold between two
/// numbers or two strings.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        path: FieldPath,
        op: CmpOp,
        value: Value,
    },
    In {
        path: FieldPath,
        values: Vec<Value>,
    },
    NotIn {
        path: FieldPath,
        values: Vec<Value>,
    },
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    /// Compile a query object. Returns `Ok(None)` when `query` is not an object.
    pub fn parse(query: &Value) -> Result<Option<Predicate>> {
        match query {
            Value::Object(_) => parse_clauses(query).map(Some),
            _ => Ok(None),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::Compare { path, op, value } => {
                let actual = record.lookup(path);
                let actual = actual.as_deref().unwrap_or(&Value::Null);
                compare(actual, *op, value)
            }
            Predicate::In { path, values } => {
                let actual = record.lookup(path);
                let actual = actual.as_deref().unwrap_or(&Value::Null);
                values.iter().any(|v| values_equal(actual, v))
            }
            Predicate::NotIn { path, values } => {
                let actual = record.lookup(path);
                let actual = actual.as_deref().unwrap_or(&Value::Null);
                !values.iter().any(|v| values_equal(actual, v))
            }
            Predicate::All(preds) => preds.iter().all(|p| p.matches(record)),
            Predicate::Any(preds) => preds.iter().any(|p| p.matches(record)),
        }
    }
}

fn parse_clauses(query: &Value) -> Result<Predicate> {
    let Value::Object(map) = query else {
        return Err(SheetDbError::InvalidQuery(format!(
            "expected a query object, got {query}"
        )));
    };

    let mut clauses = Vec::with_capacity(map.len());
    for (key, operand) in map {
        match key.as_str() {
            "$and" | "$or" => {
                let Value::Array(items) = operand else {
                    return Err(SheetDbError::InvalidQuery(format!("{key} expects an array")));
                };
                let parsed = items.iter().map(parse_clauses).collect::<Result<Vec<_>>>()?;
                clauses.push(if key == "$and" {
                    Predicate::All(parsed)
                } else {
                    Predicate::Any(parsed)
                });
            }
            op if op.starts_with('$') => {
                return Err(SheetDbError::InvalidQuery(format!("unknown operator {op}")));
            }
            field => clauses.push(parse_field(FieldPath::parse(field), operand)?),
        }
    }

    Ok(match clauses.len() {
        1 => clauses.remove(0),
        _ => Predicate::All(clauses),
    })
}

fn parse_field(path: FieldPath, operand: &Value) -> Result<Predicate> {
    let ops = match operand {
        Value::Object(map) if !map.is_empty() && map.keys().any(|k| k.starts_with('$')) => map,
        _ => {
            return Ok(Predicate::Compare {
                path,
                op: CmpOp::Eq,
                value: operand.clone(),
            })
        }
    };

    let mut preds = Vec::with_capacity(ops.len());
    for (op, value) in ops {
        let cmp = match op.as_str() {
            "$eq" => CmpOp::Eq,
            "$ne" => CmpOp::Ne,
            "$gt" => CmpOp::Gt,
            "$gte" => CmpOp::Gte,
            "$lt" => CmpOp::Lt,
            "$lte" => CmpOp::Lte,
            "$in" | "$nin" => {
                let Value::Array(values) = value else {
                    return Err(SheetDbError::InvalidQuery(format!(
                        "{op} on {path} expects an array"
                    )));
                };
                let path = path.clone();
                let values = values.clone();
                preds.push(if op == "$in" {
                    Predicate::In { path, values }
                } else {
                    Predicate::NotIn { path, values }
                });
                continue;
            }
            other => {
                return Err(SheetDbError::InvalidQuery(format!(
                    "unknown operator {other} on {path}"
                )))
            }
        };
        preds.push(Predicate::Compare {
            path: path.clone(),
            op: cmp,
            value: value.clone(),
        });
    }

    Ok(match preds.len() {
        1 => preds.remove(0),
        _ => Predicate::All(preds),
    })
}

fn compare(actual: &Value, op: CmpOp, expected: &Value) -> bool {
    match op {
        CmpOp::Eq => values_equal(actual, expected),
        CmpOp::Ne => !values_equal(actual, expected),
        CmpOp::Gt => ordered(actual, expected) == Some(Ordering::Greater),
        CmpOp::Gte => matches!(
            ordered(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CmpOp::Lt => ordered(actual, expected) == Some(Ordering::Less),
        CmpOp::Lte => matches!(
            ordered(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
    }
}

/// Ordering between two numbers or two strings; anything else is incomparable.
fn ordered(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Deep equality where numbers compare by value (`2 == 2.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => a == b,
    }
}

/// Partial deep equality: every key of an object pattern must match.
pub fn is_match(actual: &Value, pattern: &Value) -> bool {
    match (actual, pattern) {
        (Value::Object(actual), Value::Object(pattern)) => pattern
            .iter()
            .all(|(k, p)| actual.get(k).is_some_and(|a| is_match(a, p))),
        _ => values_equal(actual, pattern),
    }
}

fn record_matches(record: &Record, pattern: &serde_json::Map<String, Value>) -> bool {
    pattern.iter().all(|(key, expected)| {
        record
            .lookup(&FieldPath::parse(key))
            .is_some_and(|actual| is_match(&actual, expected))
    })
}

/// Rank used to order values of different JSON types in a sort.
fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        Some(Value::Bool(_)) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Array(_) | Value::Object(_)) => 3,
        Some(Value::Null) => 4,
        None => 5,
    }
}

/// Ascending sort order: booleans, numbers, strings, arrays/objects, null, missing.
fn sort_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (
            Some(x @ (Value::Array(_) | Value::Object(_))),
            Some(y @ (Value::Array(_) | Value::Object(_))),
        ) => x.to_string().cmp(&y.to_string()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn sort_records(records: &mut [Record], keys: &[FieldPath]) {
    records.sort_by(|a, b| {
        keys.iter()
            .map(|key| {
                let x: Option<Cow<'_, Value>> = a.lookup(key);
                let y: Option<Cow<'_, Value>> = b.lookup(key);
                sort_cmp(x.as_deref(), y.as_deref())
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

/// Run the search pipeline over `records`.
pub fn apply(mut records: Vec<Record>, options: &SearchOptions) -> Result<Vec<Record>> {
    if let Some(sort) = &options.sort {
        sort_records(&mut records, &sort.paths());
    }

    if options.sort_desc {
        records.reverse();
    }

    if let Some(Value::Object(pattern)) = &options.filter {
        records.retain(|record| record_matches(record, pattern));
    }

    if let Some(query) = &options.query {
        if let Some(predicate) = Predicate::parse(query)? {
            records.retain(|record| predicate.matches(record));
        }
    }

    if options.offset > 0 {
        let skip = usize::try_from(options.offset).unwrap_or(usize::MAX);
        records.drain(..skip.min(records.len()));
    }

    if options.limit > 0 {
        let take = usize::try_from(options.limit).unwrap_or(usize::MAX);
        records.truncate(take);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users() -> Vec<Record> {
        [
            json!({"_row": 2, "id": 1, "name": "user1", "isAdmin": true}),
            json!({"_row": 3, "id": 2, "name": "user2", "isAdmin": false}),
            json!({"_row": 4, "id": 3, "name": "user3", "isAdmin": false}),
            json!({"_row": 5, "id": 4, "name": "user4", "isAdmin": false}),
        ]
        .into_iter()
        .map(|v| serde_json::from_value(v).unwrap())
        .collect()
    }

    fn ids(records: &[Record]) -> Vec<i64> {
        records
            .iter()
            .map(|r| r.get("id").and_then(Value::as_i64).unwrap())
            .collect()
    }

    fn unbounded() -> SearchOptions {
        SearchOptions::default().with_limit(0)
    }

    #[test]
    fn no_options_keeps_fetch_order() {
        let out = apply(users(), &SearchOptions::default()).unwrap();
        assert_eq!(ids(&out), vec![1, 2, 3, 4]);
    }

    #[test]
    fn sort_then_reverse() {
        let out = apply(users(), &unbounded().with_sort("id").descending()).unwrap();
        assert_eq!(ids(&out), vec![4, 3, 2, 1]);
    }

    #[test]
    fn multi_key_sort_is_reversed_as_a_whole() {
        let out = apply(
            users(),
            &unbounded().with_sort(["isAdmin", "name"]).descending(),
        )
        .unwrap();
        assert_eq!(ids(&out), vec![1, 4, 3, 2]);
    }

    #[test]
    fn sort_desc_without_sort_reverses_fetch_order() {
        let out = apply(users(), &unbounded().descending()).unwrap();
        assert_eq!(ids(&out), vec![4, 3, 2, 1]);
    }

    #[test]
    fn sort_is_stable_and_puts_missing_last() {
        let mut records = users();
        records[1].fields.remove("name");
        let out = apply(records, &unbounded().with_sort("isAdmin")).unwrap();
        assert_eq!(ids(&out), vec![2, 3, 4, 1]);

        let mut records = users();
        records[0].fields.remove("name");
        let out = apply(records, &unbounded().with_sort("name")).unwrap();
        assert_eq!(ids(&out), vec![2, 3, 4, 1]);
    }

    #[test]
    fn filter_matches_exactly() {
        let out = apply(users(), &unbounded().with_filter(json!({"id": 2}))).unwrap();
        assert_eq!(ids(&out), vec![2]);

        let out = apply(
            users(),
            &unbounded().with_filter(json!({"isAdmin": false, "name": "user4"})),
        )
        .unwrap();
        assert_eq!(ids(&out), vec![4]);

        let out = apply(users(), &unbounded().with_filter(json!({"id": "2"}))).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn non_object_filter_and_query_are_skipped() {
        let options = unbounded()
            .with_filter(json!("id"))
            .with_query(json!([1, 2]));
        let out = apply(users(), &options).unwrap();
        assert_eq!(ids(&out), vec![1, 2, 3, 4]);
    }

    #[test]
    fn query_with_numeric_bounds() {
        let out = apply(
            users(),
            &unbounded().with_query(json!({"id": {"$gt": 1, "$lte": 3}})),
        )
        .unwrap();
        assert_eq!(ids(&out), vec![2, 3]);
    }

    #[test]
    fn query_membership_and_logic() {
        let out = apply(
            users(),
            &unbounded().with_query(json!({"id": {"$in": [1, 4, 9]}})),
        )
        .unwrap();
        assert_eq!(ids(&out), vec![1, 4]);

        let out = apply(
            users(),
            &unbounded().with_query(json!({"$or": [{"id": 1}, {"name": {"$gte": "user4"}}]})),
        )
        .unwrap();
        assert_eq!(ids(&out), vec![1, 4]);

        let out = apply(
            users(),
            &unbounded().with_query(json!({"isAdmin": false, "id": {"$nin": [2], "$ne": 3}})),
        )
        .unwrap();
        assert_eq!(ids(&out), vec![4]);

        let out = apply(users(), &unbounded().with_query(json!({"_row": {"$lt": 4}}))).unwrap();
        assert_eq!(ids(&out), vec![1, 2]);
    }

    #[test]
    fn ordering_operators_ignore_mismatched_types() {
        let out = apply(users(), &unbounded().with_query(json!({"name": {"$gt": 0}}))).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn unknown_operators_are_rejected() {
        let err = apply(users(), &unbounded().with_query(json!({"id": {"$near": 1}})))
            .unwrap_err();
        assert!(matches!(err, SheetDbError::InvalidQuery(_)));

        let err = apply(users(), &unbounded().with_query(json!({"id": {"$in": 1}})))
            .unwrap_err();
        assert!(matches!(err, SheetDbError::InvalidQuery(_)));
    }

    #[test]
    fn offset_and_limit_apply_last() {
        let out = apply(users(), &SearchOptions::default().with_offset(1).with_limit(2)).unwrap();
        assert_eq!(ids(&out), vec![2, 3]);

        let out = apply(users(), &SearchOptions::default().with_offset(10)).unwrap();
        assert!(out.is_empty());

        let out = apply(users(), &SearchOptions::default().with_limit(-1)).unwrap();
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: SearchOptions =
            serde_json::from_value(json!({"sort": ["isAdmin", "name"], "sortDesc": true}))
                .unwrap();
        assert_eq!(options.limit, DEFAULT_SEARCH_LIMIT);
        assert_eq!(options.offset, 0);
        assert_eq!(
            options.sort,
            Some(SortKeys::Many(vec!["isAdmin".into(), "name".into()]))
        );
        assert!(options.sort_desc);

        let options: SearchOptions = serde_json::from_value(json!({"sort": "id"})).unwrap();
        assert_eq!(options.sort, Some(SortKeys::One("id".into())));
    }

    #[test]
    fn numbers_compare_by_value() {
        assert!(values_equal(&json!(2), &json!(2.0)));
        assert!(!values_equal(&json!(2), &json!("2")));
        assert!(is_match(
            &json!({"a": {"b": 1, "c": 2}}),
            &json!({"a": {"b": 1.0}})
        ));
    }
}
