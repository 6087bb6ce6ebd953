//! Value representations for the dolt-sync framework.
//!
//! Rows are keyed by column name internally. Positional tuples are only
//! accepted at the boundary through [`PositionalRows`], which carries the
//! column order the tuples were produced in.

use crate::schema::SchemaError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

/// A single scalar value read from or written to a SQL table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    /// SQL NULL
    Null,

    /// Boolean value (TINYINT(1) / BOOLEAN)
    Bool(bool),

    /// Signed integer of any width
    Int(i64),

    /// Unsigned integer of any width
    UInt(u64),

    /// 32-bit floating point
    Float(f32),

    /// 64-bit floating point
    Double(f64),

    /// Exact decimal kept in its textual form to avoid precision loss
    Decimal(String),

    /// Character data
    Text(String),

    /// Binary data
    Bytes(Vec<u8>),

    /// Calendar date
    Date(NaiveDate),

    /// Time of day
    Time(NaiveTime),

    /// Date and time without timezone (DATETIME / TIMESTAMP)
    DateTime(NaiveDateTime),

    /// JSON document
    Json(serde_json::Value),
}

impl SqlValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Try to get this value as an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::UInt(u) => i64::try_from(*u).ok(),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Decimal(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::UInt(u) => write!(f, "{u}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Decimal(s) | Self::Text(s) => write!(f, "{s}"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Self::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f")),
            Self::Json(j) => write!(f, "{j}"),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for SqlValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<u64> for SqlValue {
    fn from(u: u64) -> Self {
        Self::UInt(u)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(dt: NaiveDateTime) -> Self {
        Self::DateTime(dt)
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(j: serde_json::Value) -> Self {
        Self::Json(j)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// A table row keyed by column name.
///
/// Iteration order is the lexicographic order of the column names, which makes
/// rows comparable regardless of the column order they were produced in.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, SqlValue>);

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    /// Set a column value, returning the previous one.
    pub fn insert(&mut self, column: impl Into<String>, value: SqlValue) -> Option<SqlValue> {
        self.0.insert(column.into(), value)
    }

    /// Get the value of a column.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.0.get(column)
    }

    /// Remove a column from the row.
    pub fn remove(&mut self, column: &str) -> Option<SqlValue> {
        self.0.remove(column)
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    /// Column names carried by this row, sorted.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, SqlValue> {
        self.0.iter()
    }

    /// Values for `columns` in the given order. Absent columns yield `Null`.
    pub fn values_in<S: AsRef<str>>(&self, columns: &[S]) -> Vec<SqlValue> {
        columns
            .iter()
            .map(|c| self.0.get(c.as_ref()).cloned().unwrap_or(SqlValue::Null))
            .collect()
    }

    /// A new row holding only the named columns that are present.
    pub fn subset<S: AsRef<str>>(&self, columns: &[S]) -> Row {
        columns
            .iter()
            .filter_map(|c| {
                self.0
                    .get_key_value(c.as_ref())
                    .map(|(k, v)| (k.clone(), v.clone()))
            })
            .collect()
    }
}

impl FromIterator<(String, SqlValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, SqlValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Row {
    type Item = (String, SqlValue);
    type IntoIter = btree_map::IntoIter<String, SqlValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = (&'a String, &'a SqlValue);
    type IntoIter = btree_map::Iter<'a, String, SqlValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Positional row tuples paired with the column order they were produced in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionalRows {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
}

impl PositionalRows {
    /// Create an empty tuple set with the given column order.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Flatten named rows into tuples following `columns`.
    pub fn from_rows(columns: Vec<String>, rows: &[Row]) -> Self {
        let rows = rows.iter().map(|r| r.values_in(&columns)).collect();
        Self { columns, rows }
    }

    /// Append a tuple; its arity must match the column order.
    pub fn push(&mut self, tuple: Vec<SqlValue>) -> Result<(), SchemaError> {
        if tuple.len() != self.columns.len() {
            return Err(SchemaError::ArityMismatch {
                row_index: self.rows.len(),
                expected: self.columns.len(),
                actual: tuple.len(),
            });
        }
        self.rows.push(tuple);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn tuples(&self) -> &[Vec<SqlValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Convert the tuples into name-keyed rows.
    pub fn into_rows(self) -> Result<Vec<Row>, SchemaError> {
        let Self { columns, rows } = self;
        rows.into_iter()
            .enumerate()
            .map(|(row_index, tuple)| {
                if tuple.len() != columns.len() {
                    return Err(SchemaError::ArityMismatch {
                        row_index,
                        expected: columns.len(),
                        actual: tuple.len(),
                    });
                }
                Ok(columns.iter().cloned().zip(tuple).collect())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_order_is_independent_of_insertion_order() {
        let a = Row::new().with("b", 2).with("a", 1);
        let b = Row::new().with("a", 1).with("b", 2);
        assert_eq!(a, b);
        assert_eq!(a.columns().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_values_in_fills_missing_with_null() {
        let row = Row::new().with("id", 7).with("name", "x");
        let values = row.values_in(&["name", "missing", "id"]);
        assert_eq!(
            values,
            vec![SqlValue::from("x"), SqlValue::Null, SqlValue::Int(7)]
        );
    }

    #[test]
    fn test_subset_skips_absent_columns() {
        let row = Row::new().with("id", 7).with("name", "x");
        let key = row.subset(&["id", "other"]);
        assert_eq!(key, Row::new().with("id", 7));
    }

    #[test]
    fn test_positional_rows_convert_by_name() {
        let mut tuples = PositionalRows::new(vec!["last".into(), "first".into()]);
        tuples
            .push(vec![SqlValue::from("Nadal"), SqlValue::from("Rafael")])
            .unwrap();

        let rows = tuples.into_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("first"), Some(&SqlValue::from("Rafael")));
        assert_eq!(rows[0].get("last"), Some(&SqlValue::from("Nadal")));
    }

    #[test]
    fn test_positional_rows_reject_wrong_arity() {
        let mut tuples = PositionalRows::new(vec!["a".into(), "b".into()]);
        let err = tuples.push(vec![SqlValue::Int(1)]).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::ArityMismatch {
                row_index: 0,
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_from_rows_round_trips_through_tuples() {
        let rows = vec![
            Row::new().with("a", 1).with("b", "x"),
            Row::new().with("a", 2),
        ];
        let tuples = PositionalRows::from_rows(vec!["b".into(), "a".into()], &rows);
        assert_eq!(
            tuples.tuples()[1],
            vec![SqlValue::Null, SqlValue::Int(2)]
        );
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some("a")), SqlValue::from("a"));
    }
}
