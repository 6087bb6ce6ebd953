//! Forward conversion: SqlValue → MySQLValue
//!
//! This module implements `TryFrom<&SqlValue>` for `MySQLValue`, converting
//! sync-core values into MySQL-compatible statement parameters.

use crate::reverse::ConversionError;
use chrono::{Datelike, Timelike};
use mysql_async::{Params, Value};
use sync_core::SqlValue;

/// MySQL value wrapper for type-safe conversions.
#[derive(Debug, Clone, PartialEq)]
pub struct MySQLValue(pub Value);

impl MySQLValue {
    /// Get the inner mysql_async::Value.
    pub fn into_inner(self) -> Value {
        self.0
    }

    /// Get a reference to the inner value.
    pub fn as_inner(&self) -> &Value {
        &self.0
    }
}

impl TryFrom<&SqlValue> for MySQLValue {
    type Error = ConversionError;

    fn try_from(value: &SqlValue) -> Result<Self, Self::Error> {
        let value = match value {
            SqlValue::Null => Value::NULL,

            // Boolean - MySQL uses TINYINT(1)
            SqlValue::Bool(b) => Value::Int(i64::from(*b)),

            SqlValue::Int(i) => Value::Int(*i),
            SqlValue::UInt(u) => Value::UInt(*u),
            SqlValue::Float(f) => Value::Float(*f),
            SqlValue::Double(f) => Value::Double(*f),

            // Decimal - sent as string to keep precision
            SqlValue::Decimal(s) | SqlValue::Text(s) => Value::Bytes(s.as_bytes().to_vec()),
            SqlValue::Bytes(b) => Value::Bytes(b.clone()),

            SqlValue::Date(d) => Value::Date(
                wire_year(d.year(), || d.to_string())?,
                d.month() as u8,
                d.day() as u8,
                0,
                0,
                0,
                0,
            ),

            SqlValue::Time(t) => Value::Time(
                false, // not negative
                0,     // days
                t.hour() as u8,
                t.minute() as u8,
                t.second() as u8,
                t.nanosecond() / 1000, // MySQL uses microseconds
            ),

            SqlValue::DateTime(dt) => Value::Date(
                wire_year(dt.year(), || dt.to_string())?,
                dt.month() as u8,
                dt.day() as u8,
                dt.hour() as u8,
                dt.minute() as u8,
                dt.second() as u8,
                dt.nanosecond() / 1000,
            ),

            SqlValue::Json(j) => Value::Bytes(j.to_string().into_bytes()),
        };
        Ok(MySQLValue(value))
    }
}

impl TryFrom<SqlValue> for MySQLValue {
    type Error = ConversionError;

    fn try_from(value: SqlValue) -> Result<Self, Self::Error> {
        MySQLValue::try_from(&value)
    }
}

/// The wire format carries the year as a `u16`; chrono allows negative and
/// larger years.
fn wire_year(year: i32, display: impl FnOnce() -> String) -> Result<u16, ConversionError> {
    u16::try_from(year).map_err(|_| ConversionError::OutOfRange(display()))
}

/// Build positional statement parameters.
pub fn to_params(values: &[SqlValue]) -> Result<Params, ConversionError> {
    if values.is_empty() {
        return Ok(Params::Empty);
    }
    values
        .iter()
        .map(|v| MySQLValue::try_from(v).map(MySQLValue::into_inner))
        .collect::<Result<Vec<_>, _>>()
        .map(Params::Positional)
}
