//! Reverse conversion: MySQL values → SqlValue
//!
//! This module converts MySQL's native values back to sync-core's `SqlValue`
//! for reading data from MySQL or Dolt. Both the text protocol (everything
//! arrives as bytes) and the binary protocol (typed values) are handled.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use mysql_async::consts::{ColumnFlags, ColumnType};
use mysql_async::Value;
use sync_core::{Row, SqlValue};
use thiserror::Error;

/// Character set id MySQL reports for binary strings.
const BINARY_CHARSET: u16 = 63;

/// MySQL value with column information for type-aware conversion.
#[derive(Debug, Clone)]
pub struct MySQLValueWithSchema {
    /// The raw MySQL value.
    pub value: Value,
    /// The MySQL column type.
    pub column_type: ColumnType,
    /// Column flags (e.g., UNSIGNED, BINARY).
    pub column_flags: ColumnFlags,
    /// Character set id of the column.
    pub character_set: u16,
}

/// Error during MySQL value conversion.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Type mismatch in column '{column}': expected {expected}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: Value,
    },
    #[error("Invalid UTF-8 in string: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("Invalid date/time value")]
    InvalidDateTime,
    #[error("Date/time {0} is outside the MySQL range")]
    OutOfRange(String),
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl MySQLValueWithSchema {
    /// Create a new MySQLValueWithSchema.
    pub fn new(value: Value, column_type: ColumnType, column_flags: ColumnFlags) -> Self {
        Self {
            value,
            column_type,
            column_flags,
            character_set: 0,
        }
    }

    /// Set the column character set.
    pub fn with_character_set(mut self, character_set: u16) -> Self {
        self.character_set = character_set;
        self
    }

    fn is_binary(&self) -> bool {
        self.character_set == BINARY_CHARSET
    }

    /// Convert to SqlValue.
    pub fn to_sql_value(self) -> Result<SqlValue, ConversionError> {
        use ColumnType::*;

        if matches!(self.value, Value::NULL) {
            return Ok(SqlValue::Null);
        }

        match self.column_type {
            // Integer types
            MYSQL_TYPE_TINY | MYSQL_TYPE_SHORT | MYSQL_TYPE_INT24 | MYSQL_TYPE_LONG
            | MYSQL_TYPE_LONGLONG | MYSQL_TYPE_YEAR => {
                if self.column_flags.contains(ColumnFlags::UNSIGNED_FLAG) {
                    extract_uint(&self.value).map(SqlValue::UInt)
                } else {
                    extract_int(&self.value).map(SqlValue::Int)
                }
            }

            MYSQL_TYPE_BIT => extract_bits(&self.value).map(SqlValue::UInt),

            // Floating point
            MYSQL_TYPE_FLOAT => extract_float(&self.value).map(|f| SqlValue::Float(f as f32)),
            MYSQL_TYPE_DOUBLE => extract_float(&self.value).map(SqlValue::Double),

            // Decimal keeps its textual form
            MYSQL_TYPE_DECIMAL | MYSQL_TYPE_NEWDECIMAL => {
                extract_string(&self.value).map(SqlValue::Decimal)
            }

            // String and blob types; binary charset means raw bytes
            MYSQL_TYPE_STRING | MYSQL_TYPE_VAR_STRING | MYSQL_TYPE_VARCHAR | MYSQL_TYPE_ENUM
            | MYSQL_TYPE_SET | MYSQL_TYPE_TINY_BLOB | MYSQL_TYPE_MEDIUM_BLOB
            | MYSQL_TYPE_BLOB | MYSQL_TYPE_LONG_BLOB => {
                if self.is_binary() {
                    extract_bytes(&self.value).map(SqlValue::Bytes)
                } else {
                    extract_string(&self.value).map(SqlValue::Text)
                }
            }

            // Date/time types
            MYSQL_TYPE_DATE | MYSQL_TYPE_NEWDATE => extract_date(&self.value).map(SqlValue::Date),
            MYSQL_TYPE_TIME | MYSQL_TYPE_TIME2 => extract_time(&self.value),
            MYSQL_TYPE_DATETIME | MYSQL_TYPE_DATETIME2 | MYSQL_TYPE_TIMESTAMP
            | MYSQL_TYPE_TIMESTAMP2 => extract_datetime(&self.value).map(SqlValue::DateTime),

            MYSQL_TYPE_JSON => {
                let s = extract_string(&self.value)?;
                Ok(SqlValue::Json(serde_json::from_str(&s)?))
            }

            // Anything else: keep text when it is valid UTF-8
            _ => match &self.value {
                Value::Bytes(b) => Ok(String::from_utf8(b.clone())
                    .map(SqlValue::Text)
                    .unwrap_or_else(|_| SqlValue::Bytes(b.clone()))),
                Value::Int(i) => Ok(SqlValue::Int(*i)),
                Value::UInt(u) => Ok(SqlValue::UInt(*u)),
                Value::Float(f) => Ok(SqlValue::Float(*f)),
                Value::Double(f) => Ok(SqlValue::Double(*f)),
                other => Err(mismatch("scalar", other)),
            },
        }
    }
}

/// Convert a full MySQL row into a name-keyed `Row`.
pub fn row_to_sql_row(row: &mysql_async::Row) -> Result<Row, ConversionError> {
    let mut out = Row::new();
    for (index, column) in row.columns_ref().iter().enumerate() {
        let name = column.name_str().into_owned();
        let value = row.as_ref(index).cloned().unwrap_or(Value::NULL);
        let converted =
            MySQLValueWithSchema::new(value, column.column_type(), column.flags())
                .with_character_set(column.character_set())
                .to_sql_value()
                .map_err(|e| match e {
                    ConversionError::TypeMismatch {
                        expected, actual, ..
                    } => ConversionError::TypeMismatch {
                        column: name.clone(),
                        expected,
                        actual,
                    },
                    other => other,
                })?;
        out.insert(name, converted);
    }
    Ok(out)
}

fn mismatch(expected: &str, actual: &Value) -> ConversionError {
    ConversionError::TypeMismatch {
        column: String::new(),
        expected: expected.to_string(),
        actual: actual.clone(),
    }
}

fn extract_int(value: &Value) -> Result<i64, ConversionError> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::UInt(u) => i64::try_from(*u).map_err(|_| mismatch("integer", value)),
        Value::Bytes(b) => {
            let s = String::from_utf8(b.clone())?;
            s.parse().map_err(|_| mismatch("integer", value))
        }
        _ => Err(mismatch("integer", value)),
    }
}

fn extract_uint(value: &Value) -> Result<u64, ConversionError> {
    match value {
        Value::UInt(u) => Ok(*u),
        Value::Int(i) => u64::try_from(*i).map_err(|_| mismatch("unsigned integer", value)),
        Value::Bytes(b) => {
            let s = String::from_utf8(b.clone())?;
            s.parse().map_err(|_| mismatch("unsigned integer", value))
        }
        _ => Err(mismatch("unsigned integer", value)),
    }
}

/// BIT(n) arrives as big-endian bytes.
fn extract_bits(value: &Value) -> Result<u64, ConversionError> {
    match value {
        Value::Bytes(b) if b.len() <= 8 => {
            Ok(b.iter().fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte)))
        }
        Value::UInt(u) => Ok(*u),
        Value::Int(i) => u64::try_from(*i).map_err(|_| mismatch("bit", value)),
        _ => Err(mismatch("bit", value)),
    }
}

fn extract_float(value: &Value) -> Result<f64, ConversionError> {
    match value {
        Value::Float(f) => Ok(f64::from(*f)),
        Value::Double(d) => Ok(*d),
        Value::Int(i) => Ok(*i as f64),
        Value::Bytes(b) => {
            let s = String::from_utf8(b.clone())?;
            s.parse().map_err(|_| mismatch("float", value))
        }
        _ => Err(mismatch("float", value)),
    }
}

fn extract_string(value: &Value) -> Result<String, ConversionError> {
    match value {
        Value::Bytes(b) => Ok(String::from_utf8(b.clone())?),
        Value::Int(i) => Ok(i.to_string()),
        Value::UInt(u) => Ok(u.to_string()),
        Value::Double(d) => Ok(d.to_string()),
        _ => Err(mismatch("string", value)),
    }
}

fn extract_bytes(value: &Value) -> Result<Vec<u8>, ConversionError> {
    match value {
        Value::Bytes(b) => Ok(b.clone()),
        _ => Err(mismatch("bytes", value)),
    }
}

fn extract_date(value: &Value) -> Result<NaiveDate, ConversionError> {
    match value {
        Value::Date(year, month, day, _, _, _, _) => {
            NaiveDate::from_ymd_opt(i32::from(*year), u32::from(*month), u32::from(*day))
                .ok_or(ConversionError::InvalidDateTime)
        }
        Value::Bytes(b) => {
            let s = String::from_utf8(b.clone())?;
            NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|_| ConversionError::InvalidDateTime)
        }
        _ => Err(mismatch("date", value)),
    }
}

/// TIME values outside a single day (negative or with days) are kept as text.
fn extract_time(value: &Value) -> Result<SqlValue, ConversionError> {
    match value {
        Value::Time(false, 0, hour, min, sec, micro) => NaiveTime::from_hms_micro_opt(
            u32::from(*hour),
            u32::from(*min),
            u32::from(*sec),
            *micro,
        )
        .map(SqlValue::Time)
        .ok_or(ConversionError::InvalidDateTime),
        Value::Time(negative, days, hour, min, sec, micro) => {
            let sign = if *negative { "-" } else { "" };
            let hours = u64::from(*days) * 24 + u64::from(*hour);
            Ok(SqlValue::Text(format!(
                "{sign}{hours:02}:{min:02}:{sec:02}.{micro:06}"
            )))
        }
        Value::Bytes(b) => {
            let s = String::from_utf8(b.clone())?;
            Ok(NaiveTime::parse_from_str(&s, "%H:%M:%S%.f")
                .map(SqlValue::Time)
                .unwrap_or(SqlValue::Text(s)))
        }
        _ => Err(mismatch("time", value)),
    }
}

fn extract_datetime(value: &Value) -> Result<NaiveDateTime, ConversionError> {
    match value {
        Value::Date(year, month, day, hour, min, sec, micro) => Ok(NaiveDateTime::new(
            NaiveDate::from_ymd_opt(i32::from(*year), u32::from(*month), u32::from(*day))
                .ok_or(ConversionError::InvalidDateTime)?,
            NaiveTime::from_hms_micro_opt(
                u32::from(*hour),
                u32::from(*min),
                u32::from(*sec),
                *micro,
            )
            .ok_or(ConversionError::InvalidDateTime)?,
        )),
        Value::Bytes(b) => {
            let s = String::from_utf8(b.clone())?;
            // Text protocol: with or without fractional seconds
            NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S"))
                .map_err(|_| ConversionError::InvalidDateTime)
        }
        _ => Err(mismatch("datetime", value)),
    }
}
