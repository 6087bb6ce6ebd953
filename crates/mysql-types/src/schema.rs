//! MySQL schema column type conversion.
//!
//! This module provides conversion from MySQL INFORMATION_SCHEMA column types
//! to `ColumnType` for schema introspection.

use sync_core::ColumnType;

/// Convert MySQL INFORMATION_SCHEMA column type to ColumnType.
///
/// # Arguments
///
/// * `data_type` - The MySQL data type name (e.g., "INT", "VARCHAR", "TIMESTAMP")
/// * `column_type` - The full column type string (e.g., "int(11)", "varchar(255)", "tinyint(1)")
/// * `precision` - Optional numeric precision
/// * `scale` - Optional numeric scale
///
/// # Example
///
/// ```
/// use mysql_types::mysql_column_to_column_type;
/// use sync_core::ColumnType;
///
/// // TINYINT(1) is treated as boolean in MySQL
/// let ct = mysql_column_to_column_type("TINYINT", "tinyint(1)", None, None);
/// assert_eq!(ct, ColumnType::Bool);
/// ```
pub fn mysql_column_to_column_type(
    data_type: &str,
    column_type: &str,
    precision: Option<u32>,
    scale: Option<u32>,
) -> ColumnType {
    match data_type.to_uppercase().as_str() {
        // Numeric types
        "TINYINT" => {
            // TINYINT(1) is commonly used for boolean in MySQL
            if column_type.to_lowercase().starts_with("tinyint(1)") {
                ColumnType::Bool
            } else {
                ColumnType::TinyInt
            }
        }
        "BOOLEAN" | "BOOL" => ColumnType::Bool,
        "SMALLINT" => ColumnType::SmallInt,
        "MEDIUMINT" | "INT" | "INTEGER" => ColumnType::Int,
        "BIGINT" => ColumnType::BigInt,
        "FLOAT" => ColumnType::Float,
        "DOUBLE" | "REAL" => ColumnType::Double,
        "DECIMAL" | "NUMERIC" => ColumnType::Decimal {
            // cap at MySQL's maximum precision
            precision: precision.map(|p| p.min(65) as u8).unwrap_or(10),
            scale: scale.map(|s| s.min(30) as u8).unwrap_or(0),
        },

        // String types
        "VARCHAR" => match extract_length_from_column_type(column_type) {
            Some(length) => ColumnType::VarChar { length },
            None => ColumnType::Text,
        },
        "CHAR" => ColumnType::Char {
            length: extract_length_from_column_type(column_type).unwrap_or(1),
        },
        "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" => ColumnType::Text,
        "ENUM" => ColumnType::Enum {
            values: extract_enum_values(column_type),
        },

        // Binary types
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            ColumnType::Blob
        }

        // Date/Time types
        "DATE" => ColumnType::Date,
        "TIME" => ColumnType::Time,
        "DATETIME" => ColumnType::DateTime,
        "TIMESTAMP" => ColumnType::Timestamp,
        "YEAR" => ColumnType::Year,

        "JSON" => ColumnType::Json,

        _ => ColumnType::Other {
            name: column_type.to_string(),
        },
    }
}

/// Extract length from a MySQL column type string.
///
/// E.g., "varchar(255)" -> Some(255), "int(11)" -> Some(11)
fn extract_length_from_column_type(column_type: &str) -> Option<u32> {
    let start = column_type.find('(')?;
    let end = column_type.find(')')?;
    if start >= end {
        return None;
    }
    let len_str = &column_type[start + 1..end];
    // Handle comma-separated values (e.g., DECIMAL(10,2))
    let first_part = len_str.split(',').next().unwrap_or(len_str);
    first_part.trim().parse().ok()
}

/// Extract values from a MySQL ENUM column type string.
///
/// E.g., "enum('small','medium','large')" -> vec!["small", "medium", "large"]
fn extract_enum_values(column_type: &str) -> Vec<String> {
    let (Some(start), Some(end)) = (column_type.find('('), column_type.rfind(')')) else {
        return Vec::new();
    };
    if start >= end {
        return Vec::new();
    }
    column_type[start + 1..end]
        .split(',')
        .map(|part| part.trim().trim_matches('\'').trim_matches('"'))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mysql_int_types() {
        assert_eq!(
            mysql_column_to_column_type("TINYINT", "tinyint(4)", None, None),
            ColumnType::TinyInt
        );
        assert_eq!(
            mysql_column_to_column_type("smallint", "smallint(6)", None, None),
            ColumnType::SmallInt
        );
        assert_eq!(
            mysql_column_to_column_type("int", "int", None, None),
            ColumnType::Int
        );
        assert_eq!(
            mysql_column_to_column_type("bigint", "bigint(20)", None, None),
            ColumnType::BigInt
        );
    }

    #[test]
    fn test_mysql_tinyint1_bool() {
        assert_eq!(
            mysql_column_to_column_type("tinyint", "tinyint(1)", None, None),
            ColumnType::Bool
        );
    }

    #[test]
    fn test_mysql_string_types() {
        assert_eq!(
            mysql_column_to_column_type("varchar", "varchar(256)", None, None),
            ColumnType::VarChar { length: 256 }
        );
        assert_eq!(
            mysql_column_to_column_type("char", "char(36)", None, None),
            ColumnType::Char { length: 36 }
        );
        assert_eq!(
            mysql_column_to_column_type("longtext", "longtext", None, None),
            ColumnType::Text
        );
    }

    #[test]
    fn test_mysql_decimal() {
        assert_eq!(
            mysql_column_to_column_type("decimal", "decimal(10,2)", Some(10), Some(2)),
            ColumnType::Decimal {
                precision: 10,
                scale: 2
            }
        );
    }

    #[test]
    fn test_mysql_enum_values() {
        assert_eq!(
            mysql_column_to_column_type("enum", "enum('left','right')", None, None),
            ColumnType::Enum {
                values: vec!["left".into(), "right".into()]
            }
        );
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        assert_eq!(
            mysql_column_to_column_type("geometry", "geometry", None, None),
            ColumnType::Other {
                name: "geometry".into()
            }
        );
    }
}
