//! Schema definitions for the dolt-sync framework.
//!
//! [`TableMetadata`] is what the schema introspector produces and what the
//! row writer and sync engine consume. It keeps columns in their declared
//! order; primary-key columns keep their key order.

use crate::values::Row;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// Error Types
// ============================================================================

/// Error type for schema operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    /// Table does not exist (or has no visible columns)
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Column not found in table schema
    #[error("Column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    /// Column declared twice in one table
    #[error("Column '{column}' declared more than once in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    /// Source and target share no columns
    #[error("Tables '{source_table}' and '{target_table}' have no columns in common")]
    NoCommonColumns {
        source_table: String,
        target_table: String,
    },

    /// Positional tuple does not match its column list
    #[error("Row {row_index} has {actual} values but {expected} columns were declared")]
    ArityMismatch {
        row_index: usize,
        expected: usize,
        actual: usize,
    },

    /// Operation needs a primary key the table does not have
    #[error("Table '{0}' has no primary key")]
    MissingPrimaryKey(String),
}

// ============================================================================
// Column Types
// ============================================================================

/// Column type as reported by the database, reduced to what the sync needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnType {
    Bool,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Decimal { precision: u8, scale: u8 },
    Char { length: u32 },
    VarChar { length: u32 },
    Text,
    Blob,
    Date,
    Time,
    DateTime,
    Timestamp,
    Year,
    Json,
    Enum { values: Vec<String> },
    /// Any type the mapping does not model; holds the raw type name
    Other { name: String },
}

// ============================================================================
// Table Metadata
// ============================================================================

/// Column definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,

    /// Column type
    #[serde(rename = "type")]
    pub column_type: ColumnType,

    /// Whether this column accepts NULL
    #[serde(default)]
    pub nullable: bool,

    /// Whether this column is part of the primary key
    #[serde(default)]
    pub primary_key: bool,
}

impl Column {
    /// Create a new non-null, non-key column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            primary_key: false,
        }
    }

    /// Mark this column as nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark this column as part of the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }
}

/// Table metadata: name, ordered columns and primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    name: String,
    columns: Vec<Column>,
    /// Primary-key column names in key order
    primary_key: Vec<String>,
}

impl TableMetadata {
    /// Create table metadata whose primary key follows the order in which
    /// key columns are declared.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self, SchemaError> {
        let primary_key = columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect();
        Self::with_primary_key(name, columns, primary_key)
    }

    /// Create table metadata with an explicit primary-key order.
    pub fn with_primary_key(
        name: impl Into<String>,
        mut columns: Vec<Column>,
        primary_key: Vec<String>,
    ) -> Result<Self, SchemaError> {
        let name = name.into();

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    table: name,
                    column: column.name.clone(),
                });
            }
        }

        for key in &primary_key {
            if !seen.contains(key.as_str()) {
                return Err(SchemaError::ColumnNotFound {
                    table: name,
                    column: key.clone(),
                });
            }
        }

        for column in &mut columns {
            column.primary_key = primary_key.contains(&column.name);
        }

        Ok(Self {
            name,
            columns,
            primary_key,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in declared order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Column names in declared order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Column names sorted lexicographically.
    pub fn sorted_column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.columns.iter().map(|c| c.name.clone()).collect();
        names.sort();
        names
    }

    /// Primary-key column names in key order; empty when the table has none.
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// Columns that are not part of the primary key, in declared order.
    pub fn non_key_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| !c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// The declared-order column list for writing `row`.
    ///
    /// Fails if the row names a column this table does not have.
    pub fn write_order(&self, row: &Row) -> Result<Vec<String>, SchemaError> {
        if let Some(unknown) = row.columns().find(|c| !self.has_column(c)) {
            return Err(SchemaError::ColumnNotFound {
                table: self.name.clone(),
                column: unknown.to_string(),
            });
        }

        Ok(self
            .columns
            .iter()
            .filter(|c| row.contains_column(&c.name))
            .map(|c| c.name.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players() -> TableMetadata {
        TableMetadata::new(
            "players",
            vec![
                Column::new("first_name", ColumnType::VarChar { length: 256 }).primary_key(),
                Column::new("last_name", ColumnType::VarChar { length: 256 }).primary_key(),
                Column::new("win_percentage", ColumnType::Double).nullable(),
                Column::new("high_rank", ColumnType::Int).nullable(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_primary_key_follows_declaration() {
        let table = players();
        assert_eq!(table.primary_key(), ["first_name", "last_name"]);
        assert_eq!(table.non_key_columns(), vec!["win_percentage", "high_rank"]);
    }

    #[test]
    fn test_sorted_column_names() {
        assert_eq!(
            players().sorted_column_names(),
            vec!["first_name", "high_rank", "last_name", "win_percentage"]
        );
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let err = TableMetadata::new(
            "t",
            vec![
                Column::new("a", ColumnType::Int),
                Column::new("a", ColumnType::Text),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateColumn {
                table: "t".into(),
                column: "a".into()
            }
        );
    }

    #[test]
    fn test_explicit_primary_key_order() {
        let table = TableMetadata::with_primary_key(
            "t",
            vec![
                Column::new("a", ColumnType::Int),
                Column::new("b", ColumnType::Int),
            ],
            vec!["b".into(), "a".into()],
        )
        .unwrap();
        assert_eq!(table.primary_key(), ["b", "a"]);
        assert!(table.columns().iter().all(|c| c.primary_key));
    }

    #[test]
    fn test_write_order_follows_declared_order() {
        let row = Row::new()
            .with("high_rank", 1)
            .with("last_name", "Nadal")
            .with("first_name", "Rafael");
        assert_eq!(
            players().write_order(&row).unwrap(),
            vec!["first_name", "last_name", "high_rank"]
        );
    }

    #[test]
    fn test_write_order_rejects_unknown_column() {
        let row = Row::new().with("first_name", "Rafael").with("nickname", "Rafa");
        let err = players().write_order(&row).unwrap_err();
        assert_eq!(
            err,
            SchemaError::ColumnNotFound {
                table: "players".into(),
                column: "nickname".into()
            }
        );
    }
}
