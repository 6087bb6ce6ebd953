//! MySQL statement generation from sync-core types.
//!
//! This module renders column types, CREATE TABLE, INSERT, upsert, DELETE and
//! paging SELECT statements. Values are always bound as `?` parameters; only
//! identifiers and Dolt revision literals are written into the text.

use sync_core::{ColumnType, TableMetadata};

/// Quote an identifier with backticks, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a string literal with single quotes, escaping quotes and backslashes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

fn column_list<S: AsRef<str>>(columns: &[S]) -> String {
    columns
        .iter()
        .map(|c| quote_identifier(c.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn key_predicate<S: AsRef<str>>(columns: &[S]) -> String {
    columns
        .iter()
        .map(|c| format!("{} = ?", quote_identifier(c.as_ref())))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn from_clause(table: &str, as_of: Option<&str>) -> String {
    match as_of {
        Some(revision) => format!("{} AS OF {}", quote_identifier(table), quote_literal(revision)),
        None => quote_identifier(table),
    }
}

/// MySQL statement generator.
pub struct MySQLDdl;

impl MySQLDdl {
    /// Render a column type as MySQL DDL.
    pub fn column_type(&self, column_type: &ColumnType) -> String {
        match column_type {
            // Boolean - MySQL uses TINYINT(1)
            ColumnType::Bool => "TINYINT(1)".to_string(),

            ColumnType::TinyInt => "TINYINT".to_string(),
            ColumnType::SmallInt => "SMALLINT".to_string(),
            ColumnType::Int => "INT".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Float => "FLOAT".to_string(),
            ColumnType::Double => "DOUBLE".to_string(),
            ColumnType::Decimal { precision, scale } => format!("DECIMAL({precision},{scale})"),

            ColumnType::Char { length } => format!("CHAR({length})"),
            ColumnType::VarChar { length } => format!("VARCHAR({length})"),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Blob => "BLOB".to_string(),

            ColumnType::Date => "DATE".to_string(),
            ColumnType::Time => "TIME(6)".to_string(),
            ColumnType::DateTime => "DATETIME(6)".to_string(),
            ColumnType::Timestamp => "TIMESTAMP(6)".to_string(),
            ColumnType::Year => "YEAR".to_string(),
            ColumnType::Json => "JSON".to_string(),

            ColumnType::Enum { values } => {
                let escaped: Vec<String> = values.iter().map(|v| quote_literal(v)).collect();
                format!("ENUM({})", escaped.join(", "))
            }

            ColumnType::Other { name } => name.clone(),
        }
    }

    /// Generate a CREATE TABLE statement, including the primary key if any.
    pub fn create_table(&self, table: &TableMetadata) -> String {
        let mut defs: Vec<String> = table
            .columns()
            .iter()
            .map(|c| {
                let null_clause = if c.nullable { "NULL" } else { "NOT NULL" };
                format!(
                    "  {} {} {}",
                    quote_identifier(&c.name),
                    self.column_type(&c.column_type),
                    null_clause
                )
            })
            .collect();

        if !table.primary_key().is_empty() {
            defs.push(format!(
                "  PRIMARY KEY ({})",
                column_list(table.primary_key())
            ));
        }

        format!(
            "CREATE TABLE {} (\n{}\n)",
            quote_identifier(table.name()),
            defs.join(",\n")
        )
    }

    /// Generate an INSERT statement template.
    pub fn insert<S: AsRef<str>>(&self, table_name: &str, columns: &[S]) -> String {
        let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table_name),
            column_list(columns),
            placeholders.join(", ")
        )
    }

    /// Generate an insert-or-update statement template.
    ///
    /// Non-key columns are overwritten on a duplicate key. When every column
    /// is a key column the update clause is a no-op assignment.
    pub fn upsert<S: AsRef<str>, K: AsRef<str>>(
        &self,
        table_name: &str,
        columns: &[S],
        key_columns: &[K],
    ) -> String {
        let updates: Vec<String> = columns
            .iter()
            .map(AsRef::as_ref)
            .filter(|c| !key_columns.iter().any(|k| k.as_ref() == *c))
            .map(|c| {
                let quoted = quote_identifier(c);
                format!("{quoted} = VALUES({quoted})")
            })
            .collect();

        let update_clause = if updates.is_empty() {
            columns
                .first()
                .map(|c| {
                    let quoted = quote_identifier(c.as_ref());
                    format!("{quoted} = {quoted}")
                })
                .unwrap_or_default()
        } else {
            updates.join(", ")
        };

        format!(
            "{} ON DUPLICATE KEY UPDATE {}",
            self.insert(table_name, columns),
            update_clause
        )
    }

    /// Generate a DELETE statement matching one row by key.
    pub fn delete_by_key<S: AsRef<str>>(&self, table_name: &str, key_columns: &[S]) -> String {
        format!(
            "DELETE FROM {} WHERE {}",
            quote_identifier(table_name),
            key_predicate(key_columns)
        )
    }

    /// Generate a SELECT of all rows ordered by `order_by`.
    pub fn select_all<S: AsRef<str>, O: AsRef<str>>(
        &self,
        table_name: &str,
        columns: &[S],
        order_by: &[O],
        as_of: Option<&str>,
    ) -> String {
        let mut sql = format!(
            "SELECT {} FROM {}",
            column_list(columns),
            from_clause(table_name, as_of)
        );
        if !order_by.is_empty() {
            sql.push_str(&format!(" ORDER BY {}", column_list(order_by)));
        }
        sql
    }

    /// Generate one page of a keyset scan.
    ///
    /// The first page has no lower bound; later pages bind the last key seen
    /// as `(k1, k2, ...) > (?, ?, ...)`.
    pub fn select_keyset_page<S: AsRef<str>, K: AsRef<str>>(
        &self,
        table_name: &str,
        columns: &[S],
        key_columns: &[K],
        after_key: bool,
        limit: usize,
        as_of: Option<&str>,
    ) -> String {
        let mut sql = format!(
            "SELECT {} FROM {}",
            column_list(columns),
            from_clause(table_name, as_of)
        );
        if after_key {
            let placeholders: Vec<&str> = key_columns.iter().map(|_| "?").collect();
            sql.push_str(&format!(
                " WHERE ({}) > ({})",
                column_list(key_columns),
                placeholders.join(", ")
            ));
        }
        sql.push_str(&format!(
            " ORDER BY {} LIMIT {limit}",
            column_list(key_columns)
        ));
        sql
    }

    /// Generate one page of an offset scan, for tables without a primary key.
    pub fn select_offset_page<S: AsRef<str>>(
        &self,
        table_name: &str,
        columns: &[S],
        limit: usize,
        offset: u64,
        as_of: Option<&str>,
    ) -> String {
        format!(
            "SELECT {cols} FROM {from} ORDER BY {cols} LIMIT {limit} OFFSET {offset}",
            cols = column_list(columns),
            from = from_clause(table_name, as_of)
        )
    }
}
