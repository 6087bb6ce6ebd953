//! MySQL schema introspection
//!
//! Reads table and column definitions from INFORMATION_SCHEMA for the
//! connection's current database. Works against MySQL and Dolt alike.

use crate::connection::SqlConnection;
use crate::error::{Error, Result};
use mysql_types::mysql_column_to_column_type;
use sync_core::{Column, Row, SchemaError, SqlValue, TableMetadata};
use tracing::debug;

const COLUMNS_QUERY: &str = "
        SELECT COLUMN_NAME AS column_name, DATA_TYPE AS data_type, COLUMN_TYPE AS column_type,
               IS_NULLABLE AS is_nullable, NUMERIC_PRECISION AS numeric_precision,
               NUMERIC_SCALE AS numeric_scale
        FROM INFORMATION_SCHEMA.COLUMNS
        WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
        ORDER BY ORDINAL_POSITION";

const PRIMARY_KEY_QUERY: &str = "
        SELECT COLUMN_NAME AS column_name
        FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
        WHERE TABLE_SCHEMA = DATABASE()
        AND TABLE_NAME = ?
        AND CONSTRAINT_NAME = 'PRIMARY'
        ORDER BY ORDINAL_POSITION";

const TABLES_QUERY: &str = "
        SELECT TABLE_NAME AS table_name
        FROM INFORMATION_SCHEMA.TABLES
        WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
        ORDER BY TABLE_NAME";

/// Column names of `table`, sorted lexicographically.
///
/// Fails with `SchemaError::TableNotFound` when the table has no columns in
/// the current database.
pub async fn get_mysql_columns<C: SqlConnection>(conn: &mut C, table: &str) -> Result<Vec<String>> {
    let metadata = get_table_metadata(conn, table).await?;
    Ok(metadata.sorted_column_names())
}

/// Full metadata for `table`: columns in declared order plus primary key.
pub async fn get_table_metadata<C: SqlConnection>(
    conn: &mut C,
    table: &str,
) -> Result<TableMetadata> {
    let name = SqlValue::from(table);
    let rows = conn.fetch(COLUMNS_QUERY, std::slice::from_ref(&name)).await?;
    if rows.is_empty() {
        return Err(SchemaError::TableNotFound(table.to_string()).into());
    }

    let mut columns = Vec::with_capacity(rows.len());
    for row in &rows {
        let column_name = text_field(row, "column_name")?;
        let data_type = text_field(row, "data_type")?;
        let column_type = text_field(row, "column_type")?;
        let precision = u32_field(row, "numeric_precision");
        let scale = u32_field(row, "numeric_scale");

        let mut column = Column::new(
            column_name,
            mysql_column_to_column_type(&data_type, &column_type, precision, scale),
        );
        if text_field(row, "is_nullable")?.eq_ignore_ascii_case("YES") {
            column = column.nullable();
        }
        columns.push(column);
    }

    let primary_key: Vec<String> = conn
        .fetch(PRIMARY_KEY_QUERY, std::slice::from_ref(&name))
        .await?
        .iter()
        .map(|row| text_field(row, "column_name"))
        .collect::<Result<_>>()?;

    debug!(
        table,
        columns = columns.len(),
        primary_key = ?primary_key,
        "Loaded table metadata"
    );

    Ok(TableMetadata::with_primary_key(table, columns, primary_key)?)
}

/// Base tables of the current database, sorted by name.
pub async fn list_tables<C: SqlConnection>(conn: &mut C) -> Result<Vec<String>> {
    conn.fetch(TABLES_QUERY, &[])
        .await?
        .iter()
        .map(|row| text_field(row, "table_name"))
        .collect()
}

/// INFORMATION_SCHEMA text columns may come back as binary strings.
fn text_field(row: &Row, column: &str) -> Result<String> {
    match row.get(column) {
        Some(SqlValue::Text(s)) => Ok(s.clone()),
        Some(SqlValue::Bytes(b)) => String::from_utf8(b.clone()).map_err(|_| Error::Query {
            statement: COLUMNS_QUERY.trim().to_string(),
            message: format!("column '{column}' is not valid UTF-8"),
            code: None,
        }),
        other => Err(Error::Query {
            statement: COLUMNS_QUERY.trim().to_string(),
            message: format!("expected text in column '{column}', got {other:?}"),
            code: None,
        }),
    }
}

fn u32_field(row: &Row, column: &str) -> Option<u32> {
    match row.get(column)? {
        SqlValue::Int(i) => u32::try_from(*i).ok(),
        SqlValue::UInt(u) => u32::try_from(*u).ok(),
        SqlValue::Text(s) => s.parse().ok(),
        _ => None,
    }
}
