//! Row writer
//!
//! Writes rows one statement at a time, in the order given, so a failure
//! identifies exactly which row was rejected. A batch is only wrapped in a
//! transaction when the caller asks for it.

use crate::connection::SqlConnection;
use crate::error::{Error, Result};
use mysql_types::MySQLDdl;
use std::collections::HashMap;
use sync_core::{PositionalRows, Row, SchemaError, TableMetadata};
use tracing::{debug, warn};

/// How a row that collides with an existing key is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Plain INSERT; a duplicate key fails the row
    #[default]
    Insert,
    /// INSERT ... ON DUPLICATE KEY UPDATE of the non-key columns
    Upsert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    pub policy: WritePolicy,
    /// Wrap the whole batch in one transaction, rolled back on failure
    pub atomic: bool,
}

impl WriteOptions {
    pub fn insert() -> Self {
        Self::default()
    }

    pub fn upsert() -> Self {
        Self {
            policy: WritePolicy::Upsert,
            atomic: false,
        }
    }

    pub fn atomic(mut self) -> Self {
        self.atomic = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteSummary {
    pub rows_written: usize,
    pub rows_deleted: usize,
}

impl std::ops::AddAssign for WriteSummary {
    fn add_assign(&mut self, other: Self) {
        self.rows_written += other.rows_written;
        self.rows_deleted += other.rows_deleted;
    }
}

/// Write `rows` into `table`.
///
/// Each row may carry any subset of the table's columns, in any order; the
/// statement lists them in declared table order. An empty batch is a no-op.
/// Failure on row `i` yields `Error::Write { row_index: Some(i), .. }`. Rows
/// before it stay written unless `options.atomic` is set.
pub async fn write_to_table<C: SqlConnection>(
    conn: &mut C,
    table: &TableMetadata,
    rows: &[Row],
    options: WriteOptions,
) -> Result<WriteSummary> {
    if rows.is_empty() {
        debug!(table = table.name(), "No rows to write");
        return Ok(WriteSummary::default());
    }

    if options.policy == WritePolicy::Upsert && table.primary_key().is_empty() {
        debug!(
            table = table.name(),
            "Table has no primary key, upsert behaves as insert"
        );
    }

    if !options.atomic {
        return write_each(conn, table, rows, options.policy).await;
    }

    conn.begin_transaction().await?;
    match write_each(conn, table, rows, options.policy).await {
        Ok(summary) => {
            conn.commit_transaction().await?;
            Ok(summary)
        }
        Err(e) => {
            if let Err(rollback_err) = conn.rollback_transaction().await {
                warn!(table = table.name(), "Rollback failed: {rollback_err}");
            }
            Err(e)
        }
    }
}

async fn write_each<C: SqlConnection>(
    conn: &mut C,
    table: &TableMetadata,
    rows: &[Row],
    policy: WritePolicy,
) -> Result<WriteSummary> {
    let ddl = MySQLDdl;
    // Rows with the same column set share one statement text.
    let mut statements: HashMap<Vec<String>, String> = HashMap::new();

    for (index, row) in rows.iter().enumerate() {
        let columns = table
            .write_order(row)
            .map_err(|e| Error::write(table.name(), Some(index), e))?;
        if columns.is_empty() {
            return Err(Error::write(table.name(), Some(index), "row has no columns"));
        }

        let params = row.values_in(&columns);
        let statement = statements.entry(columns).or_insert_with_key(|columns| match policy {
            WritePolicy::Insert => ddl.insert(table.name(), columns),
            WritePolicy::Upsert => ddl.upsert(table.name(), columns, table.primary_key()),
        });

        conn.execute(statement, &params)
            .await
            .map_err(|e| Error::row_rejected(table.name(), index, e))?;
    }

    debug!(table = table.name(), rows = rows.len(), "Wrote rows");
    Ok(WriteSummary {
        rows_written: rows.len(),
        rows_deleted: 0,
    })
}

/// Write positional tuples whose column order is carried alongside them.
pub async fn write_positional<C: SqlConnection>(
    conn: &mut C,
    table: &TableMetadata,
    tuples: PositionalRows,
    options: WriteOptions,
) -> Result<WriteSummary> {
    let rows = tuples.into_rows().map_err(|e| match e {
        SchemaError::ArityMismatch { row_index, .. } => {
            Error::write(table.name(), Some(row_index), e)
        }
        other => other.into(),
    })?;
    write_to_table(conn, table, &rows, options).await
}

/// Delete rows of `table` identified by primary-key values.
///
/// Each key row must carry every primary-key column. Returns the number of
/// rows the server reports as deleted; keys that match nothing are skipped.
pub async fn delete_keys<C: SqlConnection>(
    conn: &mut C,
    table: &TableMetadata,
    keys: &[Row],
) -> Result<usize> {
    if keys.is_empty() {
        return Ok(0);
    }
    let key_columns = table.primary_key();
    if key_columns.is_empty() {
        return Err(SchemaError::MissingPrimaryKey(table.name().to_string()).into());
    }

    let statement = MySQLDdl.delete_by_key(table.name(), key_columns);
    let mut deleted = 0usize;
    for (index, key) in keys.iter().enumerate() {
        if let Some(missing) = key_columns.iter().find(|c| !key.contains_column(c)) {
            return Err(Error::write(
                table.name(),
                Some(index),
                format!("key is missing column '{missing}'"),
            ));
        }
        let affected = conn
            .execute(&statement, &key.values_in(key_columns))
            .await
            .map_err(|e| Error::write(table.name(), Some(index), e))?;
        deleted += affected as usize;
    }

    debug!(table = table.name(), deleted, "Deleted rows by key");
    Ok(deleted)
}
