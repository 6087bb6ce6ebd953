//! Target writers
//!
//! A target writer applies a [`TableUpdate`] to one side of a sync. The MySQL
//! writer lives here; the Dolt writer, which also commits, lives in `dolt`.

use crate::connection::SqlConnection;
use crate::error::Result;
use crate::mysql::{delete_keys, get_table_metadata, write_to_table, WriteOptions, WritePolicy, WriteSummary};
use async_trait::async_trait;
use std::collections::HashMap;
use sync_core::{ColumnMapping, Row, TableMetadata};

/// Rows to upsert plus primary keys to delete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableUpdate {
    pub rows: Vec<Row>,
    pub dropped_keys: Vec<Row>,
}

impl TableUpdate {
    pub fn rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            dropped_keys: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.dropped_keys.is_empty()
    }

    /// Rename columns of every row and key from source to target names.
    pub fn project(&self, mapping: &ColumnMapping) -> TableUpdate {
        TableUpdate {
            rows: self.rows.iter().map(|r| mapping.project(r)).collect(),
            dropped_keys: self.dropped_keys.iter().map(|k| mapping.project(k)).collect(),
        }
    }
}

#[async_trait]
pub trait TargetWriter: Send {
    /// Metadata of a table on the target side.
    async fn table_metadata(&mut self, table: &str) -> Result<TableMetadata>;

    /// Delete `update.dropped_keys`, then write `update.rows`.
    async fn write(&mut self, table: &str, update: TableUpdate) -> Result<WriteSummary>;
}

/// Writes into MySQL through one connection, without an enclosing transaction.
pub struct MySqlTargetWriter<'c, C> {
    conn: &'c mut C,
    policy: WritePolicy,
    tables: HashMap<String, TableMetadata>,
}

/// Writer for `conn`; table metadata is introspected on first use per table.
pub fn get_target_writer<C: SqlConnection>(conn: &mut C, policy: WritePolicy) -> MySqlTargetWriter<'_, C> {
    MySqlTargetWriter {
        conn,
        policy,
        tables: HashMap::new(),
    }
}

/// Introspect `table` once and keep its metadata.
pub(crate) async fn cached_metadata<C: SqlConnection>(
    conn: &mut C,
    tables: &mut HashMap<String, TableMetadata>,
    table: &str,
) -> Result<TableMetadata> {
    if let Some(metadata) = tables.get(table) {
        return Ok(metadata.clone());
    }
    let metadata = get_table_metadata(conn, table).await?;
    tables.insert(table.to_string(), metadata.clone());
    Ok(metadata)
}

/// Apply `update` to `table` through `conn`.
pub(crate) async fn apply_update<C: SqlConnection>(
    conn: &mut C,
    table: &TableMetadata,
    update: &TableUpdate,
    policy: WritePolicy,
) -> Result<WriteSummary> {
    let rows_deleted = delete_keys(conn, table, &update.dropped_keys).await?;
    let options = WriteOptions {
        policy,
        atomic: false,
    };
    let mut summary = write_to_table(conn, table, &update.rows, options).await?;
    summary.rows_deleted = rows_deleted;
    Ok(summary)
}

#[async_trait]
impl<'c, C: SqlConnection> TargetWriter for MySqlTargetWriter<'c, C> {
    async fn table_metadata(&mut self, table: &str) -> Result<TableMetadata> {
        cached_metadata(self.conn, &mut self.tables, table).await
    }

    async fn write(&mut self, table: &str, update: TableUpdate) -> Result<WriteSummary> {
        let metadata = self.table_metadata(table).await?;
        apply_update(self.conn, &metadata, &update, self.policy).await
    }
}
