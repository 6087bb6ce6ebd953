//! Table sync engine
//!
//! Moves rows of one table from a source connection to a target. Both sides
//! speak the MySQL protocol, so the same engine runs Dolt -> MySQL and
//! MySQL -> Dolt; only the target writer differs.
//!
//! # Flow
//!
//! 1. Introspect the source table and the target table
//! 2. Align columns by name (plus explicit renames) into a [`ColumnMapping`]
//! 3. Stream the source in keyset-paginated batches
//! 4. Project each batch through the mapping and hand it to a [`TargetWriter`]
//!
//! Source columns with no target counterpart are dropped with a warning.
//! Target columns nothing maps onto keep their defaults.
//!
//! Incremental syncs read a Dolt diff between two revisions instead of the
//! full table, see [`sync_table_diff`].

mod reader;
mod writer;

pub use reader::{get_source_reader, ReaderOptions, SourceReader, DEFAULT_BATCH_SIZE};
pub use writer::{get_target_writer, MySqlTargetWriter, TableUpdate, TargetWriter};
pub(crate) use writer::{apply_update, cached_metadata};

use crate::connection::SqlConnection;
use crate::error::Result;
use crate::mysql::{get_table_metadata, WritePolicy};
use futures::TryStreamExt;
use std::collections::BTreeMap;
use sync_core::{ColumnMapping, TableMetadata};
use tracing::{debug, info, warn};

/// Which source table feeds which target table.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncDirection {
    pub source_table: String,
    pub target_table: String,
    /// Source column -> target column, for columns whose names differ
    pub renames: BTreeMap<String, String>,
}

impl SyncDirection {
    pub fn new(source_table: impl Into<String>, target_table: impl Into<String>) -> Self {
        Self {
            source_table: source_table.into(),
            target_table: target_table.into(),
            renames: BTreeMap::new(),
        }
    }

    /// Source and target share a table name.
    pub fn same_table(table: impl Into<String>) -> Self {
        let table = table.into();
        Self::new(table.clone(), table)
    }

    pub fn rename(mut self, source_column: impl Into<String>, target_column: impl Into<String>) -> Self {
        self.renames.insert(source_column.into(), target_column.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub batch_size: usize,
    pub policy: WritePolicy,
    /// Read the source at this Dolt revision
    pub as_of: Option<String>,
    /// Read and map but do not write
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            policy: WritePolicy::Upsert,
            as_of: None,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub rows_read: usize,
    pub rows_written: usize,
    pub rows_deleted: usize,
    /// Source columns that had no target counterpart
    pub dropped_columns: Vec<String>,
}

/// Full sync of one table from `source` into `target`.
pub async fn sync_table<S: SqlConnection, T: SqlConnection>(
    source: &mut S,
    target: &mut T,
    direction: &SyncDirection,
    options: &SyncOptions,
) -> Result<SyncSummary> {
    let mut writer = get_target_writer(target, options.policy);
    sync_snapshot(source, &mut writer, direction, options).await
}

/// Full sync of one table from `source` into any target writer.
pub async fn sync_snapshot<S: SqlConnection, W: TargetWriter>(
    source: &mut S,
    writer: &mut W,
    direction: &SyncDirection,
    options: &SyncOptions,
) -> Result<SyncSummary> {
    info!(
        "Syncing table {} -> {}",
        direction.source_table, direction.target_table
    );

    let (source_table, mapping) = build_mapping(source, writer, direction).await?;
    let reader = get_source_reader(
        &source_table,
        ReaderOptions {
            batch_size: options.batch_size,
            as_of: options.as_of.clone(),
            columns: Some(mapping.source_columns().into_iter().map(str::to_string).collect()),
        },
    )?;

    let mut summary = SyncSummary {
        dropped_columns: mapping.dropped_source_columns().to_vec(),
        ..SyncSummary::default()
    };

    let mut batches = Box::pin(reader.batches(source));
    while let Some(batch) = batches.try_next().await? {
        summary.rows_read += batch.len();
        let update = TableUpdate::rows(batch.iter().map(|row| mapping.project(row)).collect());

        if options.dry_run {
            debug!(rows = update.rows.len(), "Dry run, skipping batch write");
            continue;
        }
        let written = writer.write(&direction.target_table, update).await?;
        summary.rows_written += written.rows_written;
        debug!(
            "Wrote batch of {} rows, {} total",
            written.rows_written, summary.rows_written
        );
    }

    info!(
        "Synced {} rows ({} written) from {} to {}",
        summary.rows_read, summary.rows_written, direction.source_table, direction.target_table
    );
    Ok(summary)
}

/// Incremental sync: apply the Dolt diff of the source table between
/// revisions `from` and `to` to the target.
///
/// Added and modified rows are upserted; removed rows are deleted by key.
pub async fn sync_table_diff<S: SqlConnection, W: TargetWriter>(
    source: &mut S,
    writer: &mut W,
    direction: &SyncDirection,
    from: &str,
    to: &str,
    dry_run: bool,
) -> Result<SyncSummary> {
    info!(
        "Syncing diff of {} between {from} and {to} into {}",
        direction.source_table, direction.target_table
    );

    let (source_table, mapping) = build_mapping(source, writer, direction).await?;
    let update = crate::dolt::read_table_diff(source, &source_table, from, to).await?;

    let mut summary = SyncSummary {
        rows_read: update.rows.len() + update.dropped_keys.len(),
        dropped_columns: mapping.dropped_source_columns().to_vec(),
        ..SyncSummary::default()
    };
    if dry_run || update.is_empty() {
        debug!(dry_run, "No diff rows written");
        return Ok(summary);
    }

    let written = writer
        .write(&direction.target_table, update.project(&mapping))
        .await?;
    summary.rows_written = written.rows_written;
    summary.rows_deleted = written.rows_deleted;

    info!(
        "Applied diff: {} rows written, {} rows deleted",
        summary.rows_written, summary.rows_deleted
    );
    Ok(summary)
}

async fn build_mapping<S: SqlConnection, W: TargetWriter>(
    source: &mut S,
    writer: &mut W,
    direction: &SyncDirection,
) -> Result<(TableMetadata, ColumnMapping)> {
    let source_table = get_table_metadata(source, &direction.source_table).await?;
    let target_table = writer.table_metadata(&direction.target_table).await?;
    let mapping = ColumnMapping::with_renames(&source_table, &target_table, &direction.renames)?;

    for column in mapping.dropped_source_columns() {
        warn!(
            "Column {}.{} has no counterpart in {}, dropping it",
            direction.source_table, column, direction.target_table
        );
    }
    Ok((source_table, mapping))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing::fixtures::{players_table, test_data_initial};
    use crate::testing::{Reply, ScriptedConnection};
    use sync_core::{Column, ColumnType, SchemaError};

    fn slim_target() -> TableMetadata {
        TableMetadata::new(
            "players_slim",
            vec![
                Column::new("first_name", ColumnType::VarChar { length: 256 }).primary_key(),
                Column::new("last_name", ColumnType::VarChar { length: 256 }).primary_key(),
                Column::new("best_rank", ColumnType::Int).nullable(),
                Column::new("nickname", ColumnType::Text).nullable(),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_sync_table_same_schema() {
        let table = players_table();
        let mut source = ScriptedConnection::new()
            .describing(&table)
            .on("SELECT `first_name`", Reply::Rows(test_data_initial()));
        let mut target = ScriptedConnection::new().describing(&table);

        let summary = sync_table(
            &mut source,
            &mut target,
            &SyncDirection::same_table("players"),
            &SyncOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(summary.rows_read, 3);
        assert_eq!(summary.rows_written, 3);
        assert!(summary.dropped_columns.is_empty());

        let inserts: Vec<_> = target
            .executed()
            .iter()
            .filter(|e| e.statement.starts_with("INSERT"))
            .collect();
        assert_eq!(inserts.len(), 3);
        assert!(inserts[0].statement.contains("ON DUPLICATE KEY UPDATE"));
    }

    #[tokio::test]
    async fn test_sync_drops_and_renames_columns() {
        let mut source = ScriptedConnection::new()
            .describing(&players_table())
            .on("SELECT `first_name`", Reply::Rows(test_data_initial()));
        let mut target = ScriptedConnection::new().describing(&slim_target());

        let direction = SyncDirection::new("players", "players_slim").rename("high_rank", "best_rank");
        let summary = sync_table(&mut source, &mut target, &direction, &SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(
            summary.dropped_columns,
            vec!["playing_style_desc", "win_percentage", "turned_pro"]
        );

        // only mapped columns are selected from the source
        let select = source
            .statements()
            .into_iter()
            .find(|s| s.starts_with("SELECT `first_name`"))
            .unwrap()
            .to_string();
        assert!(select.starts_with("SELECT `first_name`, `last_name`, `high_rank` FROM `players`"));

        let insert = target
            .executed()
            .iter()
            .find(|e| e.statement.starts_with("INSERT"))
            .unwrap();
        assert!(insert
            .statement
            .starts_with("INSERT INTO `players_slim` (`first_name`, `last_name`, `best_rank`)"));
        assert_eq!(insert.params[2], sync_core::SqlValue::Int(1));
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let table = players_table();
        let mut source = ScriptedConnection::new()
            .describing(&table)
            .on("SELECT `first_name`", Reply::Rows(test_data_initial()));
        let mut target = ScriptedConnection::new().describing(&table);

        let options = SyncOptions {
            dry_run: true,
            ..SyncOptions::default()
        };
        let summary = sync_table(&mut source, &mut target, &SyncDirection::same_table("players"), &options)
            .await
            .unwrap();
        assert_eq!(summary.rows_read, 3);
        assert_eq!(summary.rows_written, 0);
        assert!(target.statements().iter().all(|s| !s.starts_with("INSERT")));
    }

    #[tokio::test]
    async fn test_bad_rename_is_schema_error() {
        let mut source = ScriptedConnection::new().describing(&players_table());
        let mut target = ScriptedConnection::new().describing(&slim_target());

        let direction = SyncDirection::new("players", "players_slim").rename("high_rank", "peak");
        let err = sync_table(&mut source, &mut target, &direction, &SyncOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(SchemaError::ColumnNotFound { ref column, .. }) if column == "peak"
        ));
    }

    #[tokio::test]
    async fn test_source_failure_stops_sync() {
        let table = players_table();
        let mut source = ScriptedConnection::new()
            .describing(&table)
            .on("SELECT `first_name`", Reply::fail("lost connection", None));
        let mut target = ScriptedConnection::new().describing(&table);

        let err = sync_table(
            &mut source,
            &mut target,
            &SyncDirection::same_table("players"),
            &SyncOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Query { .. }));
        assert!(target.statements().iter().all(|s| !s.starts_with("INSERT")));
    }
}
