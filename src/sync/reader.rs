//! Source readers
//!
//! A `SourceReader` is a description of what to read; it holds no cursor.
//! Every call to [`SourceReader::batches`] starts a fresh scan, so a reader can
//! be replayed after a failed sync.

use crate::connection::SqlConnection;
use crate::error::Result;
use futures::{Stream, TryStreamExt};
use mysql_types::MySQLDdl;
use sync_core::{Row, SchemaError, SqlValue, TableMetadata};
use tracing::debug;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct ReaderOptions {
    pub batch_size: usize,
    /// Dolt revision to read at (`AS OF`); `None` reads current data
    pub as_of: Option<String>,
    /// Columns to read; `None` reads every column
    pub columns: Option<Vec<String>>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            as_of: None,
            columns: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceReader {
    table: String,
    columns: Vec<String>,
    /// Primary key; empty means offset paging
    key: Vec<String>,
    batch_size: usize,
    as_of: Option<String>,
}

/// Where the next page starts.
#[derive(Debug)]
enum Cursor {
    Start,
    AfterKey(Vec<SqlValue>),
    Offset(u64),
    Done,
}

/// Build a reader over `table`.
///
/// Requested columns must exist. Primary-key columns are always read, since
/// keyset paging needs the last key of each page.
pub fn get_source_reader(table: &TableMetadata, options: ReaderOptions) -> Result<SourceReader> {
    let key: Vec<String> = table.primary_key().to_vec();
    let mut columns = match options.columns {
        Some(columns) => {
            for column in &columns {
                if !table.has_column(column) {
                    return Err(SchemaError::ColumnNotFound {
                        table: table.name().to_string(),
                        column: column.clone(),
                    }
                    .into());
                }
            }
            columns
        }
        None => table.column_names().into_iter().map(str::to_string).collect(),
    };
    for key_column in &key {
        if !columns.contains(key_column) {
            columns.push(key_column.clone());
        }
    }

    Ok(SourceReader {
        table: table.name().to_string(),
        columns,
        key,
        batch_size: options.batch_size.max(1),
        as_of: options.as_of,
    })
}

impl SourceReader {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Lazily read the table in pages of at most `batch_size` rows.
    ///
    /// Nothing is queried until the stream is polled. The stream ends after
    /// the first short or empty page.
    pub fn batches<'a, C: SqlConnection>(
        &'a self,
        conn: &'a mut C,
    ) -> impl Stream<Item = Result<Vec<Row>>> + 'a {
        futures::stream::try_unfold((conn, Cursor::Start), move |(conn, cursor)| {
            self.next_page(conn, cursor)
        })
    }

    /// Read the whole table into memory.
    pub async fn read_all<C: SqlConnection>(&self, conn: &mut C) -> Result<Vec<Row>> {
        let pages: Vec<Vec<Row>> = self.batches(conn).try_collect().await?;
        Ok(pages.into_iter().flatten().collect())
    }

    async fn next_page<'c, C: SqlConnection>(
        &self,
        conn: &'c mut C,
        cursor: Cursor,
    ) -> Result<Option<(Vec<Row>, (&'c mut C, Cursor))>> {
        let ddl = MySQLDdl;
        let as_of = self.as_of.as_deref();
        let (statement, params, offset) = match cursor {
            Cursor::Done => return Ok(None),
            Cursor::Start if !self.key.is_empty() => (
                ddl.select_keyset_page(&self.table, &self.columns, &self.key, false, self.batch_size, as_of),
                Vec::new(),
                0,
            ),
            Cursor::AfterKey(last) => (
                ddl.select_keyset_page(&self.table, &self.columns, &self.key, true, self.batch_size, as_of),
                last,
                0,
            ),
            Cursor::Start => (
                ddl.select_offset_page(&self.table, &self.columns, self.batch_size, 0, as_of),
                Vec::new(),
                0,
            ),
            Cursor::Offset(offset) => (
                ddl.select_offset_page(&self.table, &self.columns, self.batch_size, offset, as_of),
                Vec::new(),
                offset,
            ),
        };

        let rows = conn.fetch(&statement, &params).await?;
        debug!(table = %self.table, rows = rows.len(), "Read batch");
        if rows.is_empty() {
            return Ok(None);
        }

        let next = if rows.len() < self.batch_size {
            Cursor::Done
        } else if self.key.is_empty() {
            Cursor::Offset(offset + rows.len() as u64)
        } else {
            match rows.last() {
                Some(last) => Cursor::AfterKey(last.values_in(&self.key)),
                None => Cursor::Done,
            }
        };
        Ok(Some((rows, (conn, next))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{players_table, test_data_append_multiple_rows, test_data_initial};
    use crate::testing::{Reply, ScriptedConnection};
    use futures::StreamExt;
    use sync_core::{Column, ColumnType};

    fn two_per_page() -> ReaderOptions {
        ReaderOptions {
            batch_size: 2,
            ..ReaderOptions::default()
        }
    }

    #[tokio::test]
    async fn test_keyset_pagination() {
        let initial = test_data_initial();
        let more = test_data_append_multiple_rows();
        let mut conn = ScriptedConnection::new()
            .on("SELECT", Reply::Rows(initial[..2].to_vec()))
            .on("SELECT", Reply::Rows(vec![initial[2].clone(), more[0].clone()]))
            .on("SELECT", Reply::Rows(vec![more[1].clone()]));

        let reader = get_source_reader(&players_table(), two_per_page()).unwrap();
        let rows = reader.read_all(&mut conn).await.unwrap();
        assert_eq!(rows.len(), 5);

        let executed = conn.executed();
        assert_eq!(executed.len(), 3);
        assert!(!executed[0].statement.contains("WHERE"));
        assert!(executed[1]
            .statement
            .contains("WHERE (`first_name`, `last_name`) > (?, ?)"));
        assert_eq!(
            executed[1].params,
            vec![SqlValue::from("Rafael"), SqlValue::from("Nadal")]
        );
        assert_eq!(
            executed[2].params,
            vec![SqlValue::from("Alexander"), SqlValue::from("Zverev")]
        );
    }

    #[tokio::test]
    async fn test_full_last_page_needs_one_more_query() {
        let initial = test_data_initial();
        let mut conn = ScriptedConnection::new().on("SELECT", Reply::Rows(initial[..2].to_vec()));

        let reader = get_source_reader(&players_table(), two_per_page()).unwrap();
        let rows = reader.read_all(&mut conn).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(conn.executed().len(), 2);
    }

    #[tokio::test]
    async fn test_batches_are_lazy_and_restartable() {
        let mut conn = ScriptedConnection::new()
            .always("SELECT", Reply::Rows(vec![test_data_initial()[0].clone()]));
        let reader = get_source_reader(&players_table(), two_per_page()).unwrap();

        {
            let stream = reader.batches(&mut conn);
            drop(stream);
        }
        assert!(conn.executed().is_empty());

        for _ in 0..2 {
            let mut stream = Box::pin(reader.batches(&mut conn));
            let first = stream.next().await.unwrap().unwrap();
            assert_eq!(first.len(), 1);
            assert!(stream.next().await.is_none());
        }
        assert_eq!(conn.executed().len(), 2);
        assert_eq!(conn.executed()[0], conn.executed()[1]);
    }

    #[tokio::test]
    async fn test_offset_paging_without_primary_key() {
        let table = TableMetadata::new(
            "events",
            vec![
                Column::new("name", ColumnType::Text),
                Column::new("at", ColumnType::DateTime),
            ],
        )
        .unwrap();
        let row = Row::new().with("name", "a");
        let mut conn = ScriptedConnection::new()
            .on("SELECT", Reply::Rows(vec![row.clone(), row.clone()]))
            .on("SELECT", Reply::Rows(vec![row]));

        let reader = get_source_reader(&table, two_per_page()).unwrap();
        reader.read_all(&mut conn).await.unwrap();

        let statements = conn.statements();
        assert!(statements[0].ends_with("ORDER BY `name`, `at` LIMIT 2 OFFSET 0"));
        assert!(statements[1].ends_with("ORDER BY `name`, `at` LIMIT 2 OFFSET 2"));
    }

    #[test]
    fn test_key_columns_always_read() {
        let reader = get_source_reader(
            &players_table(),
            ReaderOptions {
                columns: Some(vec!["high_rank".into()]),
                ..ReaderOptions::default()
            },
        )
        .unwrap();
        assert_eq!(reader.columns(), ["high_rank", "first_name", "last_name"]);
    }

    #[test]
    fn test_unknown_column_rejected() {
        let err = get_source_reader(
            &players_table(),
            ReaderOptions {
                columns: Some(vec!["backhand".into()]),
                ..ReaderOptions::default()
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("backhand"));
    }

    #[tokio::test]
    async fn test_as_of_revision() {
        let mut conn = ScriptedConnection::new();
        let reader = get_source_reader(
            &players_table(),
            ReaderOptions {
                as_of: Some("HEAD~2".into()),
                ..ReaderOptions::default()
            },
        )
        .unwrap();
        reader.read_all(&mut conn).await.unwrap();
        assert!(conn.statements()[0].contains("FROM `players` AS OF 'HEAD~2'"));
    }
}
