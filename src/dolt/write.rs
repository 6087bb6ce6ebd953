//! Commit-aware reads and writes through a running server.

use super::commit::{self, Commit};
use super::server::DoltSqlServerContext;
use crate::connection::{MySqlConnection, SqlConnection};
use crate::error::Result;
use crate::mysql::{
    get_table_metadata, read_rows, write_to_table, WriteOptions, WritePolicy, WriteSummary,
};
use crate::sync::{apply_update, cached_metadata, TableUpdate, TargetWriter};
use async_trait::async_trait;
use std::collections::HashMap;
use sync_core::{Row, TableMetadata};
use tracing::{info, warn};

impl DoltSqlServerContext {
    /// Insert `rows` into `table`.
    ///
    /// With `commit` set, the inserts and the Dolt commit run in one
    /// transaction: any failure rolls everything back and no commit is made.
    pub async fn write_rows(
        &self,
        table: &str,
        rows: &[Row],
        commit: bool,
        message: Option<&str>,
    ) -> Result<Option<Commit>> {
        let mut conn = self.connection().await?;
        let metadata = get_table_metadata(&mut conn, table).await?;
        if !commit {
            write_to_table(&mut conn, &metadata, rows, WriteOptions::insert()).await?;
            return Ok(None);
        }

        let message = message
            .map(str::to_string)
            .unwrap_or_else(|| format!("Wrote {} rows to {table}", rows.len()));
        conn.begin_transaction().await?;
        let written = write_to_table(&mut conn, &metadata, rows, WriteOptions::insert()).await;
        finish_commit(&mut conn, &message, written.map(|_| ()))
            .await
            .map(Some)
    }

    /// Run one statement, optionally committing its effect.
    pub async fn execute(
        &self,
        statement: &str,
        commit: bool,
        message: Option<&str>,
    ) -> Result<Option<Commit>> {
        let mut conn = self.connection().await?;
        if !commit {
            conn.execute(statement, &[]).await?;
            return Ok(None);
        }

        let message = message
            .map(str::to_string)
            .unwrap_or_else(|| format!("Executed: {statement}"));
        conn.begin_transaction().await?;
        let executed = conn.execute(statement, &[]).await;
        finish_commit(&mut conn, &message, executed.map(|_| ()))
            .await
            .map(Some)
    }

    /// Commit history, newest first.
    pub async fn log(&self, limit: Option<usize>) -> Result<Vec<Commit>> {
        commit::log(&mut self.connection().await?, limit).await
    }

    pub async fn head(&self) -> Result<Commit> {
        commit::head(&mut self.connection().await?).await
    }

    /// All rows of `table`, at revision `as_of` when given.
    pub async fn read_table(&self, table: &str, as_of: Option<&str>) -> Result<Vec<Row>> {
        let mut conn = self.connection().await?;
        let metadata = get_table_metadata(&mut conn, table).await?;
        read_rows(&mut conn, &metadata, as_of).await
    }

    /// Changes to `table` between two revisions.
    pub async fn read_table_diff(&self, table: &str, from: &str, to: &str) -> Result<TableUpdate> {
        let mut conn = self.connection().await?;
        let metadata = get_table_metadata(&mut conn, table).await?;
        super::read_table_diff(&mut conn, &metadata, from, to).await
    }

    /// A writer that collects table updates into one commit.
    pub async fn target_writer(&self) -> Result<DoltTargetWriter<MySqlConnection>> {
        Ok(DoltTargetWriter::new(self.connection().await?))
    }
}

/// Close the transaction opened before `work` ran: commit it together with
/// a Dolt commit, or roll it back if anything failed.
async fn finish_commit<C: SqlConnection>(
    conn: &mut C,
    message: &str,
    work: Result<()>,
) -> Result<Commit> {
    let committed = match work {
        Ok(()) => commit::commit(conn, message).await,
        Err(e) => Err(e),
    };

    match committed {
        Ok(hash) => {
            conn.commit_transaction().await?;
            info!("Created commit {hash}: {message}");
            commit::head(conn).await
        }
        Err(e) => {
            if let Err(rollback_err) = conn.rollback_transaction().await {
                warn!("Rollback failed: {rollback_err}");
            }
            Err(e)
        }
    }
}

/// Target writer that applies updates inside one open transaction and turns
/// them into a single Dolt commit.
///
/// Nothing is visible to other sessions until [`DoltTargetWriter::commit`];
/// [`DoltTargetWriter::rollback`] discards everything written so far.
pub struct DoltTargetWriter<C> {
    conn: C,
    tables: HashMap<String, TableMetadata>,
    policy: WritePolicy,
    in_transaction: bool,
}

impl<C: SqlConnection> DoltTargetWriter<C> {
    pub fn new(conn: C) -> Self {
        Self {
            conn,
            tables: HashMap::new(),
            policy: WritePolicy::Upsert,
            in_transaction: false,
        }
    }

    pub fn with_policy(mut self, policy: WritePolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn ensure_transaction(&mut self) -> Result<()> {
        if !self.in_transaction {
            self.conn.begin_transaction().await?;
            self.in_transaction = true;
        }
        Ok(())
    }

    /// Commit everything written so far, returning the new commit hash.
    pub async fn commit(mut self, message: &str) -> Result<String> {
        self.ensure_transaction().await?;
        match commit::commit(&mut self.conn, message).await {
            Ok(hash) => {
                self.conn.commit_transaction().await?;
                info!("Created commit {hash}: {message}");
                Ok(hash)
            }
            Err(e) => {
                self.rollback().await?;
                Err(e)
            }
        }
    }

    /// Discard everything written so far.
    pub async fn rollback(mut self) -> Result<()> {
        if self.in_transaction {
            self.conn.rollback_transaction().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<C: SqlConnection> TargetWriter for DoltTargetWriter<C> {
    async fn table_metadata(&mut self, table: &str) -> Result<TableMetadata> {
        cached_metadata(&mut self.conn, &mut self.tables, table).await
    }

    async fn write(&mut self, table: &str, update: TableUpdate) -> Result<WriteSummary> {
        let metadata = self.table_metadata(table).await?;
        self.ensure_transaction().await?;
        apply_update(&mut self.conn, &metadata, &update, self.policy).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing::fixtures::{
        dolt_log_row, player_key, players_table, test_data_append_single_row, test_data_initial,
    };
    use crate::testing::{Reply, ScriptedConnection};

    fn committing_conn() -> ScriptedConnection {
        ScriptedConnection::new()
            .describing(&players_table())
            .on("DOLT_COMMIT", Reply::Rows(vec![Row::new().with("hash", "abc123")]))
            .on("dolt_log", Reply::Rows(vec![dolt_log_row("abc123", "Initial data")]))
    }

    #[tokio::test]
    async fn test_committed_write() {
        let mut conn = committing_conn();
        let table = players_table();
        let rows = test_data_initial();

        conn.begin_transaction().await.unwrap();
        let written = write_to_table(&mut conn, &table, &rows, WriteOptions::insert()).await;
        let commit = finish_commit(&mut conn, "Initial data", written.map(|_| ()))
            .await
            .unwrap();
        assert_eq!(commit.hash, "abc123");

        let statements = conn.statements();
        assert_eq!(statements[0], "START TRANSACTION");
        assert!(statements[1..4].iter().all(|s| s.starts_with("INSERT")));
        assert!(statements[4].starts_with("CALL DOLT_COMMIT"));
        assert_eq!(statements[5], "COMMIT");
    }

    #[tokio::test]
    async fn test_failed_write_makes_no_commit() {
        let mut conn = committing_conn()
            .on("INSERT", Reply::Affected(1))
            .on("INSERT", Reply::fail("Duplicate entry", Some(crate::error::ER_DUP_ENTRY)));
        let table = players_table();
        let rows = test_data_initial();

        conn.begin_transaction().await.unwrap();
        let written = write_to_table(&mut conn, &table, &rows, WriteOptions::insert()).await;
        let err = finish_commit(&mut conn, "Initial data", written.map(|_| ()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Write { row_index: Some(1), .. }));

        let statements = conn.statements();
        assert!(statements.iter().all(|s| !s.contains("DOLT_COMMIT")));
        assert_eq!(statements.last().copied(), Some("ROLLBACK"));
    }

    #[tokio::test]
    async fn test_target_writer_single_commit() {
        let mut writer = DoltTargetWriter::new(committing_conn());
        writer
            .write("players", TableUpdate::rows(test_data_initial()))
            .await
            .unwrap();
        writer
            .write(
                "players",
                TableUpdate {
                    rows: test_data_append_single_row(),
                    dropped_keys: vec![player_key("Roger", "Federer")],
                },
            )
            .await
            .unwrap();
        let begins = writer
            .conn
            .statements()
            .into_iter()
            .filter(|s| *s == "START TRANSACTION")
            .count();
        assert_eq!(begins, 1);

        let hash = writer.commit("Sync players").await.unwrap();
        assert_eq!(hash, "abc123");
    }

    #[tokio::test]
    async fn test_target_writer_rollback() {
        let mut writer = DoltTargetWriter::new(committing_conn());
        writer
            .write("players", TableUpdate::rows(test_data_initial()))
            .await
            .unwrap();
        writer.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_target_writer_commit_without_writes() {
        let writer = DoltTargetWriter::new(committing_conn());
        assert_eq!(writer.commit("Nothing").await.unwrap(), "abc123");
    }
}
