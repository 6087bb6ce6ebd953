//! Commit history and commit creation through SQL.

use crate::connection::SqlConnection;
use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use mysql_types::quote_literal;
use serde::Serialize;
use sync_core::{Row, SqlValue};

const LOG_QUERY: &str =
    "SELECT commit_hash, committer, email, date, message FROM dolt_log ORDER BY date DESC";

/// One entry of a repository's commit history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Commit {
    pub hash: String,
    pub committer: String,
    pub email: String,
    pub date: NaiveDateTime,
    pub message: String,
}

impl Commit {
    fn from_row(row: &Row) -> Result<Self> {
        let date = match row.get("date") {
            Some(SqlValue::DateTime(dt)) => *dt,
            Some(SqlValue::Date(d)) => d.and_hms_opt(0, 0, 0).unwrap_or_default(),
            Some(SqlValue::Text(s)) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .map_err(|e| log_error(format!("bad commit date '{s}': {e}")))?,
            other => return Err(log_error(format!("unexpected commit date {other:?}"))),
        };

        Ok(Self {
            hash: text(row, "commit_hash")?,
            committer: text(row, "committer")?,
            email: text(row, "email")?,
            date,
            message: text(row, "message")?,
        })
    }
}

fn log_error(message: String) -> Error {
    Error::Query {
        statement: LOG_QUERY.to_string(),
        message,
        code: None,
    }
}

fn text(row: &Row, column: &str) -> Result<String> {
    match row.get(column) {
        Some(SqlValue::Text(s)) => Ok(s.clone()),
        Some(SqlValue::Bytes(b)) => Ok(String::from_utf8_lossy(b).into_owned()),
        Some(SqlValue::Null) | None => Ok(String::new()),
        Some(other) => Err(log_error(format!("unexpected {column} value {other}"))),
    }
}

/// Commit history, newest first. `limit` caps the number of entries.
pub async fn log<C: SqlConnection>(conn: &mut C, limit: Option<usize>) -> Result<Vec<Commit>> {
    let statement = match limit {
        Some(n) => format!("{LOG_QUERY} LIMIT {n}"),
        None => LOG_QUERY.to_string(),
    };
    conn.fetch(&statement, &[])
        .await?
        .iter()
        .map(Commit::from_row)
        .collect()
}

/// The most recent commit.
pub async fn head<C: SqlConnection>(conn: &mut C) -> Result<Commit> {
    log(conn, Some(1))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| log_error("repository has no commits".to_string()))
}

/// Stage every change and commit it, returning the new commit hash.
pub async fn commit<C: SqlConnection>(conn: &mut C, message: &str) -> Result<String> {
    let statement = format!("CALL DOLT_COMMIT('-A', '-m', {})", quote_literal(message));
    let rows = conn.fetch(&statement, &[]).await?;
    rows.first()
        .and_then(|row| row.get("hash"))
        .and_then(SqlValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::Query {
            statement,
            message: "DOLT_COMMIT returned no hash".to_string(),
            code: None,
        })
}
