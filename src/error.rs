//! Error taxonomy for dolt-sync.
//!
//! Each variant names the stage that failed. Server lifecycle errors
//! (`Config`, `ServerStart`, `Connection`) leave the session unusable;
//! `Schema` and `Write` only fail the call that raised them.

use std::time::Duration;

/// Error type for dolt-sync operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad or missing server configuration; raised before any process spawn
    #[error("Invalid server configuration: {0}")]
    Config(String),

    /// The server process could not be spawned, bound, or exited immediately
    #[error("Failed to start server: {0}")]
    ServerStart(String),

    /// The server never accepted a connection within the deadline
    #[error(
        "Server at {address} not reachable after {attempts} attempts in {elapsed:?}: {last_error}"
    )]
    Connection {
        address: String,
        attempts: u32,
        elapsed: Duration,
        last_error: String,
    },

    /// Missing table or column, or an impossible column alignment
    #[error(transparent)]
    Schema(#[from] sync_core::SchemaError),

    /// A row could not be written
    #[error("Failed to write {} into '{table}': {message}", row_label(.row_index))]
    Write {
        table: String,
        row_index: Option<usize>,
        message: String,
        /// Server error code, when the server rejected the row
        code: Option<u16>,
    },

    /// A statement failed on the server
    #[error("Statement failed{}: {message} [{statement}]", code_label(.code))]
    Query {
        statement: String,
        message: String,
        code: Option<u16>,
    },

    /// A value read from the server could not be converted
    #[error(transparent)]
    Conversion(#[from] mysql_types::ConversionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn row_label(row_index: &Option<usize>) -> String {
    match row_index {
        Some(i) => format!("row {i}"),
        None => "rows".to_string(),
    }
}

fn code_label(code: &Option<u16>) -> String {
    code.map(|c| format!(" (code {c})")).unwrap_or_default()
}

/// MySQL error code for a duplicate key.
pub const ER_DUP_ENTRY: u16 = 1062;

impl Error {
    /// Wrap a failure of row `row_index` of a batch written to `table`.
    pub(crate) fn write(table: &str, row_index: Option<usize>, source: impl std::fmt::Display) -> Self {
        Error::Write {
            table: table.to_string(),
            row_index,
            message: source.to_string(),
            code: None,
        }
    }

    /// Wrap a server rejection of row `row_index`, keeping its error code.
    pub(crate) fn row_rejected(table: &str, row_index: usize, source: Error) -> Self {
        let code = match &source {
            Error::Query { code, .. } => *code,
            _ => None,
        };
        Error::Write {
            table: table.to_string(),
            row_index: Some(row_index),
            message: source.to_string(),
            code,
        }
    }

    /// Whether this is a duplicate primary/unique key violation.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(
            self,
            Error::Query { code: Some(ER_DUP_ENTRY), .. } | Error::Write { code: Some(ER_DUP_ENTRY), .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_error_message() {
        let err = Error::write("players", Some(3), "Duplicate entry");
        assert_eq!(
            err.to_string(),
            "Failed to write row 3 into 'players': Duplicate entry"
        );
    }

    #[test]
    fn test_query_error_message() {
        let err = Error::Query {
            statement: "SELECT 1".into(),
            message: "boom".into(),
            code: Some(ER_DUP_ENTRY),
        };
        assert_eq!(err.to_string(), "Statement failed (code 1062): boom [SELECT 1]");
        assert!(err.is_duplicate_key());

        let rejected = Error::row_rejected("players", 2, err);
        assert!(rejected.is_duplicate_key());
        assert!(matches!(rejected, Error::Write { row_index: Some(2), .. }));
    }
}
