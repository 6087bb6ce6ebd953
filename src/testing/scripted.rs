//! In-memory `SqlConnection` that records statements and replays canned replies.

use crate::connection::SqlConnection;
use crate::error::{Error, Result};
use async_trait::async_trait;
use mysql_types::MySQLDdl;
use sync_core::{Row, SqlValue, TableMetadata};

/// Canned reply for a statement.
#[derive(Debug, Clone)]
pub enum Reply {
    Rows(Vec<Row>),
    Affected(u64),
    Fail { message: String, code: Option<u16> },
}

impl Reply {
    pub fn fail(message: impl Into<String>, code: Option<u16>) -> Self {
        Reply::Fail {
            message: message.into(),
            code,
        }
    }
}

/// A statement the connection has seen.
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    pub statement: String,
    pub params: Vec<SqlValue>,
}

#[derive(Debug)]
struct Rule {
    needle: String,
    reply: Reply,
    /// None means the rule never runs out
    remaining: Option<usize>,
}

/// Scripted connection for unit tests.
///
/// Rules are matched in the order they were added: the first rule whose
/// needle occurs in the statement text and that has uses left answers it.
/// Unmatched queries return no rows; unmatched statements affect one row.
#[derive(Debug, Default)]
pub struct ScriptedConnection {
    rules: Vec<Rule>,
    executed: Vec<Executed>,
}

impl ScriptedConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next statement containing `needle` once.
    pub fn on(mut self, needle: impl Into<String>, reply: Reply) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            reply,
            remaining: Some(1),
        });
        self
    }

    /// Answer every statement containing `needle`.
    pub fn always(mut self, needle: impl Into<String>, reply: Reply) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            reply,
            remaining: None,
        });
        self
    }

    /// Answer schema introspection for `table` with its own metadata.
    pub fn describing(self, table: &TableMetadata) -> Self {
        let columns = table
            .columns()
            .iter()
            .map(|c| {
                let column_type = MySQLDdl.column_type(&c.column_type).to_lowercase();
                let data_type = column_type
                    .split('(')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                let (precision, scale) = match c.column_type {
                    sync_core::ColumnType::Decimal { precision, scale } => {
                        (SqlValue::UInt(precision.into()), SqlValue::UInt(scale.into()))
                    }
                    _ => (SqlValue::Null, SqlValue::Null),
                };
                Row::new()
                    .with("column_name", c.name.as_str())
                    .with("data_type", data_type)
                    .with("column_type", column_type)
                    .with("is_nullable", if c.nullable { "YES" } else { "NO" })
                    .with("numeric_precision", precision)
                    .with("numeric_scale", scale)
            })
            .collect();
        let keys = table
            .primary_key()
            .iter()
            .map(|k| Row::new().with("column_name", k.as_str()))
            .collect();

        self.always("INFORMATION_SCHEMA.COLUMNS", Reply::Rows(columns))
            .always("INFORMATION_SCHEMA.KEY_COLUMN_USAGE", Reply::Rows(keys))
    }

    pub fn executed(&self) -> &[Executed] {
        &self.executed
    }

    pub fn statements(&self) -> Vec<&str> {
        self.executed.iter().map(|e| e.statement.as_str()).collect()
    }

    fn reply(&mut self, statement: &str, params: &[SqlValue]) -> Option<Reply> {
        self.executed.push(Executed {
            statement: statement.to_string(),
            params: params.to_vec(),
        });

        let rule = self.rules.iter_mut().find(|rule| {
            rule.remaining != Some(0) && statement.contains(rule.needle.as_str())
        })?;
        if let Some(remaining) = rule.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(rule.reply.clone())
    }
}

fn failure(statement: &str, message: String, code: Option<u16>) -> Error {
    Error::Query {
        statement: statement.to_string(),
        message,
        code,
    }
}

#[async_trait]
impl SqlConnection for ScriptedConnection {
    async fn execute(&mut self, statement: &str, params: &[SqlValue]) -> Result<u64> {
        match self.reply(statement, params) {
            None => Ok(1),
            Some(Reply::Affected(n)) => Ok(n),
            Some(Reply::Rows(rows)) => Ok(rows.len() as u64),
            Some(Reply::Fail { message, code }) => Err(failure(statement, message, code)),
        }
    }

    async fn fetch(&mut self, statement: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        match self.reply(statement, params) {
            None | Some(Reply::Affected(_)) => Ok(Vec::new()),
            Some(Reply::Rows(rows)) => Ok(rows),
            Some(Reply::Fail { message, code }) => Err(failure(statement, message, code)),
        }
    }

    async fn ping(&mut self) -> Result<()> {
        Ok(())
    }
}
