//! Reading table changes between two revisions.

use crate::connection::SqlConnection;
use crate::error::{Error, Result};
use crate::sync::TableUpdate;
use mysql_types::{quote_identifier, quote_literal};
use sync_core::{Row, SchemaError, SqlValue, TableMetadata};
use tracing::debug;

/// Changes to `table` from revision `from` to revision `to`.
///
/// Uses the `DOLT_DIFF()` table function. Added and modified rows are
/// returned with their `to` values; removed rows yield their `from` key.
/// The table needs a primary key so removed rows can be identified.
pub async fn read_table_diff<C: SqlConnection>(
    conn: &mut C,
    table: &TableMetadata,
    from: &str,
    to: &str,
) -> Result<TableUpdate> {
    let key = table.primary_key();
    if key.is_empty() {
        return Err(SchemaError::MissingPrimaryKey(table.name().to_string()).into());
    }

    let mut select = vec!["diff_type".to_string()];
    select.extend(
        table
            .columns()
            .iter()
            .map(|c| quote_identifier(&format!("to_{}", c.name))),
    );
    select.extend(key.iter().map(|k| quote_identifier(&format!("from_{k}"))));

    let statement = format!(
        "SELECT {} FROM DOLT_DIFF({}, {}, {})",
        select.join(", "),
        quote_literal(from),
        quote_literal(to),
        quote_literal(table.name())
    );

    let mut update = TableUpdate::default();
    for row in conn.fetch(&statement, &[]).await? {
        let diff_type = row
            .get("diff_type")
            .and_then(SqlValue::as_str)
            .unwrap_or_default()
            .to_string();
        match diff_type.as_str() {
            "added" | "modified" => update.rows.push(side(&row, "to_", table.column_names())),
            "removed" => update.dropped_keys.push(side(&row, "from_", key)),
            other => {
                return Err(Error::Query {
                    statement,
                    message: format!("unexpected diff_type '{other}'"),
                    code: None,
                })
            }
        }
    }

    debug!(
        table = table.name(),
        from,
        to,
        upserts = update.rows.len(),
        deletes = update.dropped_keys.len(),
        "Read table diff"
    );
    Ok(update)
}

/// Strip `prefix` from the named diff columns.
fn side<S: AsRef<str>>(row: &Row, prefix: &str, columns: impl IntoIterator<Item = S>) -> Row {
    columns
        .into_iter()
        .map(|c| {
            let name = c.as_ref();
            let value = row
                .get(&format!("{prefix}{name}"))
                .cloned()
                .unwrap_or(SqlValue::Null);
            (name.to_string(), value)
        })
        .collect()
}
