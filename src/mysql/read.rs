use crate::connection::SqlConnection;
use crate::error::Result;
use mysql_types::MySQLDdl;
use sync_core::{Row, TableMetadata};

/// Read every row of `table`, ordered by primary key (or by all columns when
/// the table has none). `as_of` reads a Dolt revision instead of the working set.
pub async fn read_rows<C: SqlConnection>(
    conn: &mut C,
    table: &TableMetadata,
    as_of: Option<&str>,
) -> Result<Vec<Row>> {
    let columns = table.column_names();
    let order_by: Vec<&str> = if table.primary_key().is_empty() {
        columns.clone()
    } else {
        table.primary_key().iter().map(String::as_str).collect()
    };
    let statement = MySQLDdl.select_all(table.name(), &columns, &order_by, as_of);
    conn.fetch(&statement, &[]).await
}
