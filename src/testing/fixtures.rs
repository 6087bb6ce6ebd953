//! Tennis-player test table and the row sets the sync tests write into it.

use crate::config::{ListenerConfig, ServerFile};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use sync_core::{Column, ColumnType, PositionalRows, Row, SqlValue, TableMetadata};

pub const TEST_TABLE: &str = "players";

/// Columns in declared order.
pub fn test_table_columns() -> Vec<Column> {
    vec![
        Column::new("first_name", ColumnType::VarChar { length: 256 }).primary_key(),
        Column::new("last_name", ColumnType::VarChar { length: 256 }).primary_key(),
        Column::new("playing_style_desc", ColumnType::Text).nullable(),
        Column::new("win_percentage", ColumnType::Double).nullable(),
        Column::new("high_rank", ColumnType::Int).nullable(),
        Column::new("turned_pro", ColumnType::Int).nullable(),
    ]
}

pub fn players_table() -> TableMetadata {
    match TableMetadata::new(TEST_TABLE, test_table_columns()) {
        Ok(table) => table,
        Err(e) => panic!("invalid test table: {e}"),
    }
}

fn player(
    first_name: &str,
    last_name: &str,
    style: &str,
    win_percentage: f64,
    high_rank: i64,
    turned_pro: i64,
) -> Row {
    Row::new()
        .with("first_name", first_name)
        .with("last_name", last_name)
        .with("playing_style_desc", style)
        .with("win_percentage", win_percentage)
        .with("high_rank", high_rank)
        .with("turned_pro", turned_pro)
}

pub fn test_data_initial() -> Vec<Row> {
    vec![
        player("Novak", "Djokovic", "aggressive/counterpunch", 83.1, 1, 2003),
        player("Rafael", "Nadal", "aggressive/counterpunch", 83.2, 1, 2001),
        player("Roger", "Federer", "aggressive/all-court", 81.2, 1, 1998),
    ]
}

/// `test_data_initial` as tuples in lexicographic column order, which differs
/// from the declared order.
pub fn test_data_initial_col_sort() -> PositionalRows {
    let mut columns: Vec<String> = test_table_columns().into_iter().map(|c| c.name).collect();
    columns.sort();
    PositionalRows::from_rows(columns, &test_data_initial())
}

pub fn test_data_append_single_row() -> Vec<Row> {
    vec![player("Stefanos", "Tsitsipas", "aggressive", 67.6, 5, 2016)]
}

pub fn test_data_append_multiple_rows() -> Vec<Row> {
    vec![
        player("Alexander", "Zverev", "aggressive/counterpunch", 65.8, 3, 2013),
        player("Dominic", "Thiem", "aggressive", 65.1, 3, 2011),
    ]
}

/// Raises Stefanos Tsitsipas' best ranking.
pub fn update_row_statement(table: &str) -> String {
    format!(
        "UPDATE {} SET high_rank = 3 WHERE first_name = 'Stefanos' AND last_name = 'Tsitsipas'",
        mysql_types::quote_identifier(table)
    )
}

/// Removes Roger Federer by primary key.
pub fn drop_pk_statement(table: &str) -> String {
    format!(
        "DELETE FROM {} WHERE first_name = 'Roger' AND last_name = 'Federer'",
        mysql_types::quote_identifier(table)
    )
}

/// Assert two row sets hold the same rows, ignoring order.
pub fn assert_same_rows(expected: &[Row], actual: &[Row]) {
    assert_eq!(
        expected.len(),
        actual.len(),
        "row count differs: expected {expected:?}, got {actual:?}"
    );
    let mut remaining: Vec<&Row> = actual.iter().collect();
    for row in expected {
        match remaining.iter().position(|candidate| *candidate == row) {
            Some(i) => {
                remaining.swap_remove(i);
            }
            None => panic!("row {row:?} missing from {actual:?}"),
        }
    }
}

/// Primary key of a player row.
pub fn player_key(first_name: &str, last_name: &str) -> Row {
    Row::new()
        .with("first_name", SqlValue::from(first_name))
        .with("last_name", SqlValue::from(last_name))
}

/// A `dolt_log` row as the server returns it.
pub fn dolt_log_row(hash: &str, message: &str) -> Row {
    let date = chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .unwrap_or_default();
    Row::new()
        .with("commit_hash", hash)
        .with("committer", "root")
        .with("email", "root@localhost")
        .with("date", date)
        .with("message", message)
}

/// Write a server file with the given listener into `dir`.
pub fn write_server_config(
    dir: &Path,
    port: u16,
    max_connections: u32,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let file = ServerFile {
        listener: Some(ListenerConfig {
            port,
            max_connections: Some(max_connections),
            ..ListenerConfig::default()
        }),
        other: BTreeMap::new(),
    };
    let path = dir.join("server_conf.yaml");
    std::fs::write(&path, file.to_yaml()?)?;
    Ok(path)
}

/// An unused local TCP port.
pub fn free_port() -> std::io::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
