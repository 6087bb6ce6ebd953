//! Dolt SQL server lifecycle and commit history tests
//!
//! Needs a `dolt` binary (`DOLT_TEST_BINARY`, default `dolt` on PATH) with
//! `user.name` and `user.email` configured; the sync test also needs MySQL at
//! `MYSQL_TEST_URL`. Run with `cargo test -- --ignored`.

use dolt_sync::mysql::{read_rows, WritePolicy};
use dolt_sync::sync::get_target_writer;
use dolt_sync::testing::fixtures::{
    assert_same_rows, drop_pk_statement, players_table, test_data_append_multiple_rows,
    test_data_append_single_row, test_data_initial, update_row_statement, TEST_TABLE,
};
use dolt_sync::testing::{
    create_players_table, init_test_logging, mysql_test_url, start_test_server,
};
use dolt_sync::{
    sync_table_diff, DoltSqlServerContext, Error, MySqlConnection, ServerState, SyncDirection,
};
use mysql_types::MySQLDdl;
use sync_core::SqlValue;

async fn create_table(context: &DoltSqlServerContext) -> Result<(), Box<dyn std::error::Error>> {
    context
        .execute(&MySQLDdl.create_table(&players_table()), false, None)
        .await?;
    Ok(())
}

/// Writes the five commits: initial, append single, append multiple, update, drop.
async fn write_history(context: &DoltSqlServerContext) -> Result<(), Box<dyn std::error::Error>> {
    create_table(context).await?;
    context
        .write_rows(TEST_TABLE, &test_data_initial(), true, Some("Initial data"))
        .await?;
    context
        .write_rows(TEST_TABLE, &test_data_append_single_row(), true, Some("Append single row"))
        .await?;
    context
        .write_rows(TEST_TABLE, &test_data_append_multiple_rows(), true, None)
        .await?;
    context
        .execute(&update_row_statement(TEST_TABLE), true, Some("Update Tsitsipas"))
        .await?;
    context
        .execute(&drop_pk_statement(TEST_TABLE), true, Some("Drop Federer"))
        .await?;
    Ok(())
}

#[tokio::test]
#[ignore = "needs a dolt binary"]
async fn test_server_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    init_test_logging();
    let dir = tempfile::tempdir()?;
    let mut context = start_test_server(dir.path()).await?;
    assert_eq!(context.state(), ServerState::Running);

    // verifying twice is harmless
    context.verify_connection().await?;

    // a second session on the same repository is refused
    let mut second = DoltSqlServerContext::new(context.dolt().clone(), {
        let conf = dolt_sync::testing::fixtures::write_server_config(
            dir.path(),
            dolt_sync::testing::fixtures::free_port()?,
            2,
        )?;
        dolt_sync::ServerConfig::new("root", conf)
            .with_dolt_binary(dolt_sync::testing::dolt_test_binary())
    });
    let err = second.start_server().await.unwrap_err();
    assert!(matches!(err, Error::ServerStart(_)));

    context.stop_server().await?;
    context.stop_server().await?;
    assert_eq!(context.state(), ServerState::Stopped);
    assert!(context.connection().await.is_err());

    // the repository can be served again after a stop
    context.start_server().await?;
    context.verify_connection().await?;
    context.stop_server().await?;
    Ok(())
}

#[tokio::test]
#[ignore = "needs a dolt binary"]
async fn test_five_step_commit_history() -> Result<(), Box<dyn std::error::Error>> {
    init_test_logging();
    let dir = tempfile::tempdir()?;
    let mut context = start_test_server(dir.path()).await?;
    write_history(&context).await?;

    let log = context.log(None).await?;
    let messages: Vec<&str> = log.iter().map(|c| c.message.as_str()).collect();
    assert_eq!(messages.len(), 6);
    assert_eq!(
        &messages[..5],
        &[
            "Drop Federer",
            "Update Tsitsipas",
            "Wrote 2 rows to players",
            "Append single row",
            "Initial data",
        ]
    );
    assert_eq!(context.head().await?.hash, log[0].hash);

    // each commit pins the table as it was
    let initial = &log[4].hash;
    assert_same_rows(
        &test_data_initial(),
        &context.read_table(TEST_TABLE, Some(initial)).await?,
    );
    let current = context.read_table(TEST_TABLE, None).await?;
    assert_eq!(current.len(), 5);
    let tsitsipas = current
        .iter()
        .find(|r| r.get("last_name") == Some(&SqlValue::from("Tsitsipas")))
        .ok_or("Tsitsipas missing")?;
    assert_eq!(tsitsipas.get("high_rank"), Some(&SqlValue::Int(3)));

    // the last two commits as a diff
    let diff = context
        .read_table_diff(TEST_TABLE, &log[2].hash, &log[0].hash)
        .await?;
    assert_eq!(diff.rows.len(), 1);
    assert_eq!(diff.dropped_keys.len(), 1);

    context.stop_server().await?;
    Ok(())
}

#[tokio::test]
#[ignore = "needs a dolt binary"]
async fn test_failed_write_leaves_history_unchanged() -> Result<(), Box<dyn std::error::Error>> {
    init_test_logging();
    let dir = tempfile::tempdir()?;
    let mut context = start_test_server(dir.path()).await?;
    create_table(&context).await?;
    context
        .write_rows(TEST_TABLE, &test_data_initial(), true, Some("Initial data"))
        .await?;
    let before = context.log(None).await?;

    // second row duplicates an existing key
    let mut rows = test_data_append_single_row();
    rows.push(test_data_initial()[0].clone());
    let err = context
        .write_rows(TEST_TABLE, &rows, true, Some("Should not exist"))
        .await
        .unwrap_err();
    assert!(err.is_duplicate_key());

    assert_eq!(context.log(None).await?, before);
    assert_same_rows(
        &test_data_initial(),
        &context.read_table(TEST_TABLE, None).await?,
    );

    context.stop_server().await?;
    Ok(())
}

#[tokio::test]
#[ignore = "needs a dolt binary and MySQL at MYSQL_TEST_URL"]
async fn test_diff_sync_into_mysql() -> Result<(), Box<dyn std::error::Error>> {
    init_test_logging();
    let dir = tempfile::tempdir()?;
    let mut context = start_test_server(dir.path()).await?;
    write_history(&context).await?;
    let log = context.log(None).await?;

    let mut target = MySqlConnection::connect(&mysql_test_url()).await?;
    let target_table = create_players_table(&mut target, "players_from_dolt").await?;
    let mut source = context.connection().await?;
    let direction = SyncDirection::new(TEST_TABLE, "players_from_dolt");

    // everything up to the update, then the drop as a diff
    let mut writer = get_target_writer(&mut target, WritePolicy::Upsert);
    sync_table_diff(&mut source, &mut writer, &direction, &log[5].hash, &log[1].hash, false)
        .await?;
    let summary =
        sync_table_diff(&mut source, &mut writer, &direction, &log[1].hash, &log[0].hash, false)
            .await?;
    assert_eq!(summary.rows_deleted, 1);

    assert_same_rows(
        &context.read_table(TEST_TABLE, None).await?,
        &read_rows(&mut target, &target_table, None).await?,
    );

    drop(source);
    target.disconnect().await?;
    context.stop_server().await?;
    Ok(())
}
