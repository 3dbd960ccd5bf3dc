mod common;

use std::fs;
use std::time::Duration;

use common::{applied, migration, FakeConnection};
use oxide_sqlmigrate::direction::Direction;
use oxide_sqlmigrate::error::MigrateError;
use oxide_sqlmigrate::executor::{apply_bootstrap_migration, apply_migration, wait_for_start};
use oxide_sqlmigrate::history::{ensure_migrations_changelog, get_applied_migrations};
use tempfile::TempDir;

const TABLE: &str = "public.migrations_changelog";

fn insert_sql(id: &str, name: &str) -> String {
    format!("exec: INSERT INTO {TABLE} (id, name, applied_at) VALUES ('{id}', '{name}', now())")
}

#[tokio::test]
async fn test_up_records_and_verifies() {
    let conn = FakeConnection::new();
    let m = migration("20200101000000", "users", "create_users");

    apply_migration(&conn, &m, TABLE, Direction::Up).await.unwrap();

    assert_eq!(
        conn.log(),
        [
            "begin".to_string(),
            "tx exec: -- up 20200101000000".to_string(),
            "commit".to_string(),
            insert_sql("20200101000000", "create_users"),
            "begin".to_string(),
            "tx exec: -- verify 20200101000000".to_string(),
            "rollback".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_failed_up_is_rolled_back_and_not_recorded() {
    let conn = FakeConnection::new().fail_on("-- up");
    let m = migration("20200101000000", "users", "create_users");

    let err = apply_migration(&conn, &m, TABLE, Direction::Up)
        .await
        .unwrap_err();

    match err {
        MigrateError::Execute {
            direction,
            filename,
            ..
        } => {
            assert_eq!(direction, Direction::Up);
            assert_eq!(filename, "20200101000000_create_users.sql");
        }
        other => panic!("Expected Execute, got {other:?}"),
    }
    assert_eq!(
        conn.log(),
        ["begin", "tx exec: -- up 20200101000000", "rollback"]
    );
}

#[tokio::test]
async fn test_failed_up_with_failed_rollback() {
    let conn = FakeConnection::new().fail_on("-- up").fail_rollback();
    let m = migration("20200101000000", "users", "create_users");

    let err = apply_migration(&conn, &m, TABLE, Direction::Up)
        .await
        .unwrap_err();

    assert!(matches!(err, MigrateError::ExecuteAndRollback { .. }));
    let message = err.to_string();
    assert!(message.contains("failed on '-- up'"), "{message}");
    assert!(message.contains("rollback failed"), "{message}");
}

#[tokio::test]
async fn test_failed_commit_is_not_recorded() {
    let conn = FakeConnection::new().fail_commit();
    let m = migration("20200101000000", "users", "create_users");

    let err = apply_migration(&conn, &m, TABLE, Direction::Up)
        .await
        .unwrap_err();

    assert!(matches!(err, MigrateError::Commit { .. }));
    assert!(!conn.log().iter().any(|line| line.contains("INSERT INTO")));
}

#[tokio::test]
async fn test_failed_changelog_insert_skips_verify() {
    let conn = FakeConnection::new().fail_on("INSERT INTO");
    let m = migration("20200101000000", "users", "create_users");

    let err = apply_migration(&conn, &m, TABLE, Direction::Up)
        .await
        .unwrap_err();

    assert!(matches!(err, MigrateError::ChangelogInsert { .. }));
    let log = conn.log();
    assert_eq!(log.last(), Some(&insert_sql("20200101000000", "create_users")));
    assert!(!log.iter().any(|line| line.contains("-- verify")));
}

#[tokio::test]
async fn test_failed_verify_is_reported_after_recording() {
    let conn = FakeConnection::new().fail_on("-- verify");
    let m = migration("20200101000000", "users", "create_users");

    let err = apply_migration(&conn, &m, TABLE, Direction::Up)
        .await
        .unwrap_err();

    assert!(matches!(err, MigrateError::Verify { .. }));
    let log = conn.log();
    assert!(log.contains(&insert_sql("20200101000000", "create_users")));
    assert_eq!(log.last().map(String::as_str), Some("rollback"));
}

#[tokio::test]
async fn test_failed_verify_with_failed_rollback() {
    let conn = FakeConnection::new().fail_on("-- verify").fail_rollback();
    let m = migration("20200101000000", "users", "create_users");

    let err = apply_migration(&conn, &m, TABLE, Direction::Up)
        .await
        .unwrap_err();

    assert!(matches!(err, MigrateError::VerifyAndRollback { .. }));
    assert!(err
        .to_string()
        .contains("Please assess the necessity of a down migration"));
}

#[tokio::test]
async fn test_down_removes_changelog_record() {
    let conn = FakeConnection::new();
    let m = migration("20200101000000", "users", "create_users");

    apply_migration(&conn, &m, TABLE, Direction::Down)
        .await
        .unwrap();

    assert_eq!(
        conn.log(),
        [
            "begin".to_string(),
            "tx exec: -- down 20200101000000".to_string(),
            "commit".to_string(),
            format!("exec: DELETE FROM {TABLE} WHERE id = '20200101000000'"),
        ]
    );
}

#[tokio::test]
async fn test_failed_down_keeps_changelog_record() {
    let conn = FakeConnection::new().fail_on("-- down");
    let m = migration("20200101000000", "users", "create_users");

    let err = apply_migration(&conn, &m, TABLE, Direction::Down)
        .await
        .unwrap_err();

    match err {
        MigrateError::Execute { direction, .. } => assert_eq!(direction, Direction::Down),
        other => panic!("Expected Execute, got {other:?}"),
    }
    assert!(!conn.log().iter().any(|line| line.contains("DELETE FROM")));
}

#[tokio::test]
async fn test_begin_failure() {
    let conn = FakeConnection::new().fail_begin();
    let m = migration("20200101000000", "users", "create_users");

    let err = apply_migration(&conn, &m, TABLE, Direction::Up)
        .await
        .unwrap_err();

    match err {
        MigrateError::BeginTransaction { phase, .. } => assert_eq!(phase, "up"),
        other => panic!("Expected BeginTransaction, got {other:?}"),
    }
    assert!(conn.log().is_empty());
}

#[tokio::test]
async fn test_bootstrap_without_file_is_noop() {
    let dir = TempDir::new().unwrap();
    let conn = FakeConnection::new();

    apply_bootstrap_migration(&conn, dir.path()).await.unwrap();

    assert!(conn.log().is_empty());
}

#[tokio::test]
async fn test_bootstrap_runs_file_as_one_batch() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("bootstrap.sql"),
        "CREATE ROLE app;\nCREATE SCHEMA app;\n",
    )
    .unwrap();
    let conn = FakeConnection::new();

    apply_bootstrap_migration(&conn, dir.path()).await.unwrap();

    assert_eq!(
        conn.log(),
        ["exec: CREATE ROLE app;\nCREATE SCHEMA app;\n"]
    );
}

#[tokio::test]
async fn test_bootstrap_failure() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bootstrap.sql"), "CREATE ROLE app;").unwrap();
    let conn = FakeConnection::new().fail_on("CREATE ROLE");

    let err = apply_bootstrap_migration(&conn, dir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, MigrateError::Bootstrap(_)));
}

#[tokio::test]
async fn test_changelog_is_created_when_missing() {
    let conn = FakeConnection::new();

    let created = ensure_migrations_changelog(&conn, TABLE).await.unwrap();

    assert!(created);
    let log = conn.log();
    assert_eq!(log.len(), 2);
    assert!(log[0].starts_with("query: SELECT EXISTS"));
    assert!(log[0].contains("table_schema = 'public' AND table_name = 'migrations_changelog'"));
    assert!(log[1].starts_with(&format!("exec: CREATE TABLE {TABLE}")));
}

#[tokio::test]
async fn test_existing_changelog_is_kept() {
    let conn = FakeConnection::new().with_changelog_table();

    let created = ensure_migrations_changelog(&conn, TABLE).await.unwrap();

    assert!(!created);
    assert_eq!(conn.log().len(), 1);
}

#[tokio::test]
async fn test_changelog_check_failure() {
    let conn = FakeConnection::new().fail_on("information_schema");

    let err = ensure_migrations_changelog(&conn, TABLE).await.unwrap_err();

    assert!(matches!(err, MigrateError::ChangelogCheck(_)));
}

#[tokio::test]
async fn test_applied_migrations_are_read_in_order() {
    let records = [applied("20200101000000", "a"), applied("20200102000000", "b")];
    let conn = FakeConnection::new().with_applied(&records);

    let result = get_applied_migrations(&conn, TABLE).await.unwrap();

    assert_eq!(result, records);
    assert_eq!(
        conn.log(),
        [format!(
            "query: SELECT id, name, applied_at FROM {TABLE} ORDER BY id ASC"
        )]
    );
}

#[tokio::test]
async fn test_changelog_read_failure() {
    let conn = FakeConnection::new().fail_on("ORDER BY id");

    let err = get_applied_migrations(&conn, TABLE).await.unwrap_err();

    assert!(matches!(err, MigrateError::ChangelogRead(_)));
}

#[tokio::test]
async fn test_wait_for_start_retries() {
    let conn = FakeConnection::new().unreachable_for(2);

    wait_for_start(&conn, Duration::from_millis(1), 3)
        .await
        .unwrap();

    assert_eq!(conn.log(), ["exec: SELECT 1"; 3]);
}

#[tokio::test]
async fn test_wait_for_start_gives_up() {
    let conn = FakeConnection::new().unreachable_for(5);

    let err = wait_for_start(&conn, Duration::from_millis(1), 2)
        .await
        .unwrap_err();

    match err {
        MigrateError::ConnectTimeout(source) => {
            assert!(source.to_string().contains("connection refused"));
        }
        other => panic!("Expected ConnectTimeout, got {other:?}"),
    }
    assert_eq!(conn.log().len(), 2);
}
