use repokit_core::db::migrations::{apply_migrations, latest_version};
use repokit_core::db::{open_db, open_db_in_memory};
use repokit_core::{SqliteSession, StoreConfig, StoreError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory(&StoreConfig::default()).unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "entity_rows");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("repokit.db");

    let conn_first = open_db(&path, &StoreConfig::default()).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path, &StoreConfig::default()).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "entity_rows");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path, &StoreConfig::default()).unwrap_err();
    match err {
        StoreError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn session_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    let err = SqliteSession::try_new(conn, StoreConfig::default())
        .err()
        .expect("raw connection should be rejected");
    assert!(matches!(
        err,
        StoreError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn session_rejects_missing_entity_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    let err = SqliteSession::try_new(conn, StoreConfig::default())
        .err()
        .expect("missing table should be rejected");
    assert!(matches!(err, StoreError::MissingRequiredTable("entity_rows")));
}

#[test]
fn session_rejects_missing_entity_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE entity_rows (
            row_id INTEGER PRIMARY KEY,
            entity TEXT NOT NULL,
            entity_key TEXT NOT NULL,
            created_at INTEGER,
            updated_at INTEGER
        );
        PRAGMA user_version = {};",
        latest_version()
    ))
    .unwrap();

    let err = SqliteSession::try_new(conn, StoreConfig::default())
        .err()
        .expect("missing column should be rejected");
    assert!(matches!(
        err,
        StoreError::MissingRequiredColumn {
            table: "entity_rows",
            column: "body"
        }
    ));
}

#[test]
fn session_accepts_manually_migrated_connection() {
    let mut conn = Connection::open_in_memory().unwrap();
    apply_migrations(&mut conn).unwrap();

    let session = SqliteSession::try_new(conn, StoreConfig::default()).unwrap();
    assert_eq!(session.tracked_count(), 0);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
