use agora_core::db::migrations::{latest_version, migration_names, CORE_COLLECTIONS};
use agora_core::db::{open_db, open_db_in_memory, DbError};
use agora_core::DocumentStore;
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "documents");
    assert_table_exists(&conn, "collections");

    let store = DocumentStore::new(&conn);
    for name in CORE_COLLECTIONS {
        assert!(store.collection_exists(name).unwrap(), "missing collection {name}");
    }
    for name in [
        "reputationEvents",
        "communitySettings",
        "channelSettings",
        "webPushSubscriptions",
        "coreMetrics",
    ] {
        assert!(store.collection_exists(name).unwrap(), "missing collection {name}");
    }
}

#[test]
fn migration_versions_are_strictly_increasing() {
    let versions: Vec<u32> = migration_names().into_iter().map(|(version, _)| version).collect();
    assert!(versions.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(versions.last().copied(), Some(latest_version()));
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agora.db");

    let conn_first = open_db(&path).unwrap();
    DocumentStore::new(&conn_first)
        .insert_value("users", serde_json::json!({ "username": "ann" }))
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let count = DocumentStore::new(&conn_second)
        .count("users", &agora_core::Filter::All)
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn reputation_backfill_sets_missing_scores_to_zero() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE collections (name TEXT PRIMARY KEY);
         CREATE TABLE documents (
             collection TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
             id TEXT NOT NULL,
             body TEXT NOT NULL,
             PRIMARY KEY (collection, id)
         );
         INSERT INTO collections (name) VALUES ('usersCommunities');
         INSERT INTO documents (collection, id, body)
             VALUES ('usersCommunities', 'uc1', '{\"id\":\"uc1\",\"userId\":\"u1\"}');
         PRAGMA user_version = 4;",
    )
    .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    let record = DocumentStore::new(&conn)
        .get("usersCommunities", "uc1")
        .unwrap()
        .unwrap();
    assert_eq!(record["reputation"], 0);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
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
