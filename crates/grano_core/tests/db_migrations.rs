use grano_core::db::migrations::latest_version;
use grano_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "projects");
    assert_table_exists(&conn, "schemata");
    assert_table_exists(&conn, "attributes");
}

#[test]
fn reopening_a_catalog_file_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grano.db");

    let first = open_db(&path).unwrap();
    assert_eq!(schema_version(&first), latest_version());
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second), latest_version());
    assert_table_exists(&second, "schemata");
}

#[test]
fn newer_catalog_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
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

#[test]
fn deleting_a_project_cascades_to_schemata_and_attributes() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO projects (slug, label) VALUES ('acme', 'Acme Corp');
         INSERT INTO schemata (id, project, name, label, obj)
             VALUES ('00000000-0000-4000-8000-000000000001', 'acme', 'person', 'Person', 'entity');
         INSERT INTO attributes (schema_id, name, label)
             VALUES ('00000000-0000-4000-8000-000000000001', 'age', 'Age');
         DELETE FROM projects WHERE slug = 'acme';",
    )
    .unwrap();

    assert_eq!(count(&conn, "schemata"), 0);
    assert_eq!(count(&conn, "attributes"), 0);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
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
