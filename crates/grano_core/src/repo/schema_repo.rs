//! Schema repository contracts and SQLite implementation.
//!
//! # Invariants
//! - `(project, name)` is unique; `name` and `project` are never updated.
//! - Listings are deterministic: `name ASC`.
//! - Only `parent_id` is stored; children are found by lookup.

use crate::model::schema::{Metadata, ObjectKind, Schema, SchemaId};
use crate::repo::{
    bool_to_int, ensure_connection_ready, int_to_bool, is_unique_violation, parse_uuid,
    RepoError, RepoResult,
};
use rusqlite::{params, Connection, Row};

const SCHEMA_SELECT_SQL: &str = "SELECT
    id,
    project,
    name,
    label,
    hidden,
    obj,
    meta,
    parent_id,
    created_at,
    updated_at
FROM schemata";

/// Repository interface for schema records and tree lookups.
pub trait SchemaRepository {
    /// Loads one schema by id.
    fn get_schema(&self, id: SchemaId) -> RepoResult<Option<Schema>>;
    /// Loads one schema by exact name within a project.
    fn find_schema(&self, project: &str, name: &str) -> RepoResult<Option<Schema>>;
    /// Inserts a new schema record.
    fn insert_schema(&self, schema: &Schema) -> RepoResult<()>;
    /// Updates mutable fields (label, hidden, obj, meta, parent).
    fn update_schema(&self, schema: &Schema) -> RepoResult<()>;
    /// Deletes one schema record. Attributes cascade in storage.
    fn delete_schema(&self, id: SchemaId) -> RepoResult<()>;
    /// Lists schemas whose parent is `parent_id` within `project`.
    fn list_children(&self, project: &str, parent_id: SchemaId) -> RepoResult<Vec<Schema>>;
    /// Lists all schemas of one project.
    fn list_schemas(&self, project: &str) -> RepoResult<Vec<Schema>>;
}

/// SQLite-backed schema repository.
pub struct SqliteSchemaRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSchemaRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["projects", "schemata"])?;
        Ok(Self { conn })
    }

    fn query_schemas(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<Schema>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_schema_row(row)?);
        }
        Ok(items)
    }
}

impl SchemaRepository for SqliteSchemaRepository<'_> {
    fn get_schema(&self, id: SchemaId) -> RepoResult<Option<Schema>> {
        let mut items = self.query_schemas(
            &format!("{SCHEMA_SELECT_SQL} WHERE id = ?1;"),
            [id.to_string()],
        )?;
        Ok(items.pop())
    }

    fn find_schema(&self, project: &str, name: &str) -> RepoResult<Option<Schema>> {
        let mut items = self.query_schemas(
            &format!("{SCHEMA_SELECT_SQL} WHERE project = ?1 AND name = ?2;"),
            [project, name],
        )?;
        Ok(items.pop())
    }

    fn insert_schema(&self, schema: &Schema) -> RepoResult<()> {
        let meta = encode_meta(&schema.meta)?;
        let inserted = self.conn.execute(
            "INSERT INTO schemata (
                id,
                project,
                name,
                label,
                hidden,
                obj,
                meta,
                parent_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                schema.id.to_string(),
                schema.project.as_str(),
                schema.name.as_str(),
                schema.label.as_str(),
                bool_to_int(schema.hidden),
                schema.obj.as_str(),
                meta,
                schema.parent_id.map(|value| value.to_string()),
            ],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(RepoError::DuplicateSchema {
                project: schema.project.clone(),
                name: schema.name.clone(),
            }),
            Err(rusqlite::Error::SqliteFailure(failure, _))
                if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
            {
                Err(RepoError::ProjectNotFound(schema.project.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn update_schema(&self, schema: &Schema) -> RepoResult<()> {
        let meta = encode_meta(&schema.meta)?;
        let changed = self.conn.execute(
            "UPDATE schemata
             SET label = ?2,
                 hidden = ?3,
                 obj = ?4,
                 meta = ?5,
                 parent_id = ?6,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                schema.id.to_string(),
                schema.label.as_str(),
                bool_to_int(schema.hidden),
                schema.obj.as_str(),
                meta,
                schema.parent_id.map(|value| value.to_string()),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::SchemaNotFound(schema.id));
        }
        Ok(())
    }

    fn delete_schema(&self, id: SchemaId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM schemata WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::SchemaNotFound(id));
        }
        Ok(())
    }

    fn list_children(&self, project: &str, parent_id: SchemaId) -> RepoResult<Vec<Schema>> {
        self.query_schemas(
            &format!(
                "{SCHEMA_SELECT_SQL}
                 WHERE project = ?1
                   AND parent_id = ?2
                 ORDER BY name ASC;"
            ),
            params![project, parent_id.to_string()],
        )
    }

    fn list_schemas(&self, project: &str) -> RepoResult<Vec<Schema>> {
        self.query_schemas(
            &format!("{SCHEMA_SELECT_SQL} WHERE project = ?1 ORDER BY name ASC;"),
            [project],
        )
    }
}

fn encode_meta(meta: &Metadata) -> RepoResult<String> {
    serde_json::to_string(meta)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode schemata.meta: {err}")))
}

fn parse_schema_row(row: &Row<'_>) -> RepoResult<Schema> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "schemata.id")?;

    let parent_id = row
        .get::<_, Option<String>>("parent_id")?
        .map(|value| parse_uuid(&value, "schemata.parent_id"))
        .transpose()?;

    let obj_text: String = row.get("obj")?;
    let obj = obj_text.parse::<ObjectKind>().map_err(|_| {
        RepoError::InvalidData(format!("invalid object kind `{obj_text}` in schemata.obj"))
    })?;

    let meta_text: String = row.get("meta")?;
    let meta: Metadata = serde_json::from_str(&meta_text)
        .map_err(|err| RepoError::InvalidData(format!("invalid json in schemata.meta: {err}")))?;

    Ok(Schema {
        id,
        project: row.get("project")?,
        name: row.get("name")?,
        label: row.get("label")?,
        hidden: int_to_bool(row.get("hidden")?, "schemata.hidden")?,
        obj,
        meta,
        parent_id,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
