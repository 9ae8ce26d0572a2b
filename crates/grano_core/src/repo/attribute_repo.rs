//! Attribute repository contracts and SQLite implementation.
//!
//! # Invariants
//! - `(schema_id, name)` is the attribute identity; writes are upserts.
//! - Listings are deterministic: `name ASC`.

use crate::model::attribute::{Attribute, Datatype};
use crate::model::schema::SchemaId;
use crate::repo::{
    bool_to_int, ensure_connection_ready, int_to_bool, parse_uuid, RepoError, RepoResult,
};
use rusqlite::{params, Connection, Row};

const ATTRIBUTE_SELECT_SQL: &str = "SELECT
    schema_id,
    name,
    label,
    description,
    datatype,
    hidden,
    inherited
FROM attributes";

/// Repository interface for attribute definitions.
pub trait AttributeRepository {
    /// Lists all attributes stored on one schema.
    fn list_attributes(&self, schema_id: SchemaId) -> RepoResult<Vec<Attribute>>;
    /// Loads one attribute by schema and name.
    fn get_attribute(&self, schema_id: SchemaId, name: &str) -> RepoResult<Option<Attribute>>;
    /// Inserts or replaces the attribute identified by `(schema_id, name)`.
    fn upsert_attribute(&self, attribute: &Attribute) -> RepoResult<()>;
    /// Deletes one attribute.
    fn delete_attribute(&self, schema_id: SchemaId, name: &str) -> RepoResult<()>;
    /// Deletes every attribute of one schema and returns how many were removed.
    fn delete_schema_attributes(&self, schema_id: SchemaId) -> RepoResult<usize>;
}

/// SQLite-backed attribute repository.
pub struct SqliteAttributeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAttributeRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["schemata", "attributes"])?;
        Ok(Self { conn })
    }
}

impl AttributeRepository for SqliteAttributeRepository<'_> {
    fn list_attributes(&self, schema_id: SchemaId) -> RepoResult<Vec<Attribute>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ATTRIBUTE_SELECT_SQL} WHERE schema_id = ?1 ORDER BY name ASC;"
        ))?;
        let mut rows = stmt.query([schema_id.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_attribute_row(row)?);
        }
        Ok(items)
    }

    fn get_attribute(&self, schema_id: SchemaId, name: &str) -> RepoResult<Option<Attribute>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ATTRIBUTE_SELECT_SQL} WHERE schema_id = ?1 AND name = ?2;"
        ))?;
        let mut rows = stmt.query(params![schema_id.to_string(), name])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_attribute_row(row)?));
        }
        Ok(None)
    }

    fn upsert_attribute(&self, attribute: &Attribute) -> RepoResult<()> {
        let written = self.conn.execute(
            "INSERT INTO attributes (
                schema_id,
                name,
                label,
                description,
                datatype,
                hidden,
                inherited
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (schema_id, name) DO UPDATE SET
                label = excluded.label,
                description = excluded.description,
                datatype = excluded.datatype,
                hidden = excluded.hidden,
                inherited = excluded.inherited,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                attribute.schema_id.to_string(),
                attribute.name.as_str(),
                attribute.label.as_str(),
                attribute.description.as_str(),
                attribute.datatype.as_str(),
                bool_to_int(attribute.hidden),
                bool_to_int(attribute.inherited),
            ],
        );
        match written {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(failure, _))
                if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
            {
                Err(RepoError::SchemaNotFound(attribute.schema_id))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn delete_attribute(&self, schema_id: SchemaId, name: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM attributes WHERE schema_id = ?1 AND name = ?2;",
            params![schema_id.to_string(), name],
        )?;
        if changed == 0 {
            return Err(RepoError::AttributeNotFound {
                schema_id,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn delete_schema_attributes(&self, schema_id: SchemaId) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM attributes WHERE schema_id = ?1;",
            [schema_id.to_string()],
        )?;
        Ok(removed)
    }
}

fn parse_attribute_row(row: &Row<'_>) -> RepoResult<Attribute> {
    let schema_id_text: String = row.get("schema_id")?;
    let datatype_text: String = row.get("datatype")?;
    let datatype = datatype_text.parse::<Datatype>().map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid datatype `{datatype_text}` in attributes.datatype"
        ))
    })?;

    Ok(Attribute {
        schema_id: parse_uuid(&schema_id_text, "attributes.schema_id")?,
        name: row.get("name")?,
        label: row.get("label")?,
        description: row.get("description")?,
        datatype,
        hidden: int_to_bool(row.get("hidden")?, "attributes.hidden")?,
        inherited: int_to_bool(row.get("inherited")?, "attributes.inherited")?,
    })
}
