//! Catalog facade: one unit of work per mutating call.
//!
//! # Responsibility
//! - Wrap validation, the engine and bulk import/export in SQLite
//!   transactions so a whole cascade commits or rolls back together.
//! - Publish buffered change signals only after a successful commit.
//!
//! # Invariants
//! - Every mutating call runs in one `IMMEDIATE` transaction.
//! - A failed call leaves storage untouched and publishes nothing.
//! - Bulk import stops at the first invalid entry.

use crate::db::DbError;
use crate::interchange::{self, InterchangeError, SchemaRecord};
use crate::model::attribute::Attribute;
use crate::model::project::Project;
use crate::model::schema::{Schema, SchemaId};
use crate::notify::{ChangeSink, DeferredChanges};
use crate::repo::attribute_repo::{AttributeRepository, SqliteAttributeRepository};
use crate::repo::project_repo::{ProjectRepository, SqliteProjectRepository};
use crate::repo::schema_repo::{SchemaRepository, SqliteSchemaRepository};
use crate::repo::RepoError;
use crate::service::reconcile::{EngineError, ReconcileReport, SchemaEngine};
use crate::service::schema_tree::SchemaTree;
use crate::validation::{is_database_name, validate_schema, ValidationError};
use log::{info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub type CatalogResult<T> = Result<T, CatalogError>;

type SqliteEngine<'conn, 'sink> = SchemaEngine<
    'sink,
    SqliteSchemaRepository<'conn>,
    SqliteAttributeRepository<'conn>,
    SqliteProjectRepository<'conn>,
>;

/// Errors surfaced to catalog callers.
#[derive(Debug)]
pub enum CatalogError {
    /// Input failed validation. `index`/`name` locate the entry in a batch.
    Invalid {
        index: Option<usize>,
        name: Option<String>,
        errors: BTreeMap<String, Vec<String>>,
    },
    ProjectNotFound(String),
    SchemaNotFound { project: String, name: String },
    Engine(EngineError),
    Repo(RepoError),
    Db(DbError),
    Interchange(InterchangeError),
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid {
                index,
                name,
                errors,
            } => {
                write!(f, "invalid schema")?;
                if let Some(name) = name {
                    write!(f, " `{name}`")?;
                }
                if let Some(index) = index {
                    write!(f, " (entry {index})")?;
                }
                let rendered: Vec<String> = errors
                    .iter()
                    .map(|(field, messages)| format!("{field}: {}", messages.join("; ")))
                    .collect();
                write!(f, ": {}", rendered.join(", "))
            }
            Self::ProjectNotFound(slug) => write!(f, "project not found: {slug}"),
            Self::SchemaNotFound { project, name } => {
                write!(f, "schema `{name}` not found in project `{project}`")
            }
            Self::Engine(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Interchange(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CatalogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Engine(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Interchange(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EngineError> for CatalogError {
    fn from(value: EngineError) -> Self {
        match value {
            EngineError::Repo(err) => Self::Repo(err),
            other => Self::Engine(other),
        }
    }
}

impl From<RepoError> for CatalogError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::ProjectNotFound(slug) => Self::ProjectNotFound(slug),
            other => Self::Repo(other),
        }
    }
}

impl From<DbError> for CatalogError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for CatalogError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<InterchangeError> for CatalogError {
    fn from(value: InterchangeError) -> Self {
        Self::Interchange(value)
    }
}

impl CatalogError {
    fn from_validation(err: ValidationError, index: Option<usize>, name: Option<String>) -> Self {
        match err {
            ValidationError::Invalid(errors) => Self::Invalid {
                index,
                name,
                errors,
            },
            ValidationError::Repo(err) => err.into(),
        }
    }

    fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            index: None,
            name: None,
            errors: BTreeMap::from([(field.to_string(), vec![message.into()])]),
        }
    }
}

/// Outcome of one bulk import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
}

impl ImportReport {
    pub fn total(&self) -> usize {
        self.created.len() + self.updated.len()
    }
}

/// Schema catalog bound to one SQLite connection.
pub struct SchemaCatalog<'conn, 'sink> {
    conn: &'conn Connection,
    sink: &'sink dyn ChangeSink,
}

impl<'conn, 'sink> SchemaCatalog<'conn, 'sink> {
    /// Creates a catalog publishing committed changes into `sink`.
    pub fn new(conn: &'conn Connection, sink: &'sink dyn ChangeSink) -> Self {
        Self { conn, sink }
    }

    /// Creates a project.
    pub fn create_project(&self, slug: &str, label: &str) -> CatalogResult<Project> {
        let slug = slug.trim();
        let label = label.trim();
        if !is_database_name(slug) {
            return Err(CatalogError::invalid_field(
                "slug",
                "may only contain letters, digits and underscores",
            ));
        }
        if label.chars().count() < 3 {
            return Err(CatalogError::invalid_field(
                "label",
                "must be at least 3 characters",
            ));
        }
        self.in_unit_of_work("project_create", |engine| {
            engine
                .projects()
                .create_project(slug, label)
                .map_err(Into::into)
        })
    }

    pub fn project(&self, slug: &str) -> CatalogResult<Option<Project>> {
        Ok(SqliteProjectRepository::try_new(self.conn)?.get_project(slug)?)
    }

    /// Validates `raw` and creates or updates the schema it names.
    pub fn save(&self, project: &str, raw: &Value) -> CatalogResult<Schema> {
        self.in_unit_of_work("schema_save", |engine| {
            save_raw(engine, project, raw, None).map(|(schema, _)| schema)
        })
    }

    /// Deletes a schema and its attributes. Returns how many attributes went.
    ///
    /// Children are left pointing at the deleted schema; see
    /// [`Self::orphans`].
    pub fn delete(&self, project: &str, name: &str) -> CatalogResult<usize> {
        self.in_unit_of_work("schema_delete", |engine| {
            let schema = require_schema(engine, project, name)?;
            engine.delete(&schema).map_err(Into::into)
        })
    }

    /// Re-runs inherited-attribute propagation from one schema downward.
    pub fn refresh(&self, project: &str, name: &str) -> CatalogResult<ReconcileReport> {
        self.in_unit_of_work("schema_refresh", |engine| {
            let schema = require_schema(engine, project, name)?;
            engine.reconcile_from_parent(&schema).map_err(Into::into)
        })
    }

    pub fn schema(&self, project: &str, name: &str) -> CatalogResult<Option<Schema>> {
        Ok(SqliteSchemaRepository::try_new(self.conn)?.find_schema(project, name)?)
    }

    pub fn attributes(&self, project: &str, name: &str) -> CatalogResult<Vec<Attribute>> {
        let schema = self
            .schema(project, name)?
            .ok_or_else(|| CatalogError::SchemaNotFound {
                project: project.to_string(),
                name: name.to_string(),
            })?;
        Ok(SqliteAttributeRepository::try_new(self.conn)?.list_attributes(schema.id)?)
    }

    pub fn children(&self, project: &str, name: &str) -> CatalogResult<Vec<Schema>> {
        let repo = SqliteSchemaRepository::try_new(self.conn)?;
        let schema = repo
            .find_schema(project, name)?
            .ok_or_else(|| CatalogError::SchemaNotFound {
                project: project.to_string(),
                name: name.to_string(),
            })?;
        Ok(repo.list_children(project, schema.id)?)
    }

    pub fn list(&self, project: &str) -> CatalogResult<Vec<Schema>> {
        Ok(SqliteSchemaRepository::try_new(self.conn)?.list_schemas(project)?)
    }

    /// Schemas whose parent was deleted and that must be re-pointed.
    pub fn orphans(&self, project: &str) -> CatalogResult<Vec<Schema>> {
        let tree = SchemaTree::new(SqliteSchemaRepository::try_new(self.conn)?);
        Ok(tree.orphans(project)?)
    }

    /// Imports a YAML batch (one mapping or a sequence) as one unit of work.
    pub fn import_yaml(&self, project: &str, text: &str) -> CatalogResult<ImportReport> {
        let entries = interchange::parse_batch(text)?;
        self.import_entries(project, entries)
    }

    /// Imports every file as part of a single batch.
    pub fn import_files(&self, project: &str, paths: &[PathBuf]) -> CatalogResult<ImportReport> {
        let mut entries = Vec::new();
        for path in paths {
            let text = std::fs::read_to_string(path).map_err(|source| {
                CatalogError::Interchange(InterchangeError::Io {
                    path: path.clone(),
                    source,
                })
            })?;
            entries.extend(interchange::parse_batch(&text)?);
        }
        self.import_entries(project, entries)
    }

    /// Writes `<name>.yaml` for every schema of `project` into `dir`.
    pub fn export(&self, project: &str, dir: &Path) -> CatalogResult<Vec<PathBuf>> {
        if self.project(project)?.is_none() {
            return Err(CatalogError::ProjectNotFound(project.to_string()));
        }

        let schemas = self.list(project)?;
        let names: HashMap<SchemaId, String> = schemas
            .iter()
            .map(|schema| (schema.id, schema.name.clone()))
            .collect();
        let attributes = SqliteAttributeRepository::try_new(self.conn)?;

        let mut records = Vec::with_capacity(schemas.len());
        for schema in &schemas {
            let parent_name = schema
                .parent_id
                .and_then(|parent_id| names.get(&parent_id).cloned());
            let stored = attributes.list_attributes(schema.id)?;
            records.push(SchemaRecord::from_schema(schema, parent_name, &stored));
        }

        let written = interchange::write_records(dir, &records)?;
        info!(
            "event=schema_export module=catalog status=ok project={} files={} dir={}",
            project,
            written.len(),
            dir.display()
        );
        Ok(written)
    }

    fn import_entries(&self, project: &str, entries: Vec<Value>) -> CatalogResult<ImportReport> {
        let entries = interchange::order_by_parent(entries);
        self.in_unit_of_work("schema_import", |engine| {
            let mut report = ImportReport::default();
            for (index, raw) in entries.iter().enumerate() {
                let (schema, existed) = save_raw(engine, project, raw, Some(index))?;
                if existed {
                    report.updated.push(schema.name);
                } else {
                    report.created.push(schema.name);
                }
            }
            Ok(report)
        })
    }

    fn in_unit_of_work<T>(
        &self,
        operation: &'static str,
        work: impl FnOnce(&SqliteEngine<'_, '_>) -> CatalogResult<T>,
    ) -> CatalogResult<T> {
        let started_at = Instant::now();
        let deferred = DeferredChanges::new();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let result = {
            let engine = SchemaEngine::new(
                SqliteSchemaRepository::try_new(&tx)?,
                SqliteAttributeRepository::try_new(&tx)?,
                SqliteProjectRepository::try_new(&tx)?,
                &deferred,
            );
            work(&engine)
        };

        match result {
            Ok(value) => {
                tx.commit()?;
                let published = deferred.publish_to(self.sink);
                info!(
                    "event={operation} module=catalog status=ok duration_ms={} changes={}",
                    started_at.elapsed().as_millis(),
                    published
                );
                Ok(value)
            }
            Err(err) => {
                drop(tx);
                let discarded = deferred.take().len();
                warn!(
                    "event={operation} module=catalog status=rolled_back duration_ms={} discarded_changes={} error={}",
                    started_at.elapsed().as_millis(),
                    discarded,
                    err
                );
                Err(err)
            }
        }
    }
}

/// Validates and saves one raw entry. The flag tells whether it already existed.
fn save_raw(
    engine: &SqliteEngine<'_, '_>,
    project: &str,
    raw: &Value,
    index: Option<usize>,
) -> CatalogResult<(Schema, bool)> {
    let entry_name = raw.get("name").and_then(Value::as_str).map(str::to_string);
    let description = validate_schema(raw, project, engine.tree().repo(), engine.projects())
        .map_err(|err| CatalogError::from_validation(err, index, entry_name))?;
    let existing = engine.tree().resolve(project, &description.name)?;
    let existed = existing.is_some();
    let schema = engine.save(&description, existing)?;
    Ok((schema, existed))
}

fn require_schema(
    engine: &SqliteEngine<'_, '_>,
    project: &str,
    name: &str,
) -> CatalogResult<Schema> {
    engine
        .tree()
        .resolve(project, name)?
        .ok_or_else(|| CatalogError::SchemaNotFound {
            project: project.to_string(),
            name: name.to_string(),
        })
}
