//! Schema save path and attribute reconciliation.
//!
//! # Responsibility
//! - Apply a validated description to a schema (create or update) with the
//!   parent fallback policy.
//! - Make a schema's stored attributes equal to "inherited from parent" plus
//!   "declared locally", then cascade to every descendant.
//!
//! # Invariants
//! - Each level copies only from its immediate parent; inheritance is
//!   transitive through repeated single-level copy-down.
//! - Inherited attributes win over local declarations of the same name.
//! - Descendants are reconciled top-down, each step reloading its parent's
//!   attributes from storage.
//! - The engine never commits; the caller owns the transaction.

use crate::model::attribute::AttributeDescription;
use crate::model::schema::{Schema, SchemaDescription, SchemaId};
use crate::notify::{ChangeSink, SchemaChange, SchemaOperation};
use crate::repo::attribute_repo::AttributeRepository;
use crate::repo::project_repo::ProjectRepository;
use crate::repo::schema_repo::SchemaRepository;
use crate::repo::{RepoError, RepoResult};
use crate::service::attribute_store::{AttributeStore, AttributeWrite};
use crate::service::schema_tree::SchemaTree;
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors from the save/reconcile/delete paths.
#[derive(Debug)]
pub enum EngineError {
    /// Description names a project that differs from the existing schema.
    ProjectMismatch { expected: String, actual: String },
    /// Description names a schema other than the existing one.
    NameMismatch { expected: String, actual: String },
    /// Storage failure; the caller must roll back the unit of work.
    Repo(RepoError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProjectMismatch { expected, actual } => write!(
                f,
                "schema belongs to project `{expected}`, description targets `{actual}`"
            ),
            Self::NameMismatch { expected, actual } => write!(
                f,
                "schema name `{expected}` is immutable, description targets `{actual}`"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for EngineError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Counters for one reconciliation pass including its cascade.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Schemas whose attribute set was recomputed, the edited one included.
    pub schemas_visited: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    /// Local declarations dropped because the name is already taken by an
    /// inherited attribute or an earlier declaration.
    pub shadowed: Vec<String>,
}

impl ReconcileReport {
    fn record(&mut self, write: AttributeWrite) {
        match write {
            AttributeWrite::Created => self.created += 1,
            AttributeWrite::Updated => self.updated += 1,
            AttributeWrite::Unchanged => self.unchanged += 1,
        }
    }

    /// Returns whether the pass wrote anything.
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }
}

/// How a level treats attributes that are not inherited.
enum LocalPolicy<'d> {
    /// Keep exactly these declarations (explicit edit).
    Declared(&'d [AttributeDescription]),
    /// Keep whatever non-inherited attributes are stored (cascade step).
    PreserveStored,
}

/// Reconciliation engine over schema, attribute and project repositories.
pub struct SchemaEngine<'s, S, A, P>
where
    S: SchemaRepository,
    A: AttributeRepository,
    P: ProjectRepository,
{
    tree: SchemaTree<S>,
    attributes: AttributeStore<A>,
    projects: P,
    sink: &'s dyn ChangeSink,
}

impl<'s, S, A, P> SchemaEngine<'s, S, A, P>
where
    S: SchemaRepository,
    A: AttributeRepository,
    P: ProjectRepository,
{
    pub fn new(schemas: S, attributes: A, projects: P, sink: &'s dyn ChangeSink) -> Self {
        Self {
            tree: SchemaTree::new(schemas),
            attributes: AttributeStore::new(attributes),
            projects,
            sink,
        }
    }

    pub fn tree(&self) -> &SchemaTree<S> {
        &self.tree
    }

    pub fn attributes(&self) -> &AttributeStore<A> {
        &self.attributes
    }

    pub fn projects(&self) -> &P {
        &self.projects
    }

    /// Creates (`existing = None`) or updates a schema from a validated
    /// description and reconciles its attributes and descendants.
    ///
    /// Parent policy: default schema names never get a parent; a missing or
    /// circular parent falls back to the project's default schema for the
    /// object kind.
    pub fn save(
        &self,
        description: &SchemaDescription,
        existing: Option<Schema>,
    ) -> EngineResult<Schema> {
        let operation = if existing.is_some() {
            SchemaOperation::Update
        } else {
            SchemaOperation::Create
        };

        let mut schema = match existing {
            Some(schema) => {
                if schema.project != description.project {
                    return Err(EngineError::ProjectMismatch {
                        expected: schema.project,
                        actual: description.project.clone(),
                    });
                }
                if schema.name != description.name {
                    return Err(EngineError::NameMismatch {
                        expected: schema.name,
                        actual: description.name.clone(),
                    });
                }
                schema
            }
            None => Schema::new(
                description.project.as_str(),
                description.name.as_str(),
                description.obj,
            ),
        };

        schema.label = description.label.clone();
        schema.obj = description.obj;
        schema.hidden = description.hidden;
        schema.meta = description.meta.clone();
        schema.parent_id = self.resolve_parent(&schema, description.parent)?;

        self.projects.touch_project(&schema.project)?;
        match operation {
            SchemaOperation::Create => self.tree.repo().insert_schema(&schema)?,
            _ => self.tree.repo().update_schema(&schema)?,
        }

        let report =
            self.reconcile_from_description(&schema, &description.attributes, operation)?;
        info!(
            "event=schema_save module=engine status=ok project={} schema={} operation={} visited={} created={} updated={} deleted={} shadowed={}",
            schema.project,
            schema.name,
            operation,
            report.schemas_visited,
            report.created,
            report.updated,
            report.deleted,
            report.shadowed.len()
        );

        self.tree.require(schema.id).map_err(Into::into)
    }

    /// Reconciles `schema` against its parent plus the given local
    /// declarations, then cascades to all descendants.
    pub fn reconcile_from_description(
        &self,
        schema: &Schema,
        local: &[AttributeDescription],
        operation: SchemaOperation,
    ) -> EngineResult<ReconcileReport> {
        let mut report = ReconcileReport::default();
        self.reconcile_level(schema, LocalPolicy::Declared(local), operation, &mut report)?;
        self.cascade(schema, &mut report)?;
        Ok(report)
    }

    /// Refreshes the inherited attributes of `schema` from its parent while
    /// keeping its stored local attributes, then cascades.
    pub fn reconcile_from_parent(&self, schema: &Schema) -> EngineResult<ReconcileReport> {
        let mut report = ReconcileReport::default();
        self.reconcile_level(
            schema,
            LocalPolicy::PreserveStored,
            SchemaOperation::Update,
            &mut report,
        )?;
        self.cascade(schema, &mut report)?;
        Ok(report)
    }

    /// Deletes `schema` and its attributes. Children keep a dangling parent
    /// reference that the caller must resolve.
    pub fn delete(&self, schema: &Schema) -> EngineResult<usize> {
        self.sink.schema_changed(SchemaChange::new(
            schema.project.as_str(),
            schema.name.as_str(),
            SchemaOperation::Delete,
        ));
        let removed = self.attributes.delete_all(schema.id)?;
        self.tree.repo().delete_schema(schema.id)?;
        info!(
            "event=schema_delete module=engine status=ok project={} schema={} attributes_removed={}",
            schema.project, schema.name, removed
        );
        Ok(removed)
    }

    fn resolve_parent(
        &self,
        schema: &Schema,
        requested: Option<SchemaId>,
    ) -> RepoResult<Option<SchemaId>> {
        if schema.is_default() {
            return Ok(None);
        }

        if let Some(parent_id) = requested {
            if !self.tree.is_circular(schema.id, parent_id)? {
                return Ok(Some(parent_id));
            }
            warn!(
                "event=parent_fallback module=engine status=repaired project={} schema={} requested_parent={} reason=circular",
                schema.project, schema.name, parent_id
            );
        }

        let default = self.tree.default_schema(&schema.project, schema.obj)?;
        Ok(Some(default.id))
    }

    fn reconcile_level(
        &self,
        schema: &Schema,
        policy: LocalPolicy<'_>,
        operation: SchemaOperation,
        report: &mut ReconcileReport,
    ) -> EngineResult<()> {
        let mut retained = BTreeSet::new();

        if let Some(parent_id) = schema.parent_id {
            if self.tree.get(parent_id)?.is_some() {
                for parent_attribute in self.attributes.list(parent_id)? {
                    let write = self.attributes.save_inherited(schema.id, &parent_attribute)?;
                    report.record(write);
                    retained.insert(parent_attribute.name);
                }
            } else {
                warn!(
                    "event=reconcile module=engine status=orphan project={} schema={} missing_parent={}",
                    schema.project, schema.name, parent_id
                );
            }
        }

        let stored = self.attributes.list(schema.id)?;
        match policy {
            LocalPolicy::Declared(local) => {
                for description in local {
                    if retained.contains(&description.name) {
                        debug!(
                            "event=local_attribute_shadowed module=engine project={} schema={} attribute={}",
                            schema.project, schema.name, description.name
                        );
                        report.shadowed.push(description.name.clone());
                        continue;
                    }
                    let write = self.attributes.save_local(schema.id, description)?;
                    report.record(write);
                    retained.insert(description.name.clone());
                }
            }
            LocalPolicy::PreserveStored => {
                for attribute in stored.iter().filter(|attribute| !attribute.inherited) {
                    retained.insert(attribute.name.clone());
                }
            }
        }

        for attribute in stored {
            if !retained.contains(&attribute.name) {
                self.attributes.delete(schema.id, &attribute.name)?;
                report.deleted += 1;
            }
        }

        report.schemas_visited += 1;
        self.sink.schema_changed(SchemaChange::new(
            schema.project.as_str(),
            schema.name.as_str(),
            operation,
        ));
        Ok(())
    }

    fn cascade(&self, root: &Schema, report: &mut ReconcileReport) -> EngineResult<()> {
        let mut visited = HashSet::from([root.id]);
        let mut pending = self.tree.children_of(root)?;
        pending.reverse();

        while let Some(child) = pending.pop() {
            if !visited.insert(child.id) {
                warn!(
                    "event=reconcile module=engine status=cycle_skipped project={} schema={}",
                    child.project, child.name
                );
                continue;
            }

            self.reconcile_level(
                &child,
                LocalPolicy::PreserveStored,
                SchemaOperation::Update,
                report,
            )?;

            let mut grandchildren = self.tree.children_of(&child)?;
            grandchildren.reverse();
            pending.extend(grandchildren);
        }
        Ok(())
    }
}
