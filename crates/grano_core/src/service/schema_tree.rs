//! Schema tree navigation over the project-scoped schema forest.
//!
//! # Responsibility
//! - Resolve schemas by name, list children, test circularity.
//! - Provide the per-project default schema for each object kind.
//!
//! # Invariants
//! - All navigation is scoped to one project.
//! - Default schemas are created lazily and never get a parent.

use crate::model::schema::{ObjectKind, Schema, SchemaId};
use crate::repo::schema_repo::SchemaRepository;
use crate::repo::{RepoError, RepoResult};
use log::info;
use std::collections::HashSet;

/// Project-scoped schema tree facade.
pub struct SchemaTree<R: SchemaRepository> {
    repo: R,
}

impl<R: SchemaRepository> SchemaTree<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Exact-name lookup within one project.
    pub fn resolve(&self, project: &str, name: &str) -> RepoResult<Option<Schema>> {
        self.repo.find_schema(project, name)
    }

    pub fn get(&self, id: SchemaId) -> RepoResult<Option<Schema>> {
        self.repo.get_schema(id)
    }

    /// Like [`Self::get`] but fails with `SchemaNotFound`.
    pub fn require(&self, id: SchemaId) -> RepoResult<Schema> {
        self.repo
            .get_schema(id)?
            .ok_or(RepoError::SchemaNotFound(id))
    }

    /// Returns whether making `candidate_parent` the parent of `schema_id`
    /// would close a cycle.
    ///
    /// Walks the stored chain upward from the candidate. Reaching `schema_id`
    /// (including `candidate_parent == schema_id`) or revisiting any node is
    /// circular; a missing link ends the chain.
    pub fn is_circular(&self, schema_id: SchemaId, candidate_parent: SchemaId) -> RepoResult<bool> {
        let mut visited = HashSet::new();
        let mut cursor = Some(candidate_parent);
        while let Some(current) = cursor {
            if current == schema_id {
                return Ok(true);
            }
            if !visited.insert(current) {
                return Ok(true);
            }
            cursor = match self.repo.get_schema(current)? {
                Some(node) => node.parent_id,
                None => None,
            };
        }
        Ok(false)
    }

    /// All schemas whose parent is `schema`, in name order.
    pub fn children_of(&self, schema: &Schema) -> RepoResult<Vec<Schema>> {
        self.repo.list_children(&schema.project, schema.id)
    }

    /// All schemas of a project, in name order.
    pub fn list(&self, project: &str) -> RepoResult<Vec<Schema>> {
        self.repo.list_schemas(project)
    }

    /// Schemas whose stored parent id no longer resolves.
    pub fn orphans(&self, project: &str) -> RepoResult<Vec<Schema>> {
        let schemas = self.repo.list_schemas(project)?;
        let known: HashSet<SchemaId> = schemas.iter().map(|schema| schema.id).collect();
        Ok(schemas
            .into_iter()
            .filter(|schema| {
                schema
                    .parent_id
                    .is_some_and(|parent_id| !known.contains(&parent_id))
            })
            .collect())
    }

    /// Loads the default schema of `obj` in `project`, creating it if absent.
    pub fn default_schema(&self, project: &str, obj: ObjectKind) -> RepoResult<Schema> {
        let name = obj.default_schema_name();
        if let Some(existing) = self.repo.find_schema(project, name)? {
            return Ok(existing);
        }

        let mut schema = Schema::new(project, name, obj);
        schema.label = obj.default_schema_label().to_string();
        self.repo.insert_schema(&schema)?;
        info!(
            "event=default_schema_created module=tree status=ok project={} name={}",
            project, name
        );
        self.repo
            .find_schema(project, name)?
            .ok_or(RepoError::SchemaNotFound(schema.id))
    }

    pub(crate) fn repo(&self) -> &R {
        &self.repo
    }
}
