//! Attribute store: CRUD with inheritance-flag bookkeeping.
//!
//! # Invariants
//! - Local saves always persist `inherited = false`.
//! - Inherited saves copy every value field of the parent attribute.
//! - A save whose target already matches storage performs no write.

use crate::model::attribute::{Attribute, AttributeDescription};
use crate::model::schema::SchemaId;
use crate::repo::attribute_repo::AttributeRepository;
use crate::repo::RepoResult;

/// Outcome of one attribute save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeWrite {
    Created,
    Updated,
    Unchanged,
}

/// Attribute CRUD facade used by the reconciliation engine.
pub struct AttributeStore<R: AttributeRepository> {
    repo: R,
}

impl<R: AttributeRepository> AttributeStore<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Lists attributes of one schema ordered by name.
    pub fn list(&self, schema_id: SchemaId) -> RepoResult<Vec<Attribute>> {
        self.repo.list_attributes(schema_id)
    }

    pub fn get(&self, schema_id: SchemaId, name: &str) -> RepoResult<Option<Attribute>> {
        self.repo.get_attribute(schema_id, name)
    }

    /// Creates or updates a locally declared attribute.
    pub fn save_local(
        &self,
        schema_id: SchemaId,
        description: &AttributeDescription,
    ) -> RepoResult<AttributeWrite> {
        self.write(Attribute::local(schema_id, description))
    }

    /// Creates or updates the copy of `parent_attribute` on `schema_id`.
    pub fn save_inherited(
        &self,
        schema_id: SchemaId,
        parent_attribute: &Attribute,
    ) -> RepoResult<AttributeWrite> {
        self.write(Attribute::inherited_from(schema_id, parent_attribute))
    }

    pub fn delete(&self, schema_id: SchemaId, name: &str) -> RepoResult<()> {
        self.repo.delete_attribute(schema_id, name)
    }

    /// Deletes every attribute owned by one schema.
    pub fn delete_all(&self, schema_id: SchemaId) -> RepoResult<usize> {
        self.repo.delete_schema_attributes(schema_id)
    }

    fn write(&self, target: Attribute) -> RepoResult<AttributeWrite> {
        let outcome = match self.repo.get_attribute(target.schema_id, &target.name)? {
            None => AttributeWrite::Created,
            Some(current) if current == target => return Ok(AttributeWrite::Unchanged),
            Some(_) => AttributeWrite::Updated,
        };
        self.repo.upsert_attribute(&target)?;
        Ok(outcome)
    }
}
