//! Catalog domain model.
//!
//! # Responsibility
//! - Define projects, schemas and attribute definitions used by the engine.
//! - Keep storage-independent value semantics (equality, defaults).
//!
//! # Invariants
//! - A schema's `name` and `project` never change after creation.
//! - Attribute names are unique within one schema.

pub mod attribute;
pub mod project;
pub mod schema;
