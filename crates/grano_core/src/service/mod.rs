//! Use-case services over the schema repositories.
//!
//! # Responsibility
//! - Schema tree lookups and lazy default anchors.
//! - Minimal-write attribute persistence.
//! - Save, reconcile, cascade and delete orchestration.
//! - Transactional catalog facade for callers outside the crate.

pub mod attribute_store;
pub mod catalog;
pub mod reconcile;
pub mod schema_tree;
