//! Validation of raw schema input into typed descriptions.
//!
//! # Responsibility
//! - Coerce loosely typed input (JSON/YAML values) into a
//!   [`crate::model::schema::SchemaDescription`].
//! - Report every offending field, not only the first one.
//!
//! # Invariants
//! - The engine save path is only reached with validated descriptions.
//! - References (project, parent) are resolved within one project.

mod schema_validator;

pub use schema_validator::{is_database_name, validate_schema, ValidationError};
