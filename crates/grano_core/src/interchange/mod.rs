//! YAML interchange format for bulk schema import/export.
//!
//! # Responsibility
//! - Define the canonical per-schema record written on export.
//! - Parse import batches and order them so parents precede children.
//! - Write one `<schema-name>.yaml` file per schema.

mod bulk;
mod record;

pub use bulk::{order_by_parent, parse_batch, write_records, InterchangeError, EXPORT_EXTENSION};
pub use record::{AttributeRecord, SchemaRecord};
