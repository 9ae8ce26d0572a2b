//! Canonical dictionary form of a schema.

use crate::model::attribute::{Attribute, Datatype};
use crate::model::schema::{Metadata, ObjectKind, Schema};
use serde::{Deserialize, Serialize};

/// Exported attribute entry. Inherited entries are skipped on import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub datatype: Datatype,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inherited: bool,
}

impl From<&Attribute> for AttributeRecord {
    fn from(attribute: &Attribute) -> Self {
        Self {
            name: attribute.name.clone(),
            label: attribute.label.clone(),
            description: attribute.description.clone(),
            datatype: attribute.datatype,
            hidden: attribute.hidden,
            inherited: attribute.inherited,
        }
    }
}

/// One schema as written to `<name>.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRecord {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub hidden: bool,
    pub obj: ObjectKind,
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeRecord>,
}

impl SchemaRecord {
    /// Builds the record from a stored schema, its parent name and attributes.
    pub fn from_schema(schema: &Schema, parent_name: Option<String>, attributes: &[Attribute]) -> Self {
        Self {
            name: schema.name.clone(),
            label: schema.label.clone(),
            hidden: schema.hidden,
            obj: schema.obj,
            meta: schema.meta.clone(),
            parent: parent_name,
            attributes: attributes.iter().map(AttributeRecord::from).collect(),
        }
    }
}
