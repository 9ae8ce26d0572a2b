//! Schema domain model.
//!
//! # Responsibility
//! - Define the schema record and the validated description used to save it.
//! - Own the reserved default schema names per object kind.
//!
//! # Invariants
//! - Default schemas (`__entity__`, `__relation__`) never have a parent.
//! - `parent_id` is the only stored tree link; children are derived.

use crate::model::attribute::AttributeDescription;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable schema identifier.
pub type SchemaId = Uuid;

/// Open key/value metadata attached to a schema.
pub type Metadata = BTreeMap<String, Value>;

/// Reserved default schema name for entities.
pub const ENTITY_DEFAULT: &str = "__entity__";
/// Reserved default schema name for relations.
pub const RELATION_DEFAULT: &str = "__relation__";

/// Graph object kind a schema describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Entity,
    Relation,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Relation => "relation",
        }
    }

    /// Name of the per-project default schema for this kind.
    pub fn default_schema_name(self) -> &'static str {
        match self {
            Self::Entity => ENTITY_DEFAULT,
            Self::Relation => RELATION_DEFAULT,
        }
    }

    /// Kind owning the reserved default schema `name`, if it is one.
    pub fn for_default_schema_name(name: &str) -> Option<Self> {
        match name {
            ENTITY_DEFAULT => Some(Self::Entity),
            RELATION_DEFAULT => Some(Self::Relation),
            _ => None,
        }
    }

    /// Label given to a lazily created default schema.
    pub fn default_schema_label(self) -> &'static str {
        match self {
            Self::Entity => "Entity",
            Self::Relation => "Relation",
        }
    }
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "entity" => Ok(Self::Entity),
            "relation" => Ok(Self::Relation),
            other => Err(format!("unknown object kind `{other}`")),
        }
    }
}

/// Returns whether `name` is one of the reserved default schema names.
pub fn is_default_schema_name(name: &str) -> bool {
    name == ENTITY_DEFAULT || name == RELATION_DEFAULT
}

/// Persisted schema record. Attributes are stored separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub id: SchemaId,
    pub project: String,
    pub name: String,
    pub label: String,
    pub hidden: bool,
    pub obj: ObjectKind,
    pub meta: Metadata,
    /// Parent schema id. `None` only for default schemas or orphans.
    pub parent_id: Option<SchemaId>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Schema {
    /// Creates an unsaved schema bound to `project` and `name`.
    ///
    /// Label and kind are placeholders until the save path assigns them.
    pub fn new(project: impl Into<String>, name: impl Into<String>, obj: ObjectKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            project: project.into(),
            name: name.into(),
            label: String::new(),
            hidden: false,
            obj,
            meta: Metadata::new(),
            parent_id: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn is_default(&self) -> bool {
        is_default_schema_name(&self.name)
    }
}

/// Validated input for the schema save path.
///
/// Produced by [`crate::validation::validate_schema`]; the parent reference is
/// already resolved to an id in the same project.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescription {
    pub project: String,
    pub name: String,
    pub label: String,
    pub hidden: bool,
    pub obj: ObjectKind,
    pub meta: Metadata,
    pub parent: Option<SchemaId>,
    pub attributes: Vec<AttributeDescription>,
}

impl SchemaDescription {
    /// Creates a visible description with no parent, metadata or attributes.
    pub fn new(
        project: impl Into<String>,
        name: impl Into<String>,
        label: impl Into<String>,
        obj: ObjectKind,
    ) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
            label: label.into(),
            hidden: false,
            obj,
            meta: Metadata::new(),
            parent: None,
            attributes: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: SchemaId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeDescription) -> Self {
        self.attributes.push(attribute);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{is_default_schema_name, ObjectKind, ENTITY_DEFAULT, RELATION_DEFAULT};

    #[test]
    fn default_names_map_to_object_kinds() {
        assert_eq!(ObjectKind::Entity.default_schema_name(), ENTITY_DEFAULT);
        assert_eq!(ObjectKind::Relation.default_schema_name(), RELATION_DEFAULT);
        assert!(is_default_schema_name("__relation__"));
        assert!(!is_default_schema_name("person"));
        assert_eq!(
            ObjectKind::for_default_schema_name(ENTITY_DEFAULT),
            Some(ObjectKind::Entity)
        );
        assert_eq!(
            ObjectKind::for_default_schema_name(RELATION_DEFAULT),
            Some(ObjectKind::Relation)
        );
        assert_eq!(ObjectKind::for_default_schema_name("person"), None);
    }

    #[test]
    fn object_kind_round_trips_through_str() {
        assert_eq!("entity".parse::<ObjectKind>(), Ok(ObjectKind::Entity));
        assert!("node".parse::<ObjectKind>().is_err());
    }
}
