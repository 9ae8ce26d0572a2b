//! Attribute definitions and the closed datatype set.
//!
//! # Invariants
//! - `inherited = true` means the value was copied from the parent schema
//!   and is overwritten on every reconciliation of that parent.
//! - `datatype` is always one of [`Datatype::ALL`].

use crate::model::schema::SchemaId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Supported attribute value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Datatype {
    #[default]
    String,
    Text,
    Integer,
    Float,
    Number,
    Boolean,
    Date,
    Datetime,
    Url,
    Geo,
}

impl Datatype {
    pub const ALL: [Datatype; 10] = [
        Datatype::String,
        Datatype::Text,
        Datatype::Integer,
        Datatype::Float,
        Datatype::Number,
        Datatype::Boolean,
        Datatype::Date,
        Datatype::Datetime,
        Datatype::Url,
        Datatype::Geo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Url => "url",
            Self::Geo => "geo",
        }
    }
}

impl Display for Datatype {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Datatype {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|datatype| datatype.as_str() == value)
            .ok_or_else(|| format!("unsupported datatype `{value}`"))
    }
}

/// Validated local attribute declaration submitted with a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescription {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub datatype: Datatype,
    #[serde(default)]
    pub hidden: bool,
}

impl AttributeDescription {
    /// Creates a description with default description, datatype and visibility.
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            description: String::new(),
            datatype: Datatype::default(),
            hidden: false,
        }
    }

    pub fn with_datatype(mut self, datatype: Datatype) -> Self {
        self.datatype = datatype;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

/// Attribute stored on exactly one schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub schema_id: SchemaId,
    pub name: String,
    pub label: String,
    pub description: String,
    pub datatype: Datatype,
    pub hidden: bool,
    pub inherited: bool,
}

impl Attribute {
    /// Builds a local (non-inherited) attribute from a declaration.
    pub fn local(schema_id: SchemaId, description: &AttributeDescription) -> Self {
        Self {
            schema_id,
            name: description.name.clone(),
            label: description.label.clone(),
            description: description.description.clone(),
            datatype: description.datatype,
            hidden: description.hidden,
            inherited: false,
        }
    }

    /// Copies a parent attribute onto `schema_id`, flagged as inherited.
    pub fn inherited_from(schema_id: SchemaId, parent_attribute: &Attribute) -> Self {
        Self {
            schema_id,
            inherited: true,
            ..parent_attribute.clone()
        }
    }

    /// Returns whether value fields match, ignoring owner and inheritance flag.
    pub fn same_values(&self, other: &Attribute) -> bool {
        self.name == other.name
            && self.label == other.label
            && self.description == other.description
            && self.datatype == other.datatype
            && self.hidden == other.hidden
    }
}

#[cfg(test)]
mod tests {
    use super::{Attribute, AttributeDescription, Datatype};
    use uuid::Uuid;

    #[test]
    fn datatype_parses_every_known_name() {
        for datatype in Datatype::ALL {
            assert_eq!(datatype.as_str().parse::<Datatype>(), Ok(datatype));
        }
        assert!("blob".parse::<Datatype>().is_err());
    }

    #[test]
    fn inherited_copy_keeps_values_and_changes_owner() {
        let parent_id = Uuid::new_v4();
        let child_id = Uuid::new_v4();
        let parent = Attribute::local(
            parent_id,
            &AttributeDescription::new("age", "Age").with_datatype(Datatype::Number),
        );

        let copy = Attribute::inherited_from(child_id, &parent);
        assert_eq!(copy.schema_id, child_id);
        assert!(copy.inherited);
        assert!(copy.same_values(&parent));
    }
}
