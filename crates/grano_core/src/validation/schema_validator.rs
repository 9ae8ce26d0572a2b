//! Field-by-field validator for schema descriptions.

use crate::model::attribute::{AttributeDescription, Datatype};
use crate::model::schema::{Metadata, ObjectKind, SchemaDescription};
use crate::repo::project_repo::ProjectRepository;
use crate::repo::schema_repo::SchemaRepository;
use crate::repo::RepoError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const MIN_LABEL_CHARS: usize = 3;

static DATABASE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid database name regex"));

/// Returns whether `value` can be used as a schema or attribute name.
pub fn is_database_name(value: &str) -> bool {
    DATABASE_NAME_RE.is_match(value)
}

/// Validation outcome failure.
#[derive(Debug)]
pub enum ValidationError {
    /// Field path to every message reported for it.
    Invalid(BTreeMap<String, Vec<String>>),
    /// Storage failed while resolving references.
    Repo(RepoError),
}

impl ValidationError {
    /// Returns the structured per-field errors; empty for storage failures.
    pub fn fields(&self) -> BTreeMap<String, Vec<String>> {
        match self {
            Self::Invalid(fields) => fields.clone(),
            Self::Repo(_) => BTreeMap::new(),
        }
    }

    /// Returns whether `field` has at least one message.
    pub fn has_field(&self, field: &str) -> bool {
        matches!(self, Self::Invalid(fields) if fields.contains_key(field))
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(fields) => {
                let rendered: Vec<String> = fields
                    .iter()
                    .map(|(field, messages)| format!("{field}: {}", messages.join("; ")))
                    .collect();
                write!(f, "invalid schema description: {}", rendered.join(", "))
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<RepoError> for ValidationError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

#[derive(Default)]
struct Collector {
    fields: BTreeMap<String, Vec<String>>,
}

impl Collector {
    fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, ValidationError> {
        if self.fields.is_empty() {
            Ok(value())
        } else {
            Err(ValidationError::Invalid(self.fields))
        }
    }
}

/// Validates raw input for `project` and resolves its parent reference.
///
/// # Errors
/// - `Invalid` with every offending field path (`label`,
///   `attributes.1.datatype`, `parent`, ...).
/// - `Repo` when reference lookups fail in storage.
pub fn validate_schema<S, P>(
    raw: &Value,
    project: &str,
    schemas: &S,
    projects: &P,
) -> Result<SchemaDescription, ValidationError>
where
    S: SchemaRepository,
    P: ProjectRepository,
{
    let mut errors = Collector::default();
    let empty = Map::new();
    let fields = match raw.as_object() {
        Some(fields) => fields,
        None => {
            errors.add("", "expected a mapping");
            &empty
        }
    };

    if projects.get_project(project)?.is_none() {
        errors.add("project", format!("unknown project `{project}`"));
    }

    let name = database_name_field(fields, "name", "name", &mut errors);
    let label = label_field(fields, "label", "label", &mut errors);
    let hidden = bool_field(fields, "hidden", "hidden", &mut errors);
    let obj = match fields.get("obj") {
        Some(Value::String(value)) => match value.parse::<ObjectKind>() {
            Ok(obj) => Some(obj),
            Err(_) => {
                errors.add("obj", "must be one of: entity, relation");
                None
            }
        },
        Some(_) => {
            errors.add("obj", "must be a string");
            None
        }
        None => {
            errors.add("obj", "required");
            None
        }
    };
    if let (Some(name), Some(obj)) = (name.as_deref(), obj) {
        if let Some(reserved) = ObjectKind::for_default_schema_name(name) {
            if reserved != obj {
                errors.add("obj", format!("default schema `{name}` must be of kind {reserved}"));
            }
        }
    }
    let meta: Metadata = match fields.get("meta") {
        None | Some(Value::Null) => Metadata::new(),
        Some(Value::Object(map)) => map.clone().into_iter().collect(),
        Some(_) => {
            errors.add("meta", "must be a mapping");
            Metadata::new()
        }
    };
    let attributes = attributes_field(fields, &mut errors);

    let parent = match fields.get("parent") {
        None | Some(Value::Null) => None,
        Some(Value::String(parent_name)) if parent_name.trim().is_empty() => None,
        Some(Value::String(parent_name)) => match schemas.find_schema(project, parent_name)? {
            Some(parent) => Some(parent.id),
            None => {
                errors.add("parent", format!("unknown schema `{parent_name}`"));
                None
            }
        },
        Some(_) => {
            errors.add("parent", "must be a schema name");
            None
        }
    };

    errors.finish(|| SchemaDescription {
        project: project.to_string(),
        name: name.unwrap_or_default(),
        label: label.unwrap_or_default(),
        hidden,
        obj: obj.unwrap_or(ObjectKind::Entity),
        meta,
        parent,
        attributes,
    })
}

fn attributes_field(fields: &Map<String, Value>, errors: &mut Collector) -> Vec<AttributeDescription> {
    let items = match fields.get("attributes") {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => {
            errors.add("attributes", "must be a sequence");
            return Vec::new();
        }
    };

    let mut result = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let prefix = format!("attributes.{index}");
        let Some(attribute) = item.as_object() else {
            errors.add(prefix, "expected a mapping");
            continue;
        };
        if attribute.get("inherited").and_then(Value::as_bool) == Some(true) {
            continue;
        }

        let name = database_name_field(attribute, "name", &format!("{prefix}.name"), errors);
        let label = label_field(attribute, "label", &format!("{prefix}.label"), errors);
        let description = match attribute.get("description") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(value)) => value.clone(),
            Some(_) => {
                errors.add(format!("{prefix}.description"), "must be a string");
                String::new()
            }
        };
        let datatype = match attribute.get("datatype") {
            None | Some(Value::Null) => Some(Datatype::default()),
            Some(Value::String(value)) => match value.parse::<Datatype>() {
                Ok(datatype) => Some(datatype),
                Err(_) => {
                    let allowed: Vec<&str> = Datatype::ALL.iter().map(|d| d.as_str()).collect();
                    errors.add(
                        format!("{prefix}.datatype"),
                        format!("must be one of: {}", allowed.join(", ")),
                    );
                    None
                }
            },
            Some(_) => {
                errors.add(format!("{prefix}.datatype"), "must be a string");
                None
            }
        };
        let hidden = bool_field(attribute, "hidden", &format!("{prefix}.hidden"), errors);

        if let (Some(name), Some(label), Some(datatype)) = (name, label, datatype) {
            result.push(AttributeDescription {
                name,
                label,
                description,
                datatype,
                hidden,
            });
        }
    }
    result
}

fn string_field(
    fields: &Map<String, Value>,
    key: &str,
    path: &str,
    errors: &mut Collector,
) -> Option<String> {
    match fields.get(key) {
        Some(Value::String(value)) => Some(value.trim().to_string()),
        Some(Value::Null) | None => {
            errors.add(path, "required");
            None
        }
        Some(_) => {
            errors.add(path, "must be a string");
            None
        }
    }
}

fn database_name_field(
    fields: &Map<String, Value>,
    key: &str,
    path: &str,
    errors: &mut Collector,
) -> Option<String> {
    let value = string_field(fields, key, path, errors)?;
    if !is_database_name(&value) {
        errors.add(path, "may only contain letters, digits and underscores");
        return None;
    }
    Some(value)
}

fn label_field(
    fields: &Map<String, Value>,
    key: &str,
    path: &str,
    errors: &mut Collector,
) -> Option<String> {
    let value = string_field(fields, key, path, errors)?;
    if value.chars().count() < MIN_LABEL_CHARS {
        errors.add(path, format!("must be at least {MIN_LABEL_CHARS} characters"));
        return None;
    }
    Some(value)
}

fn bool_field(fields: &Map<String, Value>, key: &str, path: &str, errors: &mut Collector) -> bool {
    match fields.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(value)) => *value,
        Some(Value::String(value)) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" | "" => false,
            _ => {
                errors.add(path, "must be a boolean");
                false
            }
        },
        Some(Value::Number(value)) => match value.as_i64() {
            Some(0) => false,
            Some(1) => true,
            _ => {
                errors.add(path, "must be a boolean");
                false
            }
        },
        Some(_) => {
            errors.add(path, "must be a boolean");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{bool_field, is_database_name, Collector};
    use serde_json::json;

    #[test]
    fn database_names_allow_word_characters_only() {
        assert!(is_database_name("person_2"));
        assert!(is_database_name("__entity__"));
        assert!(!is_database_name("has space"));
        assert!(!is_database_name(""));
        assert!(!is_database_name("dash-name"));
    }

    #[test]
    fn bool_field_coerces_common_spellings() {
        let mut errors = Collector::default();
        let fields = json!({"a": "yes", "b": 0, "c": "maybe"});
        let fields = fields.as_object().unwrap();

        assert!(bool_field(fields, "a", "a", &mut errors));
        assert!(!bool_field(fields, "b", "b", &mut errors));
        assert!(!bool_field(fields, "missing", "missing", &mut errors));
        assert!(!bool_field(fields, "c", "c", &mut errors));
        assert_eq!(errors.fields.len(), 1);
        assert!(errors.fields.contains_key("c"));
    }
}
