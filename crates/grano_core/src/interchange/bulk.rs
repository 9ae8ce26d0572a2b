//! Batch parsing, ordering and export file writing.

use crate::interchange::record::SchemaRecord;
use serde_json::Value;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// File extension of exported schema files.
pub const EXPORT_EXTENSION: &str = "yaml";

/// Errors reading or writing the interchange format.
#[derive(Debug)]
pub enum InterchangeError {
    /// Input is not valid YAML or has an unexpected top-level shape.
    Parse(String),
    /// Record could not be rendered.
    Serialize(String),
    Io { path: PathBuf, source: std::io::Error },
}

impl Display for InterchangeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "cannot parse schema batch: {message}"),
            Self::Serialize(message) => write!(f, "cannot render schema record: {message}"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl Error for InterchangeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Parses one mapping or a sequence of mappings into raw entries.
///
/// Entries stay untyped so validation can report every field error.
pub fn parse_batch(text: &str) -> Result<Vec<Value>, InterchangeError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let document: Value =
        serde_yaml::from_str(text).map_err(|err| InterchangeError::Parse(err.to_string()))?;
    match document {
        Value::Null => Ok(Vec::new()),
        Value::Object(_) => Ok(vec![document]),
        Value::Array(items) => Ok(items),
        _ => Err(InterchangeError::Parse(
            "expected a mapping or a sequence of mappings".to_string(),
        )),
    }
}

/// Stable reorder so an entry whose parent is declared in the same batch
/// comes after that parent. Entries caught in a parent cycle keep their
/// relative order at the end.
pub fn order_by_parent(entries: Vec<Value>) -> Vec<Value> {
    let names: HashSet<String> = entries.iter().filter_map(entry_name).collect();
    let mut placed: HashSet<String> = HashSet::new();
    let mut remaining: Vec<Value> = entries;
    let mut ordered = Vec::with_capacity(remaining.len());

    loop {
        let before = remaining.len();
        let mut deferred = Vec::new();
        for entry in remaining {
            let ready = match entry_parent(&entry) {
                Some(parent) => !names.contains(&parent) || placed.contains(&parent),
                None => true,
            };
            if ready {
                if let Some(name) = entry_name(&entry) {
                    placed.insert(name);
                }
                ordered.push(entry);
            } else {
                deferred.push(entry);
            }
        }
        remaining = deferred;
        if remaining.is_empty() || remaining.len() == before {
            break;
        }
    }

    ordered.extend(remaining);
    ordered
}

/// Writes one `<name>.yaml` per record into `dir`, creating it if missing.
pub fn write_records(dir: &Path, records: &[SchemaRecord]) -> Result<Vec<PathBuf>, InterchangeError> {
    std::fs::create_dir_all(dir).map_err(|source| InterchangeError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(records.len());
    let mut seen = HashSet::new();
    for record in records {
        if !seen.insert(record.name.as_str()) {
            continue;
        }
        let path = dir.join(format!("{}.{EXPORT_EXTENSION}", record.name));
        let rendered = serde_yaml::to_string(record)
            .map_err(|err| InterchangeError::Serialize(err.to_string()))?;
        std::fs::write(&path, rendered).map_err(|source| InterchangeError::Io {
            path: path.clone(),
            source,
        })?;
        written.push(path);
    }
    Ok(written)
}

fn entry_name(entry: &Value) -> Option<String> {
    entry.get("name")?.as_str().map(str::to_string)
}

fn entry_parent(entry: &Value) -> Option<String> {
    entry
        .get("parent")?
        .as_str()
        .filter(|parent| !parent.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::{order_by_parent, parse_batch};
    use serde_json::json;

    #[test]
    fn parse_batch_accepts_single_mapping_and_sequence() {
        let single = parse_batch("name: person\nlabel: Person\nobj: entity\n").unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0]["name"], "person");

        let many = parse_batch("- name: a\n- name: b\n").unwrap();
        assert_eq!(many.len(), 2);

        assert!(parse_batch("").unwrap().is_empty());
        assert!(parse_batch("just a string").is_err());
    }

    #[test]
    fn order_by_parent_moves_children_after_parents_in_batch() {
        let entries = vec![
            json!({"name": "employee", "parent": "person"}),
            json!({"name": "manager", "parent": "employee"}),
            json!({"name": "person"}),
            json!({"name": "link", "parent": "already_stored"}),
        ];

        let names: Vec<String> = order_by_parent(entries)
            .iter()
            .map(|entry| entry["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["person", "link", "employee", "manager"]);
    }

    #[test]
    fn order_by_parent_keeps_cyclic_entries() {
        let entries = vec![
            json!({"name": "a", "parent": "b"}),
            json!({"name": "b", "parent": "a"}),
        ];
        assert_eq!(order_by_parent(entries).len(), 2);
    }
}
