//! Observer registry for schema change delivery.

use crate::notify::SchemaChange;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Failure reported by one observer for one change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverError {
    pub message: String,
    /// Whether delivering the same change again may succeed.
    pub retryable: bool,
}

impl ObserverError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

impl Display for ObserverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ObserverError {}

/// External party interested in schema changes.
pub trait SchemaObserver: Send + Sync {
    /// Stable id, lowercase ascii, digits, `_` or `-`.
    fn observer_id(&self) -> &str;
    fn schema_changed(&self, change: &SchemaChange) -> Result<(), ObserverError>;
}

/// Observer registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverRegistryError {
    InvalidObserverId(String),
    DuplicateObserverId(String),
}

impl Display for ObserverRegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidObserverId(value) => write!(f, "observer id is invalid: {value}"),
            Self::DuplicateObserverId(value) => {
                write!(f, "observer id already registered: {value}")
            }
        }
    }
}

impl Error for ObserverRegistryError {}

/// Named observers, iterated in id order.
#[derive(Default, Clone)]
pub struct ObserverRegistry {
    observers: BTreeMap<String, Arc<dyn SchemaObserver>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one observer.
    pub fn register(
        &mut self,
        observer: Arc<dyn SchemaObserver>,
    ) -> Result<(), ObserverRegistryError> {
        let observer_id = observer.observer_id().trim().to_string();
        if !is_valid_observer_id(&observer_id) {
            return Err(ObserverRegistryError::InvalidObserverId(observer_id));
        }
        if self.observers.contains_key(observer_id.as_str()) {
            return Err(ObserverRegistryError::DuplicateObserverId(observer_id));
        }

        self.observers.insert(observer_id, observer);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Returns sorted observer ids.
    pub fn observer_ids(&self) -> Vec<String> {
        self.observers.keys().cloned().collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn SchemaObserver>)> {
        self.observers
            .iter()
            .map(|(id, observer)| (id.as_str(), observer))
    }
}

fn is_valid_observer_id(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::{ObserverError, ObserverRegistry, ObserverRegistryError, SchemaObserver};
    use crate::notify::SchemaChange;
    use std::sync::Arc;

    struct NamedObserver(&'static str);

    impl SchemaObserver for NamedObserver {
        fn observer_id(&self) -> &str {
            self.0
        }

        fn schema_changed(&self, _change: &SchemaChange) -> Result<(), ObserverError> {
            Ok(())
        }
    }

    #[test]
    fn rejects_invalid_or_duplicate_observer_id() {
        let mut registry = ObserverRegistry::new();
        let invalid = registry.register(Arc::new(NamedObserver("Search Index")));
        assert!(matches!(
            invalid,
            Err(ObserverRegistryError::InvalidObserverId(_))
        ));

        registry
            .register(Arc::new(NamedObserver("search_index")))
            .expect("first observer should register");
        let duplicate = registry.register(Arc::new(NamedObserver("search_index")));
        assert!(matches!(
            duplicate,
            Err(ObserverRegistryError::DuplicateObserverId(_))
        ));
    }

    #[test]
    fn lists_observer_ids_sorted() {
        let mut registry = ObserverRegistry::new();
        registry
            .register(Arc::new(NamedObserver("webhook")))
            .expect("webhook should register");
        registry
            .register(Arc::new(NamedObserver("audit-log")))
            .expect("audit should register");

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.observer_ids(), vec!["audit-log", "webhook"]);
    }
}
