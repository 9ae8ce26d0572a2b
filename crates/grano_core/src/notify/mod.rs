//! Schema change notification.
//!
//! # Responsibility
//! - Describe schema change events and the sink the engine signals into.
//! - Deliver events to registered observers off the write path.
//!
//! # Invariants
//! - Signalling a change never blocks and never fails the caller.
//! - Observer failures are logged and swallowed at the dispatcher boundary.

mod dispatcher;
mod registry;

pub use dispatcher::{
    ChangeDispatcher, ChangeNotifier, DeliveryStats, DispatcherConfig, DispatcherHandle,
};
pub use registry::{ObserverError, ObserverRegistry, ObserverRegistryError, SchemaObserver};

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt::{Display, Formatter};

/// Kind of schema change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaOperation {
    Create,
    Update,
    Delete,
}

impl SchemaOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl Display for SchemaOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One schema change as seen by observers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaChange {
    pub project: String,
    pub schema_name: String,
    pub operation: SchemaOperation,
}

impl SchemaChange {
    pub fn new(
        project: impl Into<String>,
        schema_name: impl Into<String>,
        operation: SchemaOperation,
    ) -> Self {
        Self {
            project: project.into(),
            schema_name: schema_name.into(),
            operation,
        }
    }
}

/// Fire-and-forget target for schema change signals.
pub trait ChangeSink {
    fn schema_changed(&self, change: SchemaChange);
}

/// Buffers signals raised inside a unit of work.
///
/// The owner publishes them after commit or drops them on rollback.
#[derive(Debug, Default)]
pub struct DeferredChanges {
    pending: RefCell<Vec<SchemaChange>>,
}

impl DeferredChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    /// Drains buffered changes in the order they were signalled.
    pub fn take(&self) -> Vec<SchemaChange> {
        std::mem::take(&mut *self.pending.borrow_mut())
    }

    /// Forwards every buffered change to `sink`, preserving order.
    pub fn publish_to(&self, sink: &dyn ChangeSink) -> usize {
        let changes = self.take();
        let count = changes.len();
        for change in changes {
            sink.schema_changed(change);
        }
        count
    }
}

impl ChangeSink for DeferredChanges {
    fn schema_changed(&self, change: SchemaChange) {
        self.pending.borrow_mut().push(change);
    }
}
