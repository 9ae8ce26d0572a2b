//! Schema catalog core for grano.
//!
//! Schemas form a per-project tree. Every schema carries the attributes it
//! declares plus copies of everything its parent carries, and any change
//! cascades to all descendants inside one storage transaction.

pub mod db;
pub mod interchange;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod service;
pub mod validation;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::attribute::{Attribute, AttributeDescription, Datatype};
pub use model::project::Project;
pub use model::schema::{
    ObjectKind, Schema, SchemaDescription, SchemaId, ENTITY_DEFAULT, RELATION_DEFAULT,
};
pub use notify::{
    ChangeDispatcher, ChangeNotifier, ChangeSink, DeferredChanges,
    DeliveryStats, DispatcherConfig, DispatcherHandle, ObserverError, ObserverRegistry, SchemaChange,
    SchemaObserver, SchemaOperation,
};
pub use repo::{RepoError, RepoResult};
pub use service::catalog::{CatalogError, CatalogResult, ImportReport, SchemaCatalog};
pub use service::reconcile::{EngineError, EngineResult, ReconcileReport, SchemaEngine};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
