//! Project record owning a schema forest.

use serde::{Deserialize, Serialize};

/// Project that scopes schema names and default schemas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Stable slug used as project reference everywhere.
    pub slug: String,
    /// User-facing label.
    pub label: String,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms timestamp of the last schema edit in this project.
    pub updated_at: i64,
}
