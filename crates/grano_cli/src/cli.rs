//! Command line surface.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "grano")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Manage inheritable schema catalogs")]
#[command(long_about = r#"
Schemas form one tree per project. A schema carries its own attributes plus
copies of everything its parent carries; editing a schema updates every
descendant in the same transaction.

EXAMPLES:
  grano project create acme "Acme Corp"
  grano import acme schemata/*.yaml
  grano schema show acme employee
  grano export acme ./export

ENVIRONMENT VARIABLES:
  GRANO_DB        Catalog database path (default: grano.db)
  GRANO_LOG       Log level (trace, debug, info, warn, error)
  GRANO_LOG_DIR   Absolute log directory; file logging is off when unset
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalOptions {
    /// Path to the catalog database
    #[arg(long = "db", env = "GRANO_DB", global = true, default_value = "grano.db")]
    pub db_path: PathBuf,

    /// Log level
    #[arg(long, env = "GRANO_LOG", global = true)]
    pub log_level: Option<String>,

    /// Directory for rolling log files
    #[arg(long, env = "GRANO_LOG_DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Project management
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Schema inspection and maintenance
    #[command(subcommand)]
    Schema(SchemaCommands),

    /// Import YAML schema files as one batch
    Import {
        project: String,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Write one YAML file per schema into a directory
    Export { project: String, dir: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a project
    Create { slug: String, label: String },
}

#[derive(Subcommand, Debug)]
pub enum SchemaCommands {
    /// List schemas of a project
    List { project: String },

    /// Show one schema with its attributes
    Show { project: String, name: String },

    /// Delete a schema and its attributes
    Delete { project: String, name: String },

    /// List schemas whose parent no longer exists
    Orphans { project: String },

    /// Re-propagate inherited attributes from a schema downward
    Refresh { project: String, name: String },
}
