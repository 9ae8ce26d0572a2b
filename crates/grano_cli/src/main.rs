//! grano CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;
use grano_core::{
    default_log_level, init_logging, open_db, ChangeDispatcher, DispatcherConfig, LoggingConfig,
    ObserverError, ObserverRegistry, Schema, SchemaCatalog, SchemaChange, SchemaObserver,
};
use log::info;
use std::sync::Arc;

mod cli;
use cli::*;

/// Writes every delivered change to the log.
struct LogObserver;

impl SchemaObserver for LogObserver {
    fn observer_id(&self) -> &str {
        "log"
    }

    fn schema_changed(&self, change: &SchemaChange) -> Result<(), ObserverError> {
        info!(
            "event=schema_changed module=cli project={} schema={} operation={}",
            change.project, change.schema_name, change.operation
        );
        Ok(())
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_schemas(schemas: &[Schema], json: bool) -> Result<()> {
    if json {
        return print_json(&schemas);
    }
    for schema in schemas {
        let hidden = if schema.hidden { " (hidden)" } else { "" };
        println!("{}\t{}\t{}{}", schema.name, schema.obj, schema.label, hidden);
    }
    Ok(())
}

fn start_logging(global: &GlobalOptions) -> Result<()> {
    let Some(log_dir) = &global.log_dir else {
        return Ok(());
    };
    let level = global
        .log_level
        .clone()
        .unwrap_or_else(|| default_log_level().to_string());
    let config = LoggingConfig::new(level, log_dir.clone()).with_echo_warnings(true);
    init_logging(&config).context("failed to initialize logging")
}

fn run(command: Commands, catalog: &SchemaCatalog<'_, '_>, json: bool) -> Result<()> {
    match command {
        Commands::Project(ProjectCommands::Create { slug, label }) => {
            let project = catalog.create_project(&slug, &label)?;
            if json {
                print_json(&project)?;
            } else {
                println!("created project {}", project.slug);
            }
        }
        Commands::Schema(SchemaCommands::List { project }) => {
            print_schemas(&catalog.list(&project)?, json)?;
        }
        Commands::Schema(SchemaCommands::Show { project, name }) => {
            let schema = catalog
                .schema(&project, &name)?
                .with_context(|| format!("schema `{name}` not found in project `{project}`"))?;
            let attributes = catalog.attributes(&project, &name)?;
            if json {
                print_json(&serde_json::json!({
                    "schema": schema,
                    "attributes": attributes,
                }))?;
            } else {
                println!("{} ({}): {}", schema.name, schema.obj, schema.label);
                for attribute in attributes {
                    let origin = if attribute.inherited { "inherited" } else { "local" };
                    println!(
                        "  {}\t{}\t{}\t{}",
                        attribute.name, attribute.datatype, attribute.label, origin
                    );
                }
            }
        }
        Commands::Schema(SchemaCommands::Delete { project, name }) => {
            let removed = catalog.delete(&project, &name)?;
            println!("deleted {name} ({removed} attributes)");
            let orphans = catalog.orphans(&project)?;
            if !orphans.is_empty() {
                eprintln!("schemas left without a parent:");
                print_schemas(&orphans, false)?;
            }
        }
        Commands::Schema(SchemaCommands::Orphans { project }) => {
            print_schemas(&catalog.orphans(&project)?, json)?;
        }
        Commands::Schema(SchemaCommands::Refresh { project, name }) => {
            let report = catalog.refresh(&project, &name)?;
            println!(
                "visited {} schemas: {} created, {} updated, {} deleted",
                report.schemas_visited, report.created, report.updated, report.deleted
            );
        }
        Commands::Import { project, paths } => {
            let report = catalog.import_files(&project, &paths)?;
            if json {
                print_json(&serde_json::json!({
                    "created": report.created,
                    "updated": report.updated,
                }))?;
            } else {
                println!(
                    "imported {} schemas ({} created, {} updated)",
                    report.total(),
                    report.created.len(),
                    report.updated.len()
                );
            }
        }
        Commands::Export { project, dir } => {
            let written = catalog.export(&project, &dir)?;
            for path in written {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    start_logging(&cli.global)?;

    let conn = open_db(&cli.global.db_path)
        .with_context(|| format!("failed to open {}", cli.global.db_path.display()))?;

    let mut registry = ObserverRegistry::new();
    registry.register(Arc::new(LogObserver))?;
    let (notifier, dispatcher) = ChangeDispatcher::start(registry, DispatcherConfig::default())
        .context("failed to start change dispatcher")?;

    let catalog = SchemaCatalog::new(&conn, &notifier);
    let outcome = run(cli.command, &catalog, cli.global.json);

    let stats = dispatcher.shutdown();
    info!(
        "event=cli_exit module=cli status={} delivered={} failed={}",
        if outcome.is_ok() { "ok" } else { "error" },
        stats.delivered,
        stats.failed
    );
    outcome
}
