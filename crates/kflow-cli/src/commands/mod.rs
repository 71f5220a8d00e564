//! CLI command implementations

pub mod export;
pub mod query;
pub mod scan;
pub mod stat;

use std::path::PathBuf;

use anyhow::{Context, Result};
use kflow_config::{ConfigLoader, KflowConfig};
use kflow_core::{GraphStore, StoreConnection, StoreError};
use tracing::info;

use crate::GlobalOptions;

/// Load configuration, with the CLI options layered on top.
///
/// `--config` replaces global/local discovery with a single explicit file.
pub fn load_config(global: &GlobalOptions) -> Result<KflowConfig> {
    let loader = ConfigLoader::new();
    let overrides = global.to_config_overrides();

    match global.config {
        Some(ref path) => loader
            .load_file(path, Some(&overrides))
            .with_context(|| format!("Failed to load config file {}", path.display())),
        None => loader
            .load(&global.workdir, Some(&overrides))
            .context("Failed to load configuration"),
    }
}

/// Absolute path of the database file.
pub fn database_path(config: &KflowConfig) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Ok(config.database_path(&cwd))
}

/// Store handle configured from `config`.
pub fn graph_store(config: &KflowConfig) -> Result<GraphStore> {
    Ok(GraphStore::new(database_path(config)?).with_busy_timeout(config.busy_timeout()))
}

/// Open the database for a read command; it must already exist.
pub fn open_database(config: &KflowConfig) -> Result<StoreConnection> {
    let store = graph_store(config)?;
    let conn = store.open_existing().map_err(|e| match e {
        StoreError::NotFound(path) => anyhow::anyhow!(
            "Database file {} not found. Run 'kflow scan' first.",
            path.display()
        ),
        other => anyhow::Error::new(other).context("Failed to open database"),
    })?;
    info!("Using {}", store.path().display());
    Ok(conn)
}

/// Print an info message (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}
