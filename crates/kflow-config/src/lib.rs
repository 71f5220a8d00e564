//! kflow Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.kflow/config.toml`
//! - Local config: `.kflow/config.toml` (in the work directory)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → CLI overrides.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default database file, relative to the current directory.
pub const DEFAULT_DATABASE: &str = "kflow.db";

/// Default log file, relative to the current directory.
pub const DEFAULT_LOG_FILE: &str = "kflow.log";

/// Default graph file extension.
pub const DEFAULT_EXTENSION: &str = "ci";

/// Default wait on a locked database, in seconds.
pub const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 120;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Root configuration for kflow.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct KflowConfig {
    /// Database settings
    pub storage: StorageConfig,

    /// Scan settings
    pub scan: ScanConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Database file and locking settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path (default: `kflow.db`)
    pub database: PathBuf,

    /// Seconds a writer waits on a locked database before failing
    pub busy_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            busy_timeout_secs: DEFAULT_BUSY_TIMEOUT_SECS,
        }
    }
}

/// Scan settings.
///
/// # Example TOML
///
/// ```toml
/// [scan]
/// jobs = 4        # 0 = one worker per processor
/// extension = "ci"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanConfig {
    /// Worker count (0 = available processors)
    pub jobs: usize,

    /// Extension of graph files to ingest
    pub extension: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            jobs: 0,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file format (text, json)
    pub format: LogFormat,

    /// Log file path (default: `kflow.log`)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Effective log file path.
    pub fn log_file(&self) -> PathBuf {
        self.file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON structured logging
    Json,
}

/// CLI overrides for configuration values.
///
/// Used to apply command-line arguments over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override database path
    pub database: Option<PathBuf>,

    /// Override worker count
    pub jobs: Option<usize>,

    /// Override graph file extension
    pub extension: Option<String>,

    /// Override log level
    pub log_level: Option<String>,

    /// Override log file
    pub log_file: Option<PathBuf>,
}

impl KflowConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref database) = overrides.database {
            self.storage.database = database.clone();
        }

        if let Some(jobs) = overrides.jobs {
            self.scan.jobs = jobs;
        }

        if let Some(ref extension) = overrides.extension {
            self.scan.extension = extension.clone();
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }

        if let Some(ref file) = overrides.log_file {
            self.logging.file = Some(file.clone());
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan.extension.trim_start_matches('.').is_empty() {
            return Err(ConfigError::invalid_value(
                "scan.extension",
                "must not be empty",
            ));
        }

        if self.storage.busy_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "storage.busy_timeout_secs",
                "must be greater than zero",
            ));
        }

        if self.storage.database.as_os_str().is_empty() {
            return Err(ConfigError::invalid_value(
                "storage.database",
                "must not be empty",
            ));
        }

        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!(
                    "unknown level '{}'. Valid values: {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Busy timeout as a `Duration`.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.storage.busy_timeout_secs)
    }

    /// Database path resolved against `base` when relative.
    pub fn database_path(&self, base: &Path) -> PathBuf {
        if self.storage.database.is_absolute() {
            self.storage.database.clone()
        } else {
            base.join(&self.storage.database)
        }
    }
}
