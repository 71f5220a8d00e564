//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.kflow/config.toml`
//! 2. Local config: `.kflow/config.toml` (in the work directory)
//! 3. CLI overrides
//!
//! Later sources override earlier ones.

use crate::error::ConfigError;
use crate::{ConfigOverrides, KflowConfig, LoggingConfig, ScanConfig, StorageConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Global configuration directory name.
const GLOBAL_CONFIG_DIR: &str = ".kflow";

/// Local configuration directory name.
const LOCAL_CONFIG_DIR: &str = ".kflow";

/// Configuration loader with inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.kflow`)
    global_config_dir: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.kflow`).
    pub fn new() -> Self {
        Self {
            global_config_dir: dirs::home_dir().map(|h| h.join(GLOBAL_CONFIG_DIR)),
        }
    }

    /// Create a loader with a custom global config directory.
    ///
    /// Useful for testing.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
        }
    }

    /// Create a loader that ignores the global config.
    pub fn without_global() -> Self {
        Self {
            global_config_dir: None,
        }
    }

    /// Get the global config file path.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Get the local config file path for a work directory.
    pub fn local_config_path(&self, workdir: &Path) -> PathBuf {
        workdir.join(LOCAL_CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration for a work directory with optional CLI overrides.
    ///
    /// Merges config in order: global → local → overrides, then validates.
    pub fn load(
        &self,
        workdir: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<KflowConfig, ConfigError> {
        let mut config = KflowConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        if let Some(local_config) = self.load_local(workdir)? {
            config = merge_configs(config, local_config);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load an explicit config file, skipping global and local discovery.
    pub fn load_file(
        &self,
        path: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<KflowConfig, ConfigError> {
        debug!("Loading config from {:?}", path);
        let mut config = merge_configs(KflowConfig::default(), load_config_file(path)?);

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&self) -> Result<Option<KflowConfig>, ConfigError> {
        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        load_config_file(&global_path).map(Some)
    }

    /// Load only the local configuration for a work directory.
    pub fn load_local(&self, workdir: &Path) -> Result<Option<KflowConfig>, ConfigError> {
        let local_path = self.local_config_path(workdir);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        load_config_file(&local_path).map(Some)
    }
}

/// Load a configuration file from disk.
fn load_config_file(path: &Path) -> Result<KflowConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

/// Merge two configurations, with `overlay` taking precedence.
///
/// A field in `overlay` only wins when it differs from the default, so a
/// partial file doesn't reset values set by an earlier source.
fn merge_configs(base: KflowConfig, overlay: KflowConfig) -> KflowConfig {
    KflowConfig {
        storage: merge_storage(base.storage, overlay.storage),
        scan: merge_scan(base.scan, overlay.scan),
        logging: merge_logging(base.logging, overlay.logging),
    }
}

fn pick<T: PartialEq>(base: T, overlay: T, default: T) -> T {
    if overlay != default {
        overlay
    } else {
        base
    }
}

/// Merge storage config, overlay values override base.
fn merge_storage(base: StorageConfig, overlay: StorageConfig) -> StorageConfig {
    let default = StorageConfig::default();
    StorageConfig {
        database: pick(base.database, overlay.database, default.database),
        busy_timeout_secs: pick(
            base.busy_timeout_secs,
            overlay.busy_timeout_secs,
            default.busy_timeout_secs,
        ),
    }
}

/// Merge scan config.
fn merge_scan(base: ScanConfig, overlay: ScanConfig) -> ScanConfig {
    let default = ScanConfig::default();
    ScanConfig {
        jobs: pick(base.jobs, overlay.jobs, default.jobs),
        extension: pick(base.extension, overlay.extension, default.extension),
    }
}

/// Merge logging config.
fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    let default = LoggingConfig::default();
    LoggingConfig {
        level: pick(base.level, overlay.level, default.level),
        format: pick(base.format, overlay.format, default.format),
        file: overlay.file.or(base.file),
    }
}
