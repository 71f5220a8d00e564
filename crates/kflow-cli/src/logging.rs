//! Tracing subscriber setup for the kflow binary.
//!
//! Two outputs share one registry:
//! - the log file, always written, at the configured level (`KFLOW_LOG` wins)
//! - stderr, errors only with `--quiet`, warnings by default, and the full
//!   log level with `--verbose` / `--debug`

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use kflow_config::{LogFormat, LoggingConfig};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::GlobalOptions;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber. Call once, before any command runs.
pub fn init(config: &LoggingConfig, global: &GlobalOptions) -> Result<()> {
    let path = config.log_file();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let level = config.level.to_lowercase();
    let file_filter =
        EnvFilter::try_from_env("KFLOW_LOG").unwrap_or_else(|_| EnvFilter::new(&level));

    let file_layer: BoxedLayer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(Mutex::new(file))
            .with_filter(file_filter)
            .boxed(),
        LogFormat::Text => fmt::layer()
            .with_ansi(false)
            .with_thread_names(true)
            .with_writer(Mutex::new(file))
            .with_filter(file_filter)
            .boxed(),
    };

    let stderr_layer: BoxedLayer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_level(&level, global))
        .boxed();

    tracing_subscriber::registry()
        .with(vec![file_layer, stderr_layer])
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Level echoed to the terminal.
fn stderr_level(level: &str, global: &GlobalOptions) -> LevelFilter {
    if global.quiet {
        LevelFilter::ERROR
    } else if global.verbose || global.debug {
        level.parse().unwrap_or(LevelFilter::INFO)
    } else {
        LevelFilter::WARN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn options(verbose: bool, debug: bool, quiet: bool) -> GlobalOptions {
        GlobalOptions {
            workdir: PathBuf::from("."),
            output: None,
            job: None,
            log: None,
            config: None,
            verbose,
            debug,
            quiet,
        }
    }

    #[test]
    fn test_stderr_level_defaults_to_warn() {
        assert_eq!(stderr_level("info", &options(false, false, false)), LevelFilter::WARN);
    }

    #[test]
    fn test_stderr_level_follows_config_when_verbose() {
        assert_eq!(stderr_level("info", &options(true, false, false)), LevelFilter::INFO);
        assert_eq!(stderr_level("debug", &options(false, true, false)), LevelFilter::DEBUG);
    }

    #[test]
    fn test_quiet_wins() {
        assert_eq!(stderr_level("debug", &options(true, true, true)), LevelFilter::ERROR);
    }
}
