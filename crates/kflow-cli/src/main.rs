//! kflow CLI - VCG call-graph ingestion
//!
//! Scans a directory tree for `.ci` call-graph dumps (as produced by
//! `gcc -fcallgraph-info`), loads every graph into a SQLite database and
//! offers a few read-only views over the result.
//!
//! # Usage
//!
//! ```bash
//! # Ingest every .ci file below the kernel tree
//! kflow scan -w ~/linux -j 8
//!
//! # Row counts per table
//! kflow stat
//!
//! # First 10 node rows
//! kflow query -t KFLOW_NODE -n 10
//!
//! # Write KFLOW_*.csv into the current directory
//! kflow export
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

mod commands;
mod logging;
mod progress;

/// kflow - Load VCG call graphs into SQLite
#[derive(Parser, Debug)]
#[command(name = "kflow")]
#[command(author, version, about, long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Print version
    #[arg(long, short = 'v', action = clap::ArgAction::Version)]
    version: Option<bool>,

    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Directory to scan for graph files
    #[arg(long, short = 'w', global = true, default_value = ".")]
    workdir: PathBuf,

    /// SQLite database path [default: kflow.db]
    #[arg(long, short = 'o', global = true, env = "KFLOW_DATABASE")]
    output: Option<PathBuf>,

    /// Worker count [default: number of processors]
    #[arg(long, short = 'j', global = true)]
    job: Option<usize>,

    /// Log file path [default: kflow.log]
    #[arg(long, short = 'l', global = true)]
    log: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, short = 'c', global = true, env = "KFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Echo log lines to the terminal
    #[arg(long, short = 'V', global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long, short = 'd', global = true)]
    debug: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

impl GlobalOptions {
    /// Convert global options to config overrides
    pub fn to_config_overrides(&self) -> kflow_config::ConfigOverrides {
        kflow_config::ConfigOverrides {
            database: self.output.clone(),
            jobs: self.job,
            log_file: self.log.clone(),
            log_level: self.debug.then(|| "debug".to_string()),
            ..Default::default()
        }
    }

    /// Whether progress bars should be drawn.
    ///
    /// Log lines echoed to the terminal would tear the bar apart.
    pub fn show_progress(&self) -> bool {
        !(self.quiet || self.verbose || self.debug)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rebuild the database from every graph file under the work directory
    Scan(commands::scan::ScanArgs),

    /// Show row counts of the kflow tables
    Stat(commands::stat::StatArgs),

    /// Print the first rows of a table
    Query(commands::query::QueryArgs),

    /// Export tables to CSV files
    Export(commands::export::ExportArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = commands::load_config(&cli.global)?;
    logging::init(&config.logging, &cli.global)?;

    match cli.command {
        Commands::Scan(args) => commands::scan::execute(args, &config, &cli.global),
        Commands::Stat(args) => commands::stat::execute(args, &config, &cli.global),
        Commands::Query(args) => commands::query::execute(args, &config, &cli.global),
        Commands::Export(args) => commands::export::execute(args, &config, &cli.global),
    }
}
