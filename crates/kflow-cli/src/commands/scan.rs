//! Scan command - rebuild the database from the work directory

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use kflow_config::{ConfigOverrides, KflowConfig};
use kflow_core::pipeline::FileStatus;
use kflow_core::{FileDiscovery, IngestSummary, IngestionPipeline, PipelineConfig};
use tracing::{info, warn};

use super::graph_store;
use crate::progress::{file_bar, finish_spinner, finish_spinner_warn, spinner};
use crate::GlobalOptions;

/// Arguments for the scan command
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Graph file extension to look for [default: ci]
    #[arg(long, short = 'e')]
    extension: Option<String>,
}

/// Execute the scan command
pub fn execute(args: ScanArgs, config: &KflowConfig, global: &GlobalOptions) -> Result<()> {
    let workdir = global
        .workdir
        .canonicalize()
        .with_context(|| format!("Work directory {} not found", global.workdir.display()))?;
    info!("WORKDIR {}", workdir.display());

    let mut config = config.clone();
    config.apply_overrides(&ConfigOverrides {
        extension: args.extension,
        ..Default::default()
    });
    config.validate()?;
    let discovery = FileDiscovery::new(&config.scan.extension);

    let pb = spinner(
        &format!("Discovering .{} files...", discovery.extension()),
        global.show_progress(),
    );
    let files = discovery
        .discover(&workdir)
        .context("Failed to discover graph files")?;
    if files.is_empty() {
        finish_spinner_warn(
            pb,
            &format!("No .{} files under {}", discovery.extension(), workdir.display()),
        );
    } else {
        finish_spinner(pb, &format!("Found {} graph file(s)", files.len()));
    }

    let store = graph_store(&config)?;
    store
        .reset_schema()
        .with_context(|| format!("Failed to reset schema in {}", store.path().display()))?;
    info!("Using {}", store.path().display());

    let pipeline = IngestionPipeline::new(
        store,
        PipelineConfig {
            jobs: config.scan.jobs,
        },
    );

    let bar = file_bar(files.len() as u64, global.show_progress());
    let summary = pipeline
        .run(&files, |outcome| {
            if let Some(ref bar) = bar {
                if let FileStatus::Failed(_) = outcome.status {
                    bar.println(format!("failed: {}", outcome.path.display()));
                }
                bar.set_message(outcome.path.display().to_string());
                bar.inc(1);
            }
        })
        .context("Failed to start ingestion")?;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    report(&summary, global.quiet);
    Ok(())
}

fn report(summary: &IngestSummary, quiet: bool) {
    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        skipped = summary.skipped,
        nodes = summary.nodes,
        edges = summary.edges,
        "Scan finished in {}",
        format_elapsed(summary.elapsed)
    );

    for failure in &summary.failures {
        warn!("{}: {}", failure.path.display(), failure.error);
    }

    if quiet {
        return;
    }

    println!(
        "Processed {} of {} file(s): {} succeeded, {} failed",
        summary.processed(),
        summary.total,
        summary.succeeded,
        summary.failed
    );
    if !summary.is_complete() {
        println!("Skipped {} file(s) after cancellation", summary.skipped);
    }
    println!(
        "Stored {} node(s) and {} edge(s) in {}",
        summary.nodes,
        summary.edges,
        format_elapsed(summary.elapsed)
    );

    if let Some(warning) = failure_warning(summary) {
        eprintln!("{}", warning);
    }
}

/// Shown after the summary lines whenever any file failed.
fn failure_warning(summary: &IngestSummary) -> Option<String> {
    (summary.failed > 0).then(|| {
        format!(
            "warning: {} file(s) could not be ingested, see the log",
            summary.failed
        )
    })
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}
