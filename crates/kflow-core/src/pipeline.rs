//! Ingestion Pipeline
//!
//! Parses graph files in parallel and writes each one into the shared store.
//!
//! ## Usage
//!
//! ```ignore
//! use kflow_core::{FileDiscovery, GraphStore, IngestionPipeline, PipelineConfig};
//!
//! let store = GraphStore::new("kflow.db");
//! let pipeline = IngestionPipeline::new(store, PipelineConfig { jobs: 8 });
//! let summary = pipeline.scan(Path::new("."), &FileDiscovery::default(), |_| {})?;
//! println!("{} ingested, {} failed", summary.succeeded, summary.failed);
//! ```
//!
//! Each file is an independent unit of work: it is parsed, then committed in
//! one transaction on the worker's own connection. A failure is logged with
//! its path and counted, and the batch carries on.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};

use crate::discovery::{DiscoveryError, FileDiscovery};
use crate::parser::{GraphParser, ParseError};
use crate::store::{GraphStore, InsertStats, StoreConnection, StoreError};

// ============================================================================
// Errors
// ============================================================================

/// Errors that stop a whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Store setup failed: {0}")]
    Store(#[from] StoreError),
}

/// Errors that fail a single file.
#[derive(Debug, Error)]
pub enum FileError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// Configuration & Cancellation
// ============================================================================

/// Configuration for a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Worker thread count (0 = one per available processor)
    pub jobs: usize,
}

/// Shared stop signal for a running pipeline.
///
/// Files already being processed finish; files not yet started are skipped.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// What happened to one file.
#[derive(Debug)]
pub enum FileStatus {
    Ingested(InsertStats),
    Failed(FileError),
    Skipped,
}

/// Result of processing one work item.
#[derive(Debug)]
pub struct FileOutcome {
    /// 1-based position in the discovered file list
    pub index: usize,
    pub total: usize,
    pub path: PathBuf,
    pub status: FileStatus,
}

/// A file that could not be ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Totals for a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub nodes: usize,
    pub edges: usize,
    pub failures: Vec<FileFailure>,
    pub elapsed: Duration,
}

impl IngestSummary {
    /// Files that were attempted (succeeded or failed).
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_complete(&self) -> bool {
        self.skipped == 0
    }

    fn record(&mut self, outcome: FileOutcome) {
        match outcome.status {
            FileStatus::Ingested(stats) => {
                self.succeeded += 1;
                self.nodes += stats.nodes;
                self.edges += stats.edges;
            }
            FileStatus::Failed(err) => {
                self.failed += 1;
                self.failures.push(FileFailure {
                    path: outcome.path,
                    error: err.to_string(),
                });
            }
            FileStatus::Skipped => self.skipped += 1,
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Parallel scan → parse → persist driver.
pub struct IngestionPipeline {
    store: GraphStore,
    config: PipelineConfig,
    parser: GraphParser,
    cancel: CancellationToken,
}

impl IngestionPipeline {
    pub fn new(store: GraphStore, config: PipelineConfig) -> Self {
        Self {
            store,
            config,
            parser: GraphParser::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Reset the schema, discover files under `root` and ingest them.
    ///
    /// Discovery and schema errors are fatal; per-file errors are not.
    pub fn scan<F>(
        &self,
        root: &Path,
        discovery: &FileDiscovery,
        on_progress: F,
    ) -> Result<IngestSummary, PipelineError>
    where
        F: Fn(&FileOutcome) + Sync,
    {
        let files = discovery.discover(root)?;
        self.store.reset_schema()?;
        self.run(&files, on_progress)
    }

    /// Ingest `files` into the store, calling `on_progress` as each completes.
    ///
    /// Completion order is not index order. The call returns once every file
    /// has been ingested, failed, or skipped after cancellation.
    pub fn run<F>(&self, files: &[PathBuf], on_progress: F) -> Result<IngestSummary, PipelineError>
    where
        F: Fn(&FileOutcome) + Sync,
    {
        let start = Instant::now();
        let total = files.len();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.jobs)
            .thread_name(|i| format!("kflow-worker-{}", i))
            .build()?;

        // Worker threads don't inherit the caller's span; hand it over explicitly
        let span = info_span!("ingest", db = %self.store.path().display(), total);
        info!(
            parent: &span,
            "Ingesting {} file(s) with {} worker(s)",
            total,
            pool.current_num_threads()
        );

        let outcomes: Vec<FileOutcome> = pool.install(|| {
            files
                .par_iter()
                .enumerate()
                // One lazily opened connection per rayon work split
                .map_init(
                    || None::<StoreConnection>,
                    |slot, (i, path)| {
                        let _entered = span.enter();
                        let outcome = self.process(slot, i + 1, total, path);
                        if !matches!(outcome.status, FileStatus::Skipped) {
                            on_progress(&outcome);
                        }
                        outcome
                    },
                )
                .collect()
        });

        let mut summary = IngestSummary {
            total,
            ..Default::default()
        };
        for outcome in outcomes {
            summary.record(outcome);
        }
        summary.elapsed = start.elapsed();

        let _entered = span.enter();
        info!(
            "Ingest finished in {:.2}s: {} processed, {} succeeded, {} failed",
            summary.elapsed.as_secs_f64(),
            summary.processed(),
            summary.succeeded,
            summary.failed
        );
        if summary.skipped > 0 {
            warn!("Cancelled: {} file(s) not started", summary.skipped);
        }

        Ok(summary)
    }

    fn process(
        &self,
        slot: &mut Option<StoreConnection>,
        index: usize,
        total: usize,
        path: &Path,
    ) -> FileOutcome {
        let status = if self.cancel.is_cancelled() {
            debug!("[{}/{}] skipped {}", index, total, path.display());
            FileStatus::Skipped
        } else {
            match self.ingest_file(slot, path) {
                Ok(stats) => FileStatus::Ingested(stats),
                Err(e) => {
                    error!("Failed to ingest {}: {}", path.display(), e);
                    if matches!(&e, FileError::Store(s) if s.is_busy()) {
                        warn!(
                            "Database stayed locked for more than {:?}, try fewer workers",
                            self.store.busy_timeout()
                        );
                    }
                    FileStatus::Failed(e)
                }
            }
        };

        if !matches!(status, FileStatus::Skipped) {
            info!("[{}/{}] {}", index, total, path.display());
        }

        FileOutcome {
            index,
            total,
            path: path.to_path_buf(),
            status,
        }
    }

    fn ingest_file(
        &self,
        slot: &mut Option<StoreConnection>,
        path: &Path,
    ) -> Result<InsertStats, FileError> {
        let graph = self.parser.parse_file(path)?;
        debug!("Parsed graph '{}' from {}", graph.title, path.display());

        let mut conn = match slot.take() {
            Some(conn) => conn,
            None => self.store.connect()?,
        };
        let result = conn.insert_graph(&graph);
        *slot = Some(conn);
        Ok(result?)
    }
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("store", &self.store)
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
