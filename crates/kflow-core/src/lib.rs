//! kflow Core - VCG call-graph parsing and SQLite ingestion
//!
//! This crate provides the core functionality for loading call-graph dumps:
//! - Line-oriented parsing of `.ci` (VCG) graph descriptions
//! - Recursive discovery of graph files under a work directory
//! - SQLite schema and per-file transactional inserts
//! - A parallel scan → parse → persist pipeline with cancellation

pub mod discovery;
pub mod graph;
pub mod parser;
pub mod pipeline;
pub mod store;

// Re-exports for convenience
pub use graph::{Edge, Graph, Node};
pub use parser::{parse_file, parse_str, GraphParser, ParseError};

// Discovery re-exports
pub use discovery::{DiscoveryError, FileDiscovery, DEFAULT_EXTENSION};

// Store re-exports
pub use store::{
    GraphStore, InsertStats, KflowTable, StoreConnection, StoreError, TableRows,
    DEFAULT_BUSY_TIMEOUT,
};

// Pipeline re-exports
pub use pipeline::{
    CancellationToken, FileFailure, FileOutcome, IngestSummary, IngestionPipeline,
    PipelineConfig, PipelineError,
};
