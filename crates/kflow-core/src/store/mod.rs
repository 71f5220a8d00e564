//! SQLite Graph Store
//!
//! A single database file shared by every ingestion worker:
//! - `GraphStore` describes the file and creates/resets the schema
//! - `StoreConnection` is one handle per worker, doing per-file transactional
//!   inserts and the read-only reporting queries
//!
//! Write contention between workers is left to SQLite: connections run in WAL
//! mode with a busy timeout, so a writer waits for the lock instead of failing.

mod connection;
pub mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::ErrorCode;
use thiserror::Error;
use tracing::info;

pub use connection::{InsertStats, StoreConnection, TableRows};
pub use schema::KflowTable;

/// How long a connection waits on a locked database before giving up.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database file not found: {0}")]
    NotFound(PathBuf),

    #[error("Unknown table: {0}")]
    UnknownTable(String),
}

impl StoreError {
    /// True when the database stayed locked past the busy timeout.
    pub fn is_busy(&self) -> bool {
        match self {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => {
                matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Location and connection settings of the shared database file.
#[derive(Debug, Clone)]
pub struct GraphStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl GraphStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Open a new connection, creating the database file if needed.
    pub fn connect(&self) -> Result<StoreConnection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        StoreConnection::open(&self.path, self.busy_timeout)
    }

    /// Open a connection to a database that must already exist.
    pub fn open_existing(&self) -> Result<StoreConnection> {
        if !self.exists() {
            return Err(StoreError::NotFound(self.path.clone()));
        }
        StoreConnection::open(&self.path, self.busy_timeout)
    }

    /// Drop and recreate all tables.
    ///
    /// Every scan starts from an empty schema; there is no incremental merge.
    pub fn reset_schema(&self) -> Result<()> {
        info!("Resetting schema in {:?}", self.path);
        self.connect()?.reset_schema()
    }
}
