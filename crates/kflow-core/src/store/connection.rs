//! Store connection: per-file inserts and reporting reads.

use std::path::Path;
use std::time::Duration;

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, Result as SqliteResult, TransactionBehavior};
use tracing::debug;

use super::schema::{
    KflowTable, INSERT_EDGE, INSERT_GRAPH, INSERT_NODE, SCHEMA_CREATE_EDGE, SCHEMA_CREATE_GRAPH,
    SCHEMA_CREATE_INDEXES, SCHEMA_CREATE_NODE, SCHEMA_DROP,
};
use super::Result;
use crate::graph::Graph;

/// Rows written for one graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertStats {
    pub nodes: usize,
    pub edges: usize,
}

/// Column names and text-rendered values of a table dump
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A connection to the graph database
pub struct StoreConnection {
    conn: Connection,
}

impl StoreConnection {
    /// Open the database at `path` with the writer-friendly settings.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::configure_connection(&conn, busy_timeout)?;
        Ok(Self { conn })
    }

    /// Create an in-memory database with the schema in place (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.create_schema()?;
        Ok(store)
    }

    fn configure_connection(conn: &Connection, busy_timeout: Duration) -> SqliteResult<()> {
        // Must be set before anything that takes a lock
        conn.busy_timeout(busy_timeout)?;
        // WAL lets readers proceed while one worker holds the write lock
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        Ok(())
    }

    // =========================================================================
    // Schema
    // =========================================================================

    fn create_schema(&self) -> Result<()> {
        self.conn.execute(SCHEMA_CREATE_GRAPH, [])?;
        self.conn.execute(SCHEMA_CREATE_NODE, [])?;
        self.conn.execute(SCHEMA_CREATE_EDGE, [])?;
        self.conn.execute_batch(SCHEMA_CREATE_INDEXES)?;
        Ok(())
    }

    /// Drop and recreate all tables.
    pub fn reset_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA_DROP)?;
        self.create_schema()
    }

    // =========================================================================
    // Inserts
    // =========================================================================

    /// Insert one graph with all its nodes and edges in a single transaction.
    ///
    /// Rows are written in source order. On any error nothing from this graph
    /// is left in the database.
    pub fn insert_graph(&mut self, graph: &Graph) -> Result<InsertStats> {
        let path = graph.source_path_str();

        // IMMEDIATE takes the write lock up front, so lock waits go through
        // the busy handler instead of failing on upgrade.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(INSERT_GRAPH, params![graph.title, path])?;

        {
            let mut stmt = tx.prepare_cached(INSERT_NODE)?;
            for node in &graph.nodes {
                stmt.execute(params![node.title, node.label, node.shape, graph.title, path])?;
            }
        }

        {
            let mut stmt = tx.prepare_cached(INSERT_EDGE)?;
            for edge in &graph.edges {
                stmt.execute(params![
                    edge.sourcename,
                    edge.targetname,
                    edge.label,
                    graph.title,
                    path
                ])?;
            }
        }

        tx.commit()?;

        debug!(
            "Stored graph '{}' ({} nodes, {} edges)",
            graph.title,
            graph.node_count(),
            graph.edge_count()
        );

        Ok(InsertStats {
            nodes: graph.node_count(),
            edges: graph.edge_count(),
        })
    }

    // =========================================================================
    // Reporting
    // =========================================================================

    /// Names of all kflow tables present in the database, sorted.
    pub fn tables(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'KFLOW%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<SqliteResult<Vec<String>>>()?;
        Ok(names)
    }

    /// Row count of a table
    pub fn count(&self, table: KflowTable) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.as_str());
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn graph_count(&self) -> Result<usize> {
        self.count(KflowTable::Graph)
    }

    pub fn node_count(&self) -> Result<usize> {
        self.count(KflowTable::Node)
    }

    pub fn edge_count(&self) -> Result<usize> {
        self.count(KflowTable::Edge)
    }

    /// Dump rows of a table in ID order, optionally limited.
    pub fn rows(&self, table: KflowTable, limit: Option<usize>) -> Result<TableRows> {
        let sql = match limit {
            Some(n) => format!("SELECT * FROM {} ORDER BY ID LIMIT {}", table.as_str(), n),
            None => format!("SELECT * FROM {} ORDER BY ID", table.as_str()),
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(render_value))
                    .collect::<SqliteResult<Vec<String>>>()
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(TableRows { columns, rows })
    }

    /// Titles of all stored graphs, in insertion order.
    pub fn graph_titles(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT GRAPH FROM KFLOW_GRAPH ORDER BY ID")?;
        let titles = stmt
            .query_map([], |row| row.get(0))?
            .collect::<SqliteResult<Vec<String>>>()?;
        Ok(titles)
    }

    /// Node and edge row counts stored for one source file.
    pub fn counts_for_path(&self, path: &str) -> Result<InsertStats> {
        let nodes: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM KFLOW_NODE WHERE PATH = ?1",
            [path],
            |row| row.get(0),
        )?;
        let edges: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM KFLOW_EDGE WHERE PATH = ?1",
            [path],
            |row| row.get(0),
        )?;
        Ok(InsertStats {
            nodes: nodes as usize,
            edges: edges as usize,
        })
    }
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}
