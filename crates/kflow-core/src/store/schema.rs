//! SQLite Schema Definitions for the Graph Store
//!
//! Three flat tables, one row per graph, node and edge. `GRAPH` and `PATH`
//! are repeated on node/edge rows so they can be queried without joins.

use std::fmt;
use std::str::FromStr;

use super::StoreError;

/// SQL to drop all kflow tables
pub const SCHEMA_DROP: &str = r#"
DROP TABLE IF EXISTS KFLOW_GRAPH;
DROP TABLE IF EXISTS KFLOW_NODE;
DROP TABLE IF EXISTS KFLOW_EDGE;
"#;

/// SQL to create the graphs table
pub const SCHEMA_CREATE_GRAPH: &str = r#"
CREATE TABLE IF NOT EXISTS KFLOW_GRAPH (
    ID INTEGER PRIMARY KEY AUTOINCREMENT,
    GRAPH TEXT,
    PATH TEXT
)
"#;

/// SQL to create the nodes table
pub const SCHEMA_CREATE_NODE: &str = r#"
CREATE TABLE IF NOT EXISTS KFLOW_NODE (
    ID INTEGER PRIMARY KEY AUTOINCREMENT,
    TITLE TEXT,
    LABEL TEXT,
    SHAPE TEXT,
    GRAPH TEXT,
    PATH TEXT
)
"#;

/// SQL to create the edges table
pub const SCHEMA_CREATE_EDGE: &str = r#"
CREATE TABLE IF NOT EXISTS KFLOW_EDGE (
    ID INTEGER PRIMARY KEY AUTOINCREMENT,
    SOURCENAME TEXT,
    TARGETNAME TEXT,
    LABEL TEXT,
    GRAPH TEXT,
    PATH TEXT
)
"#;

/// SQL to create lookup indexes
pub const SCHEMA_CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS IDX_KFLOW_NODE_TITLE ON KFLOW_NODE(TITLE);
CREATE INDEX IF NOT EXISTS IDX_KFLOW_EDGE_SOURCE ON KFLOW_EDGE(SOURCENAME);
CREATE INDEX IF NOT EXISTS IDX_KFLOW_EDGE_TARGET ON KFLOW_EDGE(TARGETNAME);
"#;

pub const INSERT_GRAPH: &str = "INSERT INTO KFLOW_GRAPH (GRAPH, PATH) VALUES (?1, ?2)";

pub const INSERT_NODE: &str =
    "INSERT INTO KFLOW_NODE (TITLE, LABEL, SHAPE, GRAPH, PATH) VALUES (?1, ?2, ?3, ?4, ?5)";

pub const INSERT_EDGE: &str =
    "INSERT INTO KFLOW_EDGE (SOURCENAME, TARGETNAME, LABEL, GRAPH, PATH) VALUES (?1, ?2, ?3, ?4, ?5)";

/// The tables owned by the store.
///
/// Reporting queries interpolate table names into SQL, so only names that
/// resolve to one of these variants are ever used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KflowTable {
    Graph,
    Node,
    Edge,
}

impl KflowTable {
    pub const ALL: [KflowTable; 3] = [KflowTable::Graph, KflowTable::Node, KflowTable::Edge];

    /// Table name as it appears in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            KflowTable::Graph => "KFLOW_GRAPH",
            KflowTable::Node => "KFLOW_NODE",
            KflowTable::Edge => "KFLOW_EDGE",
        }
    }
}

impl fmt::Display for KflowTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KflowTable {
    type Err = StoreError;

    /// Accepts full table names (`KFLOW_NODE`) or short forms (`node`), any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let short = upper.strip_prefix("KFLOW_").unwrap_or(&upper);
        match short {
            "GRAPH" => Ok(KflowTable::Graph),
            "NODE" => Ok(KflowTable::Node),
            "EDGE" => Ok(KflowTable::Edge),
            _ => Err(StoreError::UnknownTable(s.to_string())),
        }
    }
}
