//! Graph Model
//!
//! In-memory representation of one parsed `.ci` file: a titled graph holding
//! its nodes and edges in the order they appear in the source text.
//!
//! Only the fixed fields are persisted. Any other attributes found on a
//! declaration line are kept in the `extra` map for in-process consumers.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Open-ended attribute bag for node/edge declarations.
pub type Attributes = BTreeMap<String, String>;

/// A graph parsed from a single `.ci` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    /// Graph title from the `graph:` header line (never empty)
    pub title: String,

    /// File the graph was parsed from (empty for in-memory input)
    pub source_path: PathBuf,

    /// Nodes in source order
    pub nodes: Vec<Node>,

    /// Edges in source order
    pub edges: Vec<Edge>,
}

impl Graph {
    /// Create an empty graph with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_path: PathBuf::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Set the originating file path.
    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = path.into();
        self
    }

    /// Append a node. Duplicate titles are kept as separate entries.
    pub fn add_node(&mut self, node: Node) {
        self.nodes.push(node);
    }

    /// Append an edge. Endpoints are not checked against the node set.
    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    /// Source path as it is written to the `PATH` column.
    pub fn source_path_str(&self) -> String {
        path_to_string(&self.source_path)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Find the first node with the given title.
    pub fn node(&self, title: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.title == title)
    }

    /// Iterate over edges leaving the given node title.
    pub fn outgoing<'a>(&'a self, title: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.sourcename == title)
    }

    /// Edges whose source or target does not name a node in this graph.
    ///
    /// These are legal in the format (external callees are often left out).
    pub fn dangling_edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges
            .iter()
            .filter(|e| self.node(&e.sourcename).is_none() || self.node(&e.targetname).is_none())
    }
}

/// A node declaration (`node: { title: ... label: ... }`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node key within the graph
    pub title: String,

    /// Display text with escape sequences decoded
    pub label: String,

    /// Shape name, empty when absent
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub shape: String,

    /// Any other attributes on the line
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Attributes,
}

impl Node {
    pub fn new(title: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            label: label.into(),
            shape: String::new(),
            extra: Attributes::new(),
        }
    }

    pub fn with_shape(mut self, shape: impl Into<String>) -> Self {
        self.shape = shape.into();
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// An edge declaration (`edge: { sourcename: ... targetname: ... }`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Title of the calling node
    pub sourcename: String,

    /// Title of the called node
    pub targetname: String,

    /// Edge label (call site), empty when absent
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,

    /// Any other attributes on the line
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Attributes,
}

impl Edge {
    pub fn new(sourcename: impl Into<String>, targetname: impl Into<String>) -> Self {
        Self {
            sourcename: sourcename.into(),
            targetname: targetname.into(),
            label: String::new(),
            extra: Attributes::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
