//! End-to-end ingestion tests for kflow-core.
//!
//! These tests build a small tree of `.ci` files on disk, run the full
//! discover → parse → store pipeline with several workers, and check the
//! resulting SQLite tables.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package kflow-core --test ingest
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use kflow_core::{
    parse_file, FileDiscovery, GraphStore, IngestionPipeline, KflowTable, PipelineConfig,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

/// Write a call chain `f0 -> f1 -> ... -> f{n-1}` plus one external callee.
fn write_chain(path: &Path, title: &str, n: usize) {
    let mut text = format!("graph: {{ title: \"{}\"\n", title);
    for i in 0..n {
        text.push_str(&format!(
            "node: {{ title: \"f{i}\" label: \"f{i}\\n{title}:{i}:1\" }}\n"
        ));
        if i > 0 {
            text.push_str(&format!(
                "edge: {{ sourcename: \"f{}\" targetname: \"f{i}\" label: \"{title}:{i}:2\" }}\n",
                i - 1
            ));
        }
    }
    text.push_str(
        "node: { title: \"puts\" label: \"__builtin_puts\\n<built-in>\" shape : ellipse }\n",
    );
    text.push_str("edge: { sourcename: \"f0\" targetname: \"puts\" }\n");
    text.push_str("}\n");

    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

/// Create `count` graphs spread over nested directories, with varying sizes.
fn build_tree(root: &Path, count: usize) -> HashMap<PathBuf, (usize, usize)> {
    let mut expected = HashMap::new();
    for i in 0..count {
        let n = 1 + (i % 7);
        let rel = format!("dir{}/sub{}/unit{}.c.ci", i % 3, i % 2, i);
        let path = root.join(rel);
        write_chain(&path, &format!("unit{}.c", i), n);
        // n chain nodes + puts, (n - 1) chain edges + the puts edge
        expected.insert(path.canonicalize().unwrap(), (n + 1, n));
    }
    expected
}

fn scan(root: &Path, db: &Path, jobs: usize) -> kflow_core::IngestSummary {
    let pipeline = IngestionPipeline::new(GraphStore::new(db), PipelineConfig { jobs });
    pipeline
        .scan(root, &FileDiscovery::default(), |_| {})
        .expect("scan failed")
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_concurrent_ingest_row_counts() {
    for jobs in [1, 2, 8] {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("work");
        let expected = build_tree(&root, 40);
        let db = temp.path().join("kflow.db");

        let summary = scan(&root, &db, jobs);
        assert_eq!(summary.total, 40);
        assert_eq!(summary.succeeded, 40, "jobs = {jobs}");
        assert_eq!(summary.failed, 0);

        let conn = GraphStore::new(&db).open_existing().unwrap();
        assert_eq!(conn.graph_count().unwrap(), 40);

        for (path, (nodes, edges)) in &expected {
            let stats = conn.counts_for_path(&path.to_string_lossy()).unwrap();
            assert_eq!((stats.nodes, stats.edges), (*nodes, *edges), "{:?}", path);
        }

        let total_nodes: usize = expected.values().map(|(n, _)| n).sum();
        let total_edges: usize = expected.values().map(|(_, e)| e).sum();
        assert_eq!(conn.node_count().unwrap(), total_nodes);
        assert_eq!(conn.edge_count().unwrap(), total_edges);
        assert_eq!(summary.nodes, total_nodes);
        assert_eq!(summary.edges, total_edges);
    }
}

#[test]
fn test_node_rows_follow_source_order() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("work");
    let file = root.join("only.c.ci");
    write_chain(&file, "only.c", 4);

    scan(&root, &temp.path().join("kflow.db"), 4);

    let conn = GraphStore::new(temp.path().join("kflow.db"))
        .open_existing()
        .unwrap();
    let rows = conn.rows(KflowTable::Node, None).unwrap();
    let titles: Vec<&str> = rows.rows.iter().map(|r| r[1].as_str()).collect();
    assert_eq!(titles, vec!["f0", "f1", "f2", "f3", "puts"]);

    let parsed = parse_file(&file.canonicalize().unwrap()).unwrap();
    let shapes: Vec<&str> = rows.rows.iter().map(|r| r[3].as_str()).collect();
    let parsed_shapes: Vec<&str> = parsed.nodes.iter().map(|n| n.shape.as_str()).collect();
    assert_eq!(shapes, parsed_shapes);
}

#[test]
fn test_bad_files_are_isolated() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("work");
    build_tree(&root, 5);

    std::fs::write(root.join("empty.ci"), "").unwrap();
    std::fs::write(root.join("headerless.ci"), "}\n").unwrap();
    std::fs::write(
        root.join("early_node.ci"),
        "node: { title: \"a\" label: \"a\" }\ngraph: { title: \"late\"\n",
    )
    .unwrap();
    // Valid header, then a broken line: nothing from this file may be stored
    std::fs::write(
        root.join("half.ci"),
        "graph: { title: \"half\"\nnode: { title: \"a\" label: \"a\" }\nnode: { title: \"b\" }\n",
    )
    .unwrap();

    let progress = Mutex::new(Vec::new());
    let pipeline = IngestionPipeline::new(
        GraphStore::new(temp.path().join("kflow.db")),
        PipelineConfig { jobs: 3 },
    );
    let summary = pipeline
        .scan(&root, &FileDiscovery::default(), |outcome| {
            progress.lock().unwrap().push(outcome.index);
        })
        .unwrap();

    assert_eq!(summary.total, 9);
    assert_eq!(summary.succeeded, 5);
    assert_eq!(summary.failed, 4);
    assert_eq!(summary.failures.len(), 4);

    let mut indices = progress.into_inner().unwrap();
    indices.sort_unstable();
    assert_eq!(indices, (1..=9).collect::<Vec<_>>());

    let conn = GraphStore::new(temp.path().join("kflow.db"))
        .open_existing()
        .unwrap();
    assert_eq!(conn.graph_count().unwrap(), 5);
    assert!(!conn.graph_titles().unwrap().contains(&"half".to_string()));
    assert!(!conn.graph_titles().unwrap().contains(&"late".to_string()));
}

#[test]
fn test_non_matching_files_ignored() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("work");
    write_chain(&root.join("a/x.ci"), "x", 2);
    write_chain(&root.join("a/b/y.ci"), "y", 2);
    std::fs::write(root.join("c.txt"), "graph: { title: \"txt\"\n").unwrap();

    let summary = scan(&root, &temp.path().join("kflow.db"), 2);
    assert_eq!(summary.total, 2);

    let conn = GraphStore::new(temp.path().join("kflow.db"))
        .open_existing()
        .unwrap();
    let mut titles = conn.graph_titles().unwrap();
    titles.sort();
    assert_eq!(titles, vec!["x", "y"]);
}
