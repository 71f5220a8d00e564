//! VCG Line Parser
//!
//! Converts the text of a `.ci` call-graph dump into a [`Graph`].
//!
//! The format is line oriented. Only three declaration kinds carry data:
//!
//! ```text
//! graph: { title: "hello.c"
//! node: { title: "puts" label: "__builtin_puts\n<built-in>" shape : ellipse }
//! edge: { sourcename: "func1" targetname: "puts" label: "hello.c:5:2" }
//! }
//! ```
//!
//! Every other line (blank lines, closing braces, layout directives) is
//! skipped. Attribute values are strings: quoted values may contain escaped
//! quotes and backslashes, bare values run up to the next whitespace or brace.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::graph::{Attributes, Edge, Graph, Node};

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur while parsing a graph description.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A `node:` line appeared before any `graph:` header
    #[error("line {line}: node declared before graph header")]
    NodeBeforeHeader { line: usize },

    /// An `edge:` line appeared before any `graph:` header
    #[error("line {line}: edge declared before graph header")]
    EdgeBeforeHeader { line: usize },

    /// The input has no `graph:` header at all
    #[error("no graph header found")]
    MissingHeader,

    /// A required attribute is absent
    #[error("line {line}: {kind} is missing required field '{field}'")]
    MissingField {
        line: usize,
        kind: &'static str,
        field: &'static str,
    },

    /// Graph or node title is the empty string
    #[error("line {line}: empty title")]
    EmptyTitle { line: usize },

    /// A quoted value has no closing quote
    #[error("line {line}: unterminated string value")]
    UnterminatedString { line: usize },

    /// The file could not be read
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ParseError {
    /// True for errors caused by the structure of the input rather than I/O.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, ParseError::Io { .. })
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;

// ============================================================================
// Line Classification
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Graph,
    Node,
    Edge,
}

impl LineKind {
    fn as_str(&self) -> &'static str {
        match self {
            LineKind::Graph => "graph",
            LineKind::Node => "node",
            LineKind::Edge => "edge",
        }
    }
}

/// Split a line into its declaration kind and the attribute body.
///
/// Leading whitespace is ignored and whitespace is allowed between the
/// keyword and its colon.
fn classify(line: &str) -> Option<(LineKind, &str)> {
    let trimmed = line.trim_start();
    let word_end = trimmed
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(trimmed.len());
    let (word, rest) = trimmed.split_at(word_end);

    let kind = match word {
        "graph" => LineKind::Graph,
        "node" => LineKind::Node,
        "edge" => LineKind::Edge,
        _ => return None,
    };

    let body = rest.trim_start().strip_prefix(':')?;
    Some((kind, body))
}

// ============================================================================
// Attribute Scanner
// ============================================================================

fn is_key_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-')
}

fn ends_bare_value(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'{' | b'}' | b'"')
}

/// Scans `key: value` pairs out of a declaration body.
///
/// Stops at the first `}` outside a quoted value. Tokens that don't form a
/// `key: value` pair are skipped.
struct AttrScanner<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> AttrScanner<'a> {
    fn new(src: &'a str, line: usize) -> Self {
        Self { src, pos: 0, line }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn next_attr(&mut self) -> Result<Option<(&'a str, String)>> {
        let src = self.src;
        loop {
            self.skip_ws();
            let Some(b) = self.peek() else {
                return Ok(None);
            };

            match b {
                b'}' => return Ok(None),
                // A quoted token with no key in front of it: consume and drop it
                b'"' => {
                    self.quoted()?;
                    continue;
                }
                b if !is_key_byte(b) => {
                    self.pos += 1;
                    continue;
                }
                _ => {}
            }

            let start = self.pos;
            while self.peek().is_some_and(is_key_byte) {
                self.pos += 1;
            }
            let key = &src[start..self.pos];

            self.skip_ws();
            if self.peek() != Some(b':') {
                continue;
            }
            self.pos += 1;
            self.skip_ws();

            let value = match self.peek() {
                Some(b'"') => self.quoted()?,
                _ => self.bare(),
            };
            return Ok(Some((key, value)));
        }
    }

    /// Read a bare (unquoted) value.
    fn bare(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|b| !ends_bare_value(b)) {
            self.pos += 1;
        }
        self.src[start..self.pos].to_string()
    }

    /// Read a quoted value starting at the opening quote, decoding escapes.
    ///
    /// The value runs from its opening quote to the closing quote found by
    /// [`Self::closing_quote`]; inner unescaped quotes are kept as text.
    fn quoted(&mut self) -> Result<String> {
        let body_start = self.pos + 1;
        let close = self
            .closing_quote(body_start)
            .ok_or(ParseError::UnterminatedString { line: self.line })?;
        self.pos = close + 1;
        Ok(decode_escapes(&self.src[body_start..close]))
    }

    /// Byte offset of the quote that closes a value whose body starts at `from`.
    ///
    /// An unescaped `"` closes the value only when it is followed by the end
    /// of the line, a `}`, or the next `key:` pair. If no quote qualifies, the
    /// last unescaped quote closes it.
    fn closing_quote(&self, from: usize) -> Option<usize> {
        let bytes = self.src.as_bytes();
        let mut last = None;
        let mut i = from;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => {
                    i += 2;
                    continue;
                }
                b'"' => {
                    if self.ends_value(i + 1) {
                        return Some(i);
                    }
                    last = Some(i);
                }
                _ => {}
            }
            i += 1;
        }
        last
    }

    /// True when the text at `at` can follow a complete value.
    fn ends_value(&self, at: usize) -> bool {
        let rest = self.src[at..].trim_start();
        if rest.is_empty() || rest.starts_with('}') {
            return true;
        }
        let key_len = rest.bytes().take_while(|&b| is_key_byte(b)).count();
        key_len > 0 && rest[key_len..].trim_start().starts_with(':')
    }
}

/// Decode `\"`, `\\`, `\n`, `\t` and `\r`; other escapes keep both characters.
fn decode_escapes(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Attributes of one declaration line, in the order they were written.
struct Declaration<'a> {
    kind: LineKind,
    line: usize,
    attrs: Vec<(&'a str, String)>,
}

impl<'a> Declaration<'a> {
    fn scan(kind: LineKind, body: &'a str, line: usize) -> Result<Self> {
        let mut scanner = AttrScanner::new(body, line);
        let mut attrs = Vec::new();
        while let Some(attr) = scanner.next_attr()? {
            attrs.push(attr);
        }
        Ok(Self { kind, line, attrs })
    }

    /// Remove and return the first value for `key`.
    fn take(&mut self, key: &str) -> Option<String> {
        let idx = self.attrs.iter().position(|(k, _)| *k == key)?;
        Some(self.attrs.remove(idx).1)
    }

    fn require(&mut self, field: &'static str) -> Result<String> {
        self.take(field).ok_or(ParseError::MissingField {
            line: self.line,
            kind: self.kind.as_str(),
            field,
        })
    }

    fn require_title(&mut self) -> Result<String> {
        let title = self.require("title")?;
        if title.is_empty() {
            return Err(ParseError::EmptyTitle { line: self.line });
        }
        Ok(title)
    }

    /// Everything not yet taken, minus repeats of the declaration's fixed
    /// fields. On other repeated keys the last value wins.
    fn into_extra(self, fixed: &[&str]) -> Attributes {
        let line = self.line;
        self.attrs
            .into_iter()
            .filter(|(k, _)| {
                let repeated = fixed.contains(k);
                if repeated {
                    debug!("line {}: ignoring repeated '{}'", line, k);
                }
                !repeated
            })
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Parser for `.ci` graph descriptions.
///
/// Stateless: every call produces an independent [`Graph`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphParser;

impl GraphParser {
    pub fn new() -> Self {
        Self
    }

    /// Read and parse a file. The graph's `source_path` is set to `path`.
    pub fn parse_file(&self, path: &Path) -> Result<Graph> {
        let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let graph = self.parse_str(&text)?;
        Ok(graph.with_source_path(path))
    }

    /// Parse a complete graph description held in memory.
    pub fn parse_str(&self, text: &str) -> Result<Graph> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut graph: Option<Graph> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let Some((kind, body)) = classify(raw) else {
                continue;
            };
            let mut decl = Declaration::scan(kind, body, line)?;

            match kind {
                LineKind::Graph => {
                    if let Some(existing) = &graph {
                        debug!(
                            "line {}: ignoring extra graph header '{}' (already in '{}')",
                            line,
                            decl.take("title").unwrap_or_default(),
                            existing.title
                        );
                        continue;
                    }
                    graph = Some(Graph::new(decl.require_title()?));
                }
                LineKind::Node => {
                    let Some(graph) = graph.as_mut() else {
                        return Err(ParseError::NodeBeforeHeader { line });
                    };
                    graph.add_node(Self::build_node(decl)?);
                }
                LineKind::Edge => {
                    let Some(graph) = graph.as_mut() else {
                        return Err(ParseError::EdgeBeforeHeader { line });
                    };
                    graph.add_edge(Self::build_edge(decl)?);
                }
            }
        }

        graph.ok_or(ParseError::MissingHeader)
    }

    fn build_node(mut decl: Declaration<'_>) -> Result<Node> {
        let title = decl.require_title()?;
        let label = decl.require("label")?;
        let shape = decl.take("shape").unwrap_or_default();
        Ok(Node {
            title,
            label,
            shape,
            extra: decl.into_extra(&["title", "label", "shape"]),
        })
    }

    fn build_edge(mut decl: Declaration<'_>) -> Result<Edge> {
        let sourcename = decl.require("sourcename")?;
        let targetname = decl.require("targetname")?;
        let label = decl.take("label").unwrap_or_default();
        Ok(Edge {
            sourcename,
            targetname,
            label,
            extra: decl.into_extra(&["sourcename", "targetname", "label"]),
        })
    }
}

/// Parse a graph description held in memory.
pub fn parse_str(text: &str) -> Result<Graph> {
    GraphParser::new().parse_str(text)
}

/// Read and parse a `.ci` file.
pub fn parse_file(path: &Path) -> Result<Graph> {
    GraphParser::new().parse_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HELLO: &str = r#"graph: { title: "hello.c"
node: { title: "func1" label: "func1\nhello.c:3:6" }
node: { title: "puts" label: "__builtin_puts\n<built-in>" shape : ellipse }
edge: { sourcename: "func1" targetname: "puts" label: "hello.c:5:2" }
node: { title: "func2" label: "func2\nhello.c:7:6" }
edge: { sourcename: "func2" targetname: "func1" label: "hello.c:9:2" }
edge: { sourcename: "func2" targetname: "puts" label: "hello.c:10:2" }
}
"#;

    #[test]
    fn test_minimal_round_trip() {
        let text = r#"graph: { title: "g"
node: { title: "a" label: "A" shape: ellipse }
edge: { sourcename: "a" targetname: "b" label: "x.c:1:1" }
}"#;
        let graph = parse_str(text).unwrap();

        assert_eq!(graph.title, "g");
        assert_eq!(graph.nodes, vec![Node::new("a", "A").with_shape("ellipse")]);
        assert_eq!(graph.edges, vec![Edge::new("a", "b").with_label("x.c:1:1")]);
    }

    #[test]
    fn test_sample_preserves_source_order() {
        let graph = parse_str(HELLO).unwrap();

        let nodes: Vec<&str> = graph.nodes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(nodes, vec!["func1", "puts", "func2"]);

        let edges: Vec<(&str, &str)> = graph
            .edges
            .iter()
            .map(|e| (e.sourcename.as_str(), e.targetname.as_str()))
            .collect();
        assert_eq!(
            edges,
            vec![("func1", "puts"), ("func2", "func1"), ("func2", "puts")]
        );
    }

    #[test]
    fn test_spaced_shape_and_newline_escape() {
        let graph = parse_str(HELLO).unwrap();
        let puts = graph.node("puts").unwrap();
        assert_eq!(puts.shape, "ellipse");
        assert_eq!(puts.label, "__builtin_puts\n<built-in>");
        assert!(puts.extra.is_empty());
        assert_eq!(graph.node("func1").unwrap().shape, "");
    }

    #[test]
    fn test_escaped_quote_in_label() {
        let text = r#"graph: { title: "g"
node: { title: "n" label: "he said \"hi\"" }
"#;
        let graph = parse_str(text).unwrap();
        assert_eq!(graph.nodes[0].label, r#"he said "hi""#);
    }

    #[test]
    fn test_escaped_backslash_before_closing_quote() {
        let text = r#"graph: { title: "g"
edge: { sourcename: "a" targetname: "b" label: "C:\\dir\\" color: "red" }
"#;
        let graph = parse_str(text).unwrap();
        let edge = &graph.edges[0];
        assert_eq!(edge.label, r"C:\dir\");
        assert_eq!(edge.extra.get("color").map(String::as_str), Some("red"));
    }

    #[test]
    fn test_unknown_escape_kept_verbatim() {
        let text = "graph: { title: \"g\"\nnode: { title: \"n\" label: \"a\\qb\" }\n";
        let graph = parse_str(text).unwrap();
        assert_eq!(graph.nodes[0].label, "a\\qb");
    }

    #[test]
    fn test_unescaped_inner_quote_kept_in_value() {
        let text = "graph: { title: \"g\"\nnode: { title: \"op\" label: \"operator\"\" _km\\na.cc:3:1\" }\n";
        let graph = parse_str(text).unwrap();
        let node = &graph.nodes[0];
        assert_eq!(node.label, "operator\" _km\na.cc:3:1");
        assert!(node.extra.is_empty());
    }

    #[test]
    fn test_inner_quote_closes_at_next_key() {
        let text = r#"graph: { title: "g"
node: { title: "n" label: "say "x" now" shape: box color: "a"b" }
"#;
        let graph = parse_str(text).unwrap();
        let node = &graph.nodes[0];
        assert_eq!(node.label, r#"say "x" now"#);
        assert_eq!(node.shape, "box");
        assert_eq!(node.extra["color"], r#"a"b"#);
    }

    #[test]
    fn test_repeated_fixed_fields_not_in_extra() {
        let text = r#"graph: { title: "g"
node: { title: "n" label: "first" label: "second" shape: box shape: ellipse }
edge: { sourcename: "a" targetname: "b" sourcename: "c" color: "red" }
"#;
        let graph = parse_str(text).unwrap();

        let node = &graph.nodes[0];
        assert_eq!(node.label, "first");
        assert_eq!(node.shape, "box");
        assert!(node.extra.is_empty());

        let edge = &graph.edges[0];
        assert_eq!(edge.sourcename, "a");
        assert_eq!(edge.extra.len(), 1);
        assert_eq!(edge.extra["color"], "red");
    }

    #[test]
    fn test_extra_attributes_stay_strings() {
        let text = r#"graph: { title: "g"
node: { title: "n" label: "L" weight: 3 visible: true color: "light blue" }
edge: { sourcename: "n" targetname: "m" priority: "10" class: 2 }
"#;
        let graph = parse_str(text).unwrap();

        let node = &graph.nodes[0];
        assert_eq!(node.extra.len(), 3);
        assert_eq!(node.extra["weight"], "3");
        assert_eq!(node.extra["visible"], "true");
        assert_eq!(node.extra["color"], "light blue");

        let edge = &graph.edges[0];
        assert_eq!(edge.label, "");
        assert_eq!(edge.extra["priority"], "10");
        assert_eq!(edge.extra["class"], "2");
    }

    #[test]
    fn test_node_before_header_fails() {
        let text = r#"node: { title: "a" label: "A" }
graph: { title: "g"
"#;
        let err = parse_str(text).unwrap_err();
        assert!(matches!(err, ParseError::NodeBeforeHeader { line: 1 }));
        assert!(err.is_malformed());
    }

    #[test]
    fn test_edge_before_header_fails() {
        let text = "\n\nedge: { sourcename: \"a\" targetname: \"b\" }\n";
        let err = parse_str(text).unwrap_err();
        assert!(matches!(err, ParseError::EdgeBeforeHeader { line: 3 }));
    }

    #[test]
    fn test_empty_and_headerless_inputs() {
        assert!(matches!(parse_str(""), Err(ParseError::MissingHeader)));
        assert!(matches!(
            parse_str("}\n// nothing here\n"),
            Err(ParseError::MissingHeader)
        ));
    }

    #[test]
    fn test_missing_required_fields() {
        let text = "graph: { title: \"g\"\nnode: { title: \"n\" }\n";
        match parse_str(text).unwrap_err() {
            ParseError::MissingField { line, kind, field } => {
                assert_eq!((line, kind, field), (2, "node", "label"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let text = "graph: { title: \"g\"\nedge: { sourcename: \"a\" }\n";
        assert!(matches!(
            parse_str(text),
            Err(ParseError::MissingField {
                field: "targetname",
                ..
            })
        ));

        assert!(matches!(
            parse_str("graph: { }\n"),
            Err(ParseError::MissingField { field: "title", .. })
        ));
    }

    #[test]
    fn test_empty_titles_rejected() {
        assert!(matches!(
            parse_str("graph: { title: \"\"\n"),
            Err(ParseError::EmptyTitle { line: 1 })
        ));
        let text = "graph: { title: \"g\"\nnode: { title: \"\" label: \"x\" }\n";
        assert!(matches!(
            parse_str(text),
            Err(ParseError::EmptyTitle { line: 2 })
        ));
    }

    #[test]
    fn test_unterminated_string() {
        let text = "graph: { title: \"g\"\nnode: { title: \"n\" label: \"open }\n";
        assert!(matches!(
            parse_str(text),
            Err(ParseError::UnterminatedString { line: 2 })
        ));
    }

    #[test]
    fn test_indentation_and_noise_lines_are_tolerated() {
        let text = r#"
// generated by gcc -fcallgraph-info
graph: { title: "main.c" layoutalgorithm: dfs
    node: { title: "main" label: "main" } trailing garbage here
    nodes_are_not_declarations: 1
    edge : { sourcename: "main" targetname: "exit" } "stray"
}
"#;
        let graph = parse_str(text).unwrap();
        assert_eq!(graph.title, "main.c");
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.nodes[0].extra.is_empty());
    }

    #[test]
    fn test_second_header_is_ignored() {
        let text = r#"graph: { title: "first"
node: { title: "a" label: "A" }
graph: { title: "second"
node: { title: "b" label: "B" }
"#;
        let graph = parse_str(text).unwrap();
        assert_eq!(graph.title, "first");
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_duplicate_node_titles_do_not_fail() {
        let text = r#"graph: { title: "g"
node: { title: "f" label: "one" }
node: { title: "f" label: "two" }
"#;
        let graph = parse_str(text).unwrap();
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_unicode_values() {
        let text = "graph: { title: \"图\"\nnode: { title: \"函数\" label: \"é\\\"ü\" }\n";
        let graph = parse_str(text).unwrap();
        assert_eq!(graph.title, "图");
        assert_eq!(graph.nodes[0].title, "函数");
        assert_eq!(graph.nodes[0].label, "é\"ü");
    }

    #[test]
    fn test_crlf_line_endings() {
        let text = "graph: { title: \"g\"\r\nnode: { title: \"a\" label: \"A\" }\r\n}\r\n";
        let graph = parse_str(text).unwrap();
        assert_eq!(graph.nodes[0].label, "A");
    }

    #[test]
    fn test_parse_file_sets_source_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.c.ci");
        std::fs::write(&path, HELLO).unwrap();

        let graph = parse_file(&path).unwrap();
        assert_eq!(graph.source_path, path);
        assert_eq!(graph.title, "hello.c");
    }

    #[test]
    fn test_parse_file_missing() {
        let err = parse_file(Path::new("/nonexistent/kflow/x.ci")).unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
        assert!(!err.is_malformed());
        assert!(err.to_string().contains("/nonexistent/kflow/x.ci"));
    }
}
