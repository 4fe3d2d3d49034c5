//! Line-oriented graph and path files.
//!
//! Graph files hold one edge per line, `<from>-><to>[label="<label>"]`; any
//! other line is skipped. Path files hold `<start> <end>` per line.

use crate::error::{AnalysisError, Result};
use crate::graph::{Graph, Path, Vertex};
use regex::Regex;
use std::fmt::Write as _;
use std::path::Path as FsPath;
use std::sync::OnceLock;

fn edge_line() -> &'static Regex {
    static EDGE: OnceLock<Regex> = OnceLock::new();
    EDGE.get_or_init(|| {
        Regex::new(r#"^\s*(\d+)\s*->\s*(\d+)\s*\[\s*label\s*=\s*"([^"]*)"\s*\]"#)
            .expect("edge pattern is a valid regex")
    })
}

/// How labels are read from a graph file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelStyle {
    /// Labels as written.
    #[default]
    Raw,
    /// Drops bracket ids: `ob` → `a`, `op` → `b`, `cb` → `A`, `cp` → `B`,
    /// anything else → epsilon.
    Collapsed,
}

impl LabelStyle {
    fn apply<'a>(self, label: &'a str) -> &'a str {
        match self {
            LabelStyle::Raw => label,
            LabelStyle::Collapsed => match label.split("--").next().unwrap_or_default() {
                "ob" => "a",
                "op" => "b",
                "cb" => "A",
                "cp" => "B",
                _ => "",
            },
        }
    }
}

/// Parse result with the number of lines that were not edges.
#[derive(Debug, Clone, Default)]
pub struct ParsedGraph {
    pub graph: Graph,
    pub skipped_lines: usize,
}

pub fn parse_graph_with(text: &str, style: LabelStyle) -> ParsedGraph {
    let mut parsed = ParsedGraph::default();
    for line in text.lines() {
        let Some(caps) = edge_line().captures(line) else {
            if !line.trim().is_empty() {
                parsed.skipped_lines += 1;
            }
            continue;
        };
        let (Ok(from), Ok(to)) = (caps[1].parse::<u64>(), caps[2].parse::<u64>()) else {
            parsed.skipped_lines += 1;
            continue;
        };
        parsed
            .graph
            .insert_unique(Vertex(from), Vertex(to), style.apply(&caps[3]));
    }
    if parsed.skipped_lines > 0 {
        tracing::debug!(skipped = parsed.skipped_lines, "ignored non-edge lines");
    }
    parsed
}

pub fn parse_graph(text: &str) -> Graph {
    parse_graph_with(text, LabelStyle::Raw).graph
}

pub fn read_graph(path: &FsPath) -> Result<Graph> {
    read_graph_with(path, LabelStyle::Raw)
}

pub fn read_graph_with(path: &FsPath, style: LabelStyle) -> Result<Graph> {
    let text = std::fs::read_to_string(path).map_err(|e| AnalysisError::io(path, e))?;
    let parsed = parse_graph_with(&text, style);
    tracing::debug!(
        path = %path.display(),
        vertices = parsed.graph.vertex_count(),
        edges = parsed.graph.edge_count(),
        "loaded graph"
    );
    Ok(parsed.graph)
}

/// Non-epsilon edges in graph-file syntax.
pub fn write_graph(graph: &Graph) -> String {
    let mut out = String::new();
    for e in graph.edges().iter().filter(|e| !e.is_epsilon()) {
        let _ = writeln!(out, "{e}");
    }
    out
}

/// A path graph over `word`: whitespace-separated labels, or one label per
/// character when there is no whitespace.
pub fn linear_graph(word: &str) -> Graph {
    if word.contains(char::is_whitespace) {
        Graph::linear(word.split_whitespace())
    } else {
        let letters: Vec<String> = word.chars().map(String::from).collect();
        Graph::linear(letters.iter().map(String::as_str))
    }
}

pub fn write_paths<'a, I>(paths: I) -> String
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut out = String::new();
    for p in paths {
        let _ = writeln!(out, "{} {}", p.start, p.end);
    }
    out
}

/// Reads `<start> <end>` lines; lines without two integers are skipped.
pub fn parse_paths(text: &str) -> Vec<Path> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let start = fields.next()?.parse::<u64>().ok()?;
            let end = fields.next()?.parse::<u64>().ok()?;
            Some(Path::new(Vertex(start), Vertex(end)))
        })
        .collect()
}

pub fn read_paths(path: &FsPath) -> Result<Vec<Path>> {
    let text = std::fs::read_to_string(path).map_err(|e| AnalysisError::io(path, e))?;
    Ok(parse_paths(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_parse_and_noise_is_skipped() {
        let text = "digraph {\n0->1[label=\"ob--43\"]\n 1 -> 2 [label=\"normal\"]\ngarbage\n0->1[label=\"ob--43\"]\n}\n";
        let parsed = parse_graph_with(text, LabelStyle::Raw);
        assert_eq!(parsed.graph.vertex_count(), 3);
        assert_eq!(parsed.graph.edge_count(), 2 + 3);
        assert_eq!(parsed.skipped_lines, 3);
    }

    #[test]
    fn collapsed_labels_drop_ids() {
        let text = "0->1[label=\"ob--4\"]\n1->2[label=\"cp--9\"]\n2->3[label=\"normal\"]";
        let g = parse_graph_with(text, LabelStyle::Collapsed).graph;
        assert!(g.contains_edge(Vertex(0), Vertex(1), "a"));
        assert!(g.contains_edge(Vertex(1), Vertex(2), "B"));
        assert!(g.contains_edge(Vertex(2), Vertex(3), ""));
    }

    #[test]
    fn written_graph_reads_back() {
        let g = parse_graph("5->6[label=\"op--1\"]\n6->7[label=\"cp--1\"]\n");
        let again = parse_graph(&write_graph(&g));
        assert_eq!(again.content_hash(), g.content_hash());
        assert_eq!(again.edge_count(), g.edge_count());
    }

    #[test]
    fn linear_words_in_both_spellings() {
        assert_eq!(linear_graph("abc").edge_count(), 3 + 4);
        let g = linear_graph("op--1 normal cp--1");
        assert!(g.contains_edge(Vertex(2), Vertex(3), "cp--1"));
    }

    #[test]
    fn paths_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("paths.txt");
        let paths = vec![Path::from((1, 2)), Path::from((30, 4))];
        std::fs::write(&file, write_paths(&paths)).unwrap();
        assert_eq!(read_paths(&file).unwrap(), paths);
        assert!(matches!(
            read_paths(&dir.path().join("missing")),
            Err(AnalysisError::Io { .. })
        ));
    }
}
