//! Labeled multigraph with per-vertex, per-label adjacency.
//!
//! Graphs are built incrementally with [`Graph::add_edge`] and treated as
//! immutable once an analysis stage starts. The first time a vertex is seen it
//! receives an epsilon self-loop (label `""`); those loops take part in edge
//! counts but not in [`Graph::content_hash`].

use ahash::AHashMap;
use mcfl_grammar::EPSILON_LABEL;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// Value types
// ============================================================================

/// Opaque vertex identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vertex(pub u64);

impl Vertex {
    pub const fn new(raw: u64) -> Self {
        Vertex(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for Vertex {
    fn from(raw: u64) -> Self {
        Vertex(raw)
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Query endpoint: one vertex, or every vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Any,
    Vertex(Vertex),
}

impl From<Vertex> for Endpoint {
    fn from(v: Vertex) -> Self {
        Endpoint::Vertex(v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub from: Vertex,
    pub to: Vertex,
    pub label: String,
}

impl Edge {
    pub fn new(from: Vertex, to: Vertex, label: impl Into<String>) -> Self {
        Self {
            from,
            to,
            label: label.into(),
        }
    }

    pub fn is_epsilon(&self) -> bool {
        self.label == EPSILON_LABEL
    }

    /// The automatically inserted `v -> v` epsilon edge.
    pub fn is_epsilon_loop(&self) -> bool {
        self.from == self.to && self.is_epsilon()
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}[label=\"{}\"]", self.from, self.to, self.label)
    }
}

/// Ordered vertex pair `(start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Path {
    pub start: Vertex,
    pub end: Vertex,
}

impl Path {
    pub const fn new(start: Vertex, end: Vertex) -> Self {
        Self { start, end }
    }

    pub const fn is_reflexive(&self) -> bool {
        self.start.0 == self.end.0
    }
}

impl From<(u64, u64)> for Path {
    fn from((start, end): (u64, u64)) -> Self {
        Path::new(Vertex(start), Vertex(end))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}]", self.start, self.end)
    }
}

// ============================================================================
// Graph
// ============================================================================

type LabelIndex = AHashMap<String, Vec<Vertex>>;

#[derive(Debug, Clone, Default)]
pub struct Graph {
    vertices: BTreeSet<Vertex>,
    edges: Vec<Edge>,
    /// from -> label -> targets
    out_index: AHashMap<Vertex, LabelIndex>,
    /// to -> label -> sources
    in_index: AHashMap<Vertex, LabelIndex>,
    /// label -> positions in `edges`
    by_label: AHashMap<String, Vec<usize>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from distinct edges, skipping repeats.
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = Edge>,
    {
        let mut g = Graph::new();
        for e in edges {
            g.insert_unique(e.from, e.to, &e.label);
        }
        g
    }

    /// A path graph `0 -a-> 1 -b-> 2 ...` spelling `word`.
    pub fn linear<'a, I>(word: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut g = Graph::new();
        for (pos, label) in word.into_iter().enumerate() {
            let pos = pos as u64;
            g.add_edge(Vertex(pos), Vertex(pos + 1), label);
        }
        g
    }

    /// Appends an edge; unseen endpoints get their epsilon self-loop.
    pub fn add_edge(&mut self, from: Vertex, to: Vertex, label: &str) {
        self.push_edge(Edge::new(from, to, label));
        for v in [from, to] {
            if self.vertices.insert(v) {
                self.push_edge(Edge::new(v, v, EPSILON_LABEL));
            }
        }
    }

    /// [`Graph::add_edge`] unless the exact triple is already present.
    pub fn insert_unique(&mut self, from: Vertex, to: Vertex, label: &str) -> bool {
        if self.contains_edge(from, to, label) {
            return false;
        }
        self.add_edge(from, to, label);
        true
    }

    fn push_edge(&mut self, edge: Edge) {
        self.out_index
            .entry(edge.from)
            .or_default()
            .entry(edge.label.clone())
            .or_default()
            .push(edge.to);
        self.in_index
            .entry(edge.to)
            .or_default()
            .entry(edge.label.clone())
            .or_default()
            .push(edge.from);
        self.by_label
            .entry(edge.label.clone())
            .or_default()
            .push(self.edges.len());
        self.edges.push(edge);
    }

    pub fn contains_edge(&self, from: Vertex, to: Vertex, label: &str) -> bool {
        self.out_index
            .get(&from)
            .and_then(|labels| labels.get(label))
            .is_some_and(|targets| targets.contains(&to))
    }

    pub fn contains_vertex(&self, v: Vertex) -> bool {
        self.vertices.contains(&v)
    }

    /// Sources of `label` edges into `to`; with [`Endpoint::Any`], the sources
    /// of every `label` edge.
    pub fn sources(&self, to: Endpoint, label: &str) -> Cow<'_, [Vertex]> {
        match to {
            Endpoint::Any => Cow::Owned(self.edges_with_label(label).map(|e| e.from).collect()),
            Endpoint::Vertex(v) => Self::neighbours(&self.in_index, v, label),
        }
    }

    /// Targets of `label` edges out of `from`; with [`Endpoint::Any`], the
    /// targets of every `label` edge.
    pub fn targets(&self, from: Endpoint, label: &str) -> Cow<'_, [Vertex]> {
        match from {
            Endpoint::Any => Cow::Owned(self.edges_with_label(label).map(|e| e.to).collect()),
            Endpoint::Vertex(v) => Self::neighbours(&self.out_index, v, label),
        }
    }

    fn neighbours<'g>(
        index: &'g AHashMap<Vertex, LabelIndex>,
        v: Vertex,
        label: &str,
    ) -> Cow<'g, [Vertex]> {
        match index.get(&v).and_then(|labels| labels.get(label)) {
            Some(list) => Cow::Borrowed(list.as_slice()),
            None => Cow::Borrowed(&[]),
        }
    }

    /// Successors over every label (repeats kept).
    pub fn successors(&self, v: Vertex) -> impl Iterator<Item = Vertex> + '_ {
        self.out_index
            .get(&v)
            .into_iter()
            .flat_map(|labels| labels.values().flatten().copied())
    }

    /// Predecessors over every label (repeats kept).
    pub fn predecessors(&self, v: Vertex) -> impl Iterator<Item = Vertex> + '_ {
        self.in_index
            .get(&v)
            .into_iter()
            .flat_map(|labels| labels.values().flatten().copied())
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edges_with_label<'a>(&'a self, label: &str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.by_label
            .get(label)
            .into_iter()
            .flatten()
            .map(move |&i| &self.edges[i])
    }

    /// Vertices in ascending order.
    pub fn vertices(&self) -> impl Iterator<Item = Vertex> + '_ {
        self.vertices.iter().copied()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.by_label.keys().map(String::as_str)
    }

    /// Only epsilon self-loops (or nothing at all).
    pub fn is_trivial(&self) -> bool {
        self.edges.len() == self.vertices.len()
    }

    /// FNV-1a 64 over the sorted non-epsilon edges.
    ///
    /// Independent of insertion order; used as the memoization key for
    /// solver results.
    pub fn content_hash(&self) -> u64 {
        const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
        const FNV_PRIME: u64 = 0x00000100000001b3;

        let mut keys: Vec<String> = self
            .edges
            .iter()
            .filter(|e| !e.is_epsilon())
            .map(|e| format!("{}->{}[{}]", e.from, e.to, e.label))
            .collect();
        keys.sort_unstable();

        let mut hash = FNV_OFFSET_BASIS;
        for key in &keys {
            for b in key.as_bytes().iter().chain(std::iter::once(&b' ')) {
                hash ^= *b as u64;
                hash = hash.wrapping_mul(FNV_PRIME);
            }
        }
        hash
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vertices, {} edges", self.vertex_count(), self.edge_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(raw: u64) -> Vertex {
        Vertex(raw)
    }

    #[test]
    fn first_sighting_adds_one_epsilon_loop() {
        let mut g = Graph::new();
        g.add_edge(v(0), v(1), "a");
        g.add_edge(v(1), v(2), "b");
        g.add_edge(v(0), v(2), "c");

        assert_eq!(g.vertex_count(), 3);
        assert_eq!(g.edge_count(), 6);
        let loops: Vec<_> = g.edges().iter().filter(|e| e.is_epsilon_loop()).collect();
        assert_eq!(loops.len(), 3);
        assert_eq!(g.targets(v(1).into(), EPSILON_LABEL).as_ref(), &[v(1)]);
    }

    #[test]
    fn self_loop_edge_registers_vertex_once() {
        let mut g = Graph::new();
        g.add_edge(v(4), v(4), "a");
        assert_eq!(g.edge_count(), 2);
        assert!(g.contains_edge(v(4), v(4), ""));
    }

    #[test]
    fn labeled_queries_by_vertex_and_wildcard() {
        let mut g = Graph::new();
        g.add_edge(v(0), v(1), "a");
        g.add_edge(v(2), v(1), "a");
        g.add_edge(v(1), v(3), "b");

        let mut into_one = g.sources(v(1).into(), "a").into_owned();
        into_one.sort();
        assert_eq!(into_one, vec![v(0), v(2)]);
        assert!(g.sources(v(1).into(), "b").is_empty());
        assert_eq!(g.targets(Endpoint::Any, "b").as_ref(), &[v(3)]);
        assert_eq!(g.sources(Endpoint::Any, "a").len(), 2);
        assert_eq!(g.edges_with_label("a").count(), 2);
    }

    #[test]
    fn insert_unique_skips_repeated_triples() {
        let mut g = Graph::new();
        assert!(g.insert_unique(v(0), v(1), "a"));
        assert!(!g.insert_unique(v(0), v(1), "a"));
        assert!(g.insert_unique(v(0), v(1), "b"));
        assert_eq!(g.edge_count(), 4);
    }

    #[test]
    fn content_hash_ignores_order_and_epsilon_loops() {
        let mut a = Graph::new();
        a.add_edge(v(0), v(1), "x");
        a.add_edge(v(1), v(2), "y");
        let mut b = Graph::new();
        b.add_edge(v(1), v(2), "y");
        b.add_edge(v(0), v(1), "x");
        assert_eq!(a.content_hash(), b.content_hash());

        b.add_edge(v(2), v(0), "z");
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn trivial_graph_has_only_loops() {
        let mut g = Graph::new();
        assert!(g.is_trivial());
        g.add_edge(v(0), v(0), EPSILON_LABEL);
        assert!(!g.is_trivial());
        let mut h = Graph::new();
        h.add_edge(v(0), v(1), "a");
        assert!(!h.is_trivial());
    }

    #[test]
    fn linear_graph_spells_the_word() {
        let g = Graph::linear(["op--1", "normal", "cp--1"]);
        assert_eq!(g.vertex_count(), 4);
        assert_eq!(g.targets(v(1).into(), "normal").as_ref(), &[v(2)]);
    }
}
