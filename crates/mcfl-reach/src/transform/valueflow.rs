//! Value-flow benchmark transforms.
//!
//! Value-flow queries ask for paths of the shape `ob--0 ... cb--0`: a source
//! bracket, a balanced middle, a sink bracket.

use crate::graph::{Graph, Path, Vertex};
use crate::scc::SccIndex;
use crate::solver::{solve, SolverOptions};
use crate::transform::dyck_component_naive;
use crate::transform::layered::LayeredGraph;
use ahash::AHashSet;
use mcfl_grammar::dyck::bracket_wrapper;
use mcfl_grammar::{BracketFamily, DyckLabel};
use std::collections::BTreeSet;

fn is_bracket_open(label: &str) -> bool {
    matches!(DyckLabel::parse(label), DyckLabel::Open(BracketFamily::Bracket, _))
}

fn is_bracket_close(label: &str) -> bool {
    matches!(DyckLabel::parse(label), DyckLabel::Close(BracketFamily::Bracket, _))
}

/// Keeps vertices lying between some source bracket (the tail of an `ob`
/// edge) and some sink bracket (the head of a `cb` edge).
pub fn remove_valueflow_unreachable(graph: &Graph) -> Graph {
    let scc = SccIndex::build(graph);
    let mut sources = AHashSet::new();
    let mut sinks = AHashSet::new();
    for e in graph.edges() {
        if is_bracket_open(&e.label) {
            sources.extend(scc.component_of(e.from));
        }
        if is_bracket_close(&e.label) {
            sinks.extend(scc.component_of(e.to));
        }
    }

    let keep: AHashSet<Vertex> = graph
        .vertices()
        .filter(|&v| {
            let Some(c) = scc.component_of(v) else {
                return false;
            };
            sources.iter().any(|&s| scc.component_reaches(s, c))
                && sinks.iter().any(|&t| scc.component_reaches(c, t))
        })
        .collect();

    let mut out = Graph::new();
    for e in graph.edges() {
        if !e.is_epsilon() && keep.contains(&e.from) && keep.contains(&e.to) {
            out.add_edge(e.from, e.to, &e.label);
        }
    }
    out
}

/// Paths `(s, e)` spelled `ob--0 w cb--0` for some word `w` over the labels
/// of `graph`, found by solving the bracket-wrapper grammar.
pub fn filter_bracket_paths(graph: &Graph, paths: &[Path]) -> Vec<Path> {
    let ids = dyck_component_naive(graph).ids;
    let grammar = bracket_wrapper(&ids.parenthesis, &ids.bracket);
    let wrapped: AHashSet<Path> = solve(graph, &grammar, SolverOptions::without_provenance())
        .paths
        .into_iter()
        .collect();
    let mut seen = AHashSet::new();
    paths
        .iter()
        .copied()
        .filter(|p| wrapped.contains(p) && seen.insert(*p))
        .collect()
}

/// Three copies per vertex: layer 0 before the source bracket, layer 1
/// inside, layer 2 after the sink bracket.
///
/// Every edge runs inside; `ob` edges also enter from the outer layer and `cb`
/// edges also leave to the final layer.
pub fn triple_valueflow(graph: &Graph) -> LayeredGraph {
    let mut out = LayeredGraph::over(graph, 3);
    for e in graph.edges() {
        if e.is_epsilon_loop() {
            continue;
        }
        out.connect((e.from, 1), (e.to, 1), &e.label);
        if is_bracket_open(&e.label) {
            out.connect((e.from, 0), (e.to, 1), &e.label);
        }
        if is_bracket_close(&e.label) {
            out.connect((e.from, 1), (e.to, 2), &e.label);
        }
    }
    out
}

/// Maps tripled paths from the outer to the final layer back to the input.
pub fn project_valueflow_paths<'a, I>(tripled: &LayeredGraph, paths: I) -> BTreeSet<Path>
where
    I: IntoIterator<Item = &'a Path>,
{
    tripled.project(paths, 0, |layer| layer == 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(raw: u64) -> Vertex {
        Vertex(raw)
    }

    fn wrapped_flow() -> Graph {
        let mut g = Graph::new();
        g.add_edge(v(0), v(1), "ob--0");
        g.add_edge(v(1), v(2), "normal");
        g.add_edge(v(2), v(3), "cb--0");
        g.add_edge(v(7), v(8), "normal");
        g
    }

    #[test]
    fn vertices_outside_brackets_are_removed() {
        let g = remove_valueflow_unreachable(&wrapped_flow());
        assert!(g.contains_vertex(v(0)));
        assert!(g.contains_vertex(v(3)));
        assert!(!g.contains_vertex(v(7)));
        assert_eq!(g.edge_count(), 3 + 4);
    }

    #[test]
    fn bracket_paths_need_the_wrapper() {
        let g = wrapped_flow();
        let kept = filter_bracket_paths(&g, &[Path::from((0, 3)), Path::from((1, 3)), Path::from((0, 3))]);
        assert_eq!(kept, vec![Path::from((0, 3))]);

        // the sink bracket must close the source bracket's path
        let mut split = Graph::new();
        split.add_edge(v(0), v(1), "ob--0");
        split.add_edge(v(2), v(3), "cb--0");
        split.add_edge(v(1), v(4), "normal");
        assert!(filter_bracket_paths(&split, &[Path::from((0, 3))]).is_empty());
    }

    #[test]
    fn tripling_and_projection_agree() {
        let tripled = triple_valueflow(&wrapped_flow());
        let t = &tripled.graph;
        assert!(t.contains_edge(v(0), v(4), "ob--0"));
        assert!(t.contains_edge(v(7), v(11), "cb--0"));
        assert!(t.contains_edge(v(4), v(7), "normal"));
        // 7 and 8 are the fifth and sixth input vertices
        assert!(t.contains_edge(v(13), v(16), "normal"));
        let projected = project_valueflow_paths(
            &tripled,
            &[Path::from((0, 11)), Path::from((1, 11)), Path::from((0, 1))],
        );
        assert_eq!(projected.into_iter().collect::<Vec<_>>(), vec![Path::from((0, 3))]);
    }
}
