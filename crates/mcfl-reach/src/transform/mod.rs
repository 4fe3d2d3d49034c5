//! Graph-to-graph transformations used between solver runs.

pub mod automaton;
pub mod condense;
pub mod layered;
pub mod valueflow;

use crate::graph::{Edge, Graph, Path, Vertex};
use crate::scc::SccIndex;
use ahash::{AHashMap, AHashSet};
use mcfl_grammar::{DyckIds, DyckLabel};
use std::collections::BTreeSet;

pub use automaton::{multiply_by_automaton, project_automaton_paths};
pub use condense::Condensation;
pub use layered::LayeredGraph;
pub use valueflow::{
    filter_bracket_paths, project_valueflow_paths, remove_valueflow_unreachable,
    triple_valueflow,
};

/// Graph holding each distinct edge once.
pub fn graph_from_edges<'a, I>(edges: I) -> Graph
where
    I: IntoIterator<Item = &'a Edge>,
{
    let mut g = Graph::new();
    for e in edges {
        g.insert_unique(e.from, e.to, &e.label);
    }
    g
}

/// Weakly connected components, ordered by their smallest vertex.
///
/// Epsilon self-loops are not copied; every component re-creates them for
/// its own vertices.
pub fn split_components(graph: &Graph) -> Vec<Graph> {
    let mut seen: AHashSet<Vertex> = AHashSet::with_capacity(graph.vertex_count());
    let mut component_of: AHashMap<Vertex, usize> = AHashMap::with_capacity(graph.vertex_count());
    let mut count = 0usize;

    for root in graph.vertices() {
        if !seen.insert(root) {
            continue;
        }
        let mut stack = vec![root];
        while let Some(v) = stack.pop() {
            component_of.insert(v, count);
            for w in graph.successors(v).chain(graph.predecessors(v)) {
                if seen.insert(w) {
                    stack.push(w);
                }
            }
        }
        count += 1;
    }

    let mut components = vec![Graph::new(); count];
    for e in graph.edges() {
        if e.is_epsilon_loop() {
            continue;
        }
        if let Some(&c) = component_of.get(&e.from) {
            components[c].add_edge(e.from, e.to, &e.label);
        }
    }
    // Isolated vertices only carry their epsilon loop.
    for v in graph.vertices() {
        if let Some(&c) = component_of.get(&v) {
            if !components[c].contains_vertex(v) {
                components[c].add_edge(v, v, mcfl_grammar::EPSILON_LABEL);
            }
        }
    }
    components
}

/// A Dyck-filtered graph together with the bracket ids it keeps.
#[derive(Debug, Clone, Default)]
pub struct DyckComponent {
    pub ids: DyckIds,
    pub graph: Graph,
}

/// Keeps `normal` edges and brackets whose partner label also occurs.
///
/// An id is recorded once, at the first label whose partner was already seen.
/// Epsilon loops and unrecognised labels are dropped.
pub fn dyck_component(graph: &Graph) -> DyckComponent {
    let mut seen: AHashSet<&str> = AHashSet::new();
    let mut ids = DyckIds::default();
    let mut recorded = AHashSet::new();
    for e in graph.edges() {
        let label = DyckLabel::parse(&e.label);
        if let (Some(partner), Some(bracket)) = (label.partner(), label.bracket()) {
            if seen.contains(partner.to_string().as_str()) && recorded.insert(bracket) {
                ids.push(bracket.0, bracket.1);
            }
        }
        seen.insert(e.label.as_str());
    }

    let mut out = Graph::new();
    for e in graph.edges() {
        let keep = match DyckLabel::parse(&e.label) {
            DyckLabel::Normal => true,
            label @ (DyckLabel::Open(..) | DyckLabel::Close(..)) => label
                .bracket()
                .is_some_and(|bracket| recorded.contains(&bracket)),
            DyckLabel::Epsilon | DyckLabel::Other(_) => false,
        };
        if keep {
            out.add_edge(e.from, e.to, &e.label);
        }
    }
    DyckComponent { ids, graph: out }
}

/// Records every bracket id on first sighting and keeps all non-epsilon
/// edges, whether or not the partner occurs.
pub fn dyck_component_naive(graph: &Graph) -> DyckComponent {
    let mut ids = DyckIds::default();
    let mut recorded = AHashSet::new();
    let mut out = Graph::new();
    for e in graph.edges() {
        if e.is_epsilon() {
            continue;
        }
        if let Some(bracket) = DyckLabel::parse(&e.label).bracket() {
            if recorded.insert(bracket) {
                ids.push(bracket.0, bracket.1);
            }
        }
        out.add_edge(e.from, e.to, &e.label);
    }
    DyckComponent { ids, graph: out }
}

/// Drops edges that cannot lie on any unlabeled path between a target pair.
///
/// An edge `(f, t)` survives when some target `(a, b)` has `a` reaching `f`
/// and `t` reaching `b`. Targets are compared by strongly connected component,
/// so the check runs once per distinct component pair of an edge against the
/// distinct component pairs of the targets. When the targets cover every
/// vertex pair the graph is returned unchanged.
pub fn restrict_to_pairs(graph: &Graph, targets: &[Path]) -> Graph {
    let n = graph.vertex_count();
    if targets.len() >= n * n && targets.iter().collect::<BTreeSet<_>>().len() >= n * n {
        return graph.clone();
    }

    let scc = SccIndex::build(graph);
    let wanted: AHashSet<(u32, u32)> = targets
        .iter()
        .filter_map(|p| Some((scc.component_of(p.start)?, scc.component_of(p.end)?)))
        .collect();

    let mut decided: AHashMap<(u32, u32), bool> = AHashMap::new();
    let mut out = Graph::new();
    for e in graph.edges() {
        if e.is_epsilon_loop() {
            continue;
        }
        let (Some(from), Some(to)) = (scc.component_of(e.from), scc.component_of(e.to)) else {
            continue;
        };
        let on_path = *decided.entry((from, to)).or_insert_with(|| {
            wanted
                .iter()
                .any(|&(a, b)| scc.component_reaches(a, from) && scc.component_reaches(to, b))
        });
        if on_path {
            out.add_edge(e.from, e.to, &e.label);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcfl_grammar::BracketFamily;

    fn v(raw: u64) -> Vertex {
        Vertex(raw)
    }

    #[test]
    fn components_split_on_weak_connectivity() {
        let mut g = Graph::new();
        g.add_edge(v(3), v(4), "a");
        g.add_edge(v(1), v(0), "a");
        g.add_edge(v(2), v(0), "b");
        let parts = split_components(&g);
        assert_eq!(parts.len(), 2);
        assert!(parts[0].contains_vertex(v(2)));
        assert_eq!(parts[0].vertex_count(), 3);
        assert_eq!(parts[0].edge_count(), 5);
        assert_eq!(parts[1].edge_count(), 3);
    }

    #[test]
    fn dyck_component_drops_unmatched_brackets() {
        let mut g = Graph::new();
        g.add_edge(v(0), v(1), "op--1");
        g.add_edge(v(1), v(2), "cp--1");
        g.add_edge(v(2), v(3), "ob--7");
        g.add_edge(v(3), v(4), "normal");
        g.add_edge(v(4), v(5), "weird");
        let dc = dyck_component(&g);
        assert_eq!(dc.ids.ids(BracketFamily::Parenthesis), &[1]);
        assert!(dc.ids.ids(BracketFamily::Bracket).is_empty());
        assert!(dc.graph.contains_edge(v(0), v(1), "op--1"));
        assert!(dc.graph.contains_edge(v(3), v(4), "normal"));
        assert!(!dc.graph.contains_vertex(v(5)));
        assert!(!dc.graph.contains_edge(v(2), v(3), "ob--7"));
    }

    #[test]
    fn naive_component_keeps_everything_but_epsilon() {
        let mut g = Graph::new();
        g.add_edge(v(0), v(1), "ob--7");
        g.add_edge(v(1), v(2), "ob--7");
        let dc = dyck_component_naive(&g);
        assert_eq!(dc.ids.ids(BracketFamily::Bracket), &[7]);
        assert_eq!(dc.graph.edge_count(), 2 + 3);
    }

    #[test]
    fn restriction_keeps_edges_between_targets() {
        let mut g = Graph::new();
        g.add_edge(v(0), v(1), "a");
        g.add_edge(v(1), v(2), "a");
        g.add_edge(v(2), v(3), "a");
        g.add_edge(v(5), v(1), "a");
        let r = restrict_to_pairs(&g, &[Path::from((0, 2))]);
        assert!(r.contains_edge(v(0), v(1), "a"));
        assert!(r.contains_edge(v(1), v(2), "a"));
        assert!(!r.contains_edge(v(2), v(3), "a"));
        assert!(!r.contains_edge(v(5), v(1), "a"));
    }

    #[test]
    fn restriction_compares_targets_by_component() {
        // 1 and 2 form a cycle; every edge inside it lies on a 0 -> 3 path
        let mut g = Graph::new();
        g.add_edge(v(0), v(1), "a");
        g.add_edge(v(1), v(2), "b");
        g.add_edge(v(2), v(1), "c");
        g.add_edge(v(2), v(3), "d");
        g.add_edge(v(3), v(4), "e");
        g.add_edge(v(9), v(0), "f");
        let targets = [Path::from((0, 3)), Path::from((0, 3)), Path::from((1, 3)), Path::from((2, 3))];
        let r = restrict_to_pairs(&g, &targets);
        for (from, to, label) in [(0, 1, "a"), (1, 2, "b"), (2, 1, "c"), (2, 3, "d")] {
            assert!(r.contains_edge(v(from), v(to), label), "{from} -> {to}");
        }
        assert!(!r.contains_edge(v(3), v(4), "e"));
        assert!(!r.contains_edge(v(9), v(0), "f"));

        assert_eq!(restrict_to_pairs(&g, &[Path::from((5, 6))]).edge_count(), 0);
    }
}
