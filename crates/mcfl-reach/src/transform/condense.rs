//! Union-find condensation of mutually reachable vertices.

use crate::graph::{Graph, Path, Vertex};
use crate::union_find::DisjointSets;
use ahash::AHashMap;
use std::collections::BTreeSet;

/// A graph whose vertices are group representatives, plus the groups.
#[derive(Debug, Clone)]
pub struct Condensation {
    pub graph: Graph,
    representative: AHashMap<Vertex, Vertex>,
    members: AHashMap<Vertex, Vec<Vertex>>,
}

impl Condensation {
    /// Merges every `u`, `v` that reach each other according to `under`.
    ///
    /// `under` must be a sound under-approximation: merging two mutually
    /// reachable vertices changes no other pair's answer.
    pub fn from_under_approximation(graph: &Graph, under: &BTreeSet<Path>) -> Self {
        let mut sets = DisjointSets::new();
        for v in graph.vertices() {
            sets.insert(v);
        }
        for p in under {
            if p.is_reflexive() || !under.contains(&Path::new(p.end, p.start)) {
                continue;
            }
            let (Some(a), Some(b)) = (sets.find(p.start), sets.find(p.end)) else {
                continue;
            };
            if a != b {
                sets.union(a, b);
            }
        }

        let members = sets.groups();
        let mut representative = AHashMap::with_capacity(graph.vertex_count());
        for (&root, group) in &members {
            for &m in group {
                representative.insert(m, root);
            }
        }

        let mut condensed = Graph::new();
        for e in graph.edges() {
            if e.is_epsilon() {
                continue;
            }
            let from = representative.get(&e.from).copied().unwrap_or(e.from);
            let to = representative.get(&e.to).copied().unwrap_or(e.to);
            condensed.insert_unique(from, to, &e.label);
        }

        Self {
            graph: condensed,
            representative,
            members,
        }
    }

    pub fn representative(&self, v: Vertex) -> Vertex {
        self.representative.get(&v).copied().unwrap_or(v)
    }

    pub fn members(&self, representative: Vertex) -> &[Vertex] {
        self.members
            .get(&representative)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Vertices merged with at least one other vertex.
    pub fn merged_vertex_count(&self) -> usize {
        self.members.values().filter(|g| g.len() > 1).map(Vec::len).sum()
    }

    /// Lifts condensed pairs back to original vertices.
    ///
    /// A pair `(a, b)` of representatives expands to every member pair; every
    /// group that survives in the condensed graph also contributes its own
    /// intra-group pairs.
    pub fn expand<'a, I>(&self, paths: I) -> BTreeSet<Path>
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let mut out = BTreeSet::new();
        for p in paths {
            let ends = self.members_or_self(p.end);
            for s in self.members_or_self(p.start) {
                for &e in &ends {
                    if s != e {
                        out.insert(Path::new(s, e));
                    }
                }
            }
        }
        for rep in self.graph.vertices() {
            let group = self.members(rep);
            for &s in group {
                for &e in group {
                    if s != e {
                        out.insert(Path::new(s, e));
                    }
                }
            }
        }
        out
    }

    fn members_or_self(&self, v: Vertex) -> Vec<Vertex> {
        match self.members.get(&v) {
            Some(group) => group.clone(),
            None => vec![v],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(raw: u64) -> Vertex {
        Vertex(raw)
    }

    fn paths(pairs: &[(u64, u64)]) -> BTreeSet<Path> {
        pairs.iter().copied().map(Path::from).collect()
    }

    #[test]
    fn mutual_pairs_collapse_into_one_vertex() {
        let mut g = Graph::new();
        g.add_edge(v(0), v(1), "a");
        g.add_edge(v(1), v(0), "b");
        g.add_edge(v(1), v(2), "c");
        let c = Condensation::from_under_approximation(&g, &paths(&[(0, 1), (1, 0), (1, 2)]));
        assert_eq!(c.representative(v(0)), c.representative(v(1)));
        assert_ne!(c.representative(v(2)), c.representative(v(1)));
        assert_eq!(c.graph.vertex_count(), 2);
        assert_eq!(c.merged_vertex_count(), 2);
    }

    #[test]
    fn expansion_covers_members_and_intra_group_pairs() {
        let mut g = Graph::new();
        g.add_edge(v(0), v(1), "a");
        g.add_edge(v(1), v(0), "b");
        g.add_edge(v(1), v(2), "c");
        let c = Condensation::from_under_approximation(&g, &paths(&[(0, 1), (1, 0)]));
        let rep = c.representative(v(0));
        let expanded = c.expand(&[Path::new(rep, v(2))]);
        assert_eq!(expanded, paths(&[(0, 2), (1, 2), (0, 1), (1, 0)]));
    }
}
