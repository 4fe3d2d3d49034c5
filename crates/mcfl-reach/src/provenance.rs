//! Derivation provenance: which edges and which earlier derivations produced
//! each derivation.
//!
//! The relation forms a DAG rooted at start-symbol derivations. Walking it
//! backwards from a set of result paths yields the graph edges those results
//! depend on, which is how the refinement loop shrinks its graph.

use crate::derivation::DerivationId;
use crate::graph::{Edge, Path};
use ahash::{AHashMap, AHashSet};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct Provenance {
    edges: AHashMap<DerivationId, Vec<Edge>>,
    antecedents: AHashMap<DerivationId, AHashSet<DerivationId>>,
    roots: AHashMap<Path, DerivationId>,
}

impl Provenance {
    pub fn record_edge(&mut self, derivation: DerivationId, edge: &Edge) {
        let edges = self.edges.entry(derivation).or_default();
        if !edges.contains(edge) {
            edges.push(edge.clone());
        }
    }

    pub fn record_antecedent(&mut self, derivation: DerivationId, antecedent: DerivationId) {
        self.antecedents
            .entry(derivation)
            .or_default()
            .insert(antecedent);
    }

    /// Marks `derivation` as the start-symbol derivation of `path`.
    pub fn record_root(&mut self, path: Path, derivation: DerivationId) {
        self.roots.entry(path).or_insert(derivation);
    }

    pub fn root(&self, path: &Path) -> Option<DerivationId> {
        self.roots.get(path).copied()
    }

    /// Non-epsilon edges supporting `targets`; the DAG is left untouched.
    pub fn supporting_edges(&self, targets: &[Path]) -> BTreeSet<Edge> {
        let (_, edges) = self.walk(targets);
        edges
    }

    /// Like [`Provenance::supporting_edges`], then drops every node the walk
    /// did not reach.
    pub fn retain_supporting(&mut self, targets: &[Path]) -> BTreeSet<Edge> {
        let (visited, edges) = self.walk(targets);
        self.edges.retain(|id, _| visited.contains(id));
        self.antecedents.retain(|id, _| visited.contains(id));
        self.roots.retain(|_, id| visited.contains(id));
        edges
    }

    fn walk(&self, targets: &[Path]) -> (AHashSet<DerivationId>, BTreeSet<Edge>) {
        let mut visited = AHashSet::new();
        let mut edges = BTreeSet::new();
        let mut stack: Vec<DerivationId> = targets
            .iter()
            .filter(|p| !p.is_reflexive())
            .filter_map(|p| self.root(p))
            .collect();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(own) = self.edges.get(&id) {
                edges.extend(own.iter().filter(|e| !e.is_epsilon()).cloned());
            }
            if let Some(parents) = self.antecedents.get(&id) {
                stack.extend(parents.iter().copied().filter(|p| !visited.contains(p)));
            }
        }
        (visited, edges)
    }

    pub fn node_count(&self) -> usize {
        self.edges.keys().chain(self.antecedents.keys()).collect::<AHashSet<_>>().len()
    }
}
