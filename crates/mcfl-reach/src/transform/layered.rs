//! Dense `(vertex, layer)` numbering for product graphs.
//!
//! Input ids can be anywhere in `u64`, so layering them directly would
//! overflow. The input vertices are first renumbered `0..n` in ascending
//! order; vertex `v` in layer `q` then becomes `layers * index(v) + q`.

use crate::graph::{Graph, Path, Vertex};
use ahash::AHashMap;
use std::collections::BTreeSet;

/// A graph over `(vertex, layer)` pairs plus the numbering that decodes it.
#[derive(Debug, Clone)]
pub struct LayeredGraph {
    pub graph: Graph,
    layers: u64,
    index: AHashMap<Vertex, u64>,
    vertices: Vec<Vertex>,
}

impl LayeredGraph {
    /// Empty product over the vertices of `source`.
    pub fn over(source: &Graph, layers: u64) -> Self {
        let vertices: Vec<Vertex> = source.vertices().collect();
        let index = vertices
            .iter()
            .enumerate()
            .map(|(i, &v)| (v, i as u64))
            .collect();
        Self {
            graph: Graph::new(),
            layers: layers.max(1),
            index,
            vertices,
        }
    }

    pub fn layers(&self) -> u64 {
        self.layers
    }

    /// Product vertex of `v` in `layer`; `None` for vertices outside the source.
    pub fn lift(&self, v: Vertex, layer: u64) -> Option<Vertex> {
        self.index
            .get(&v)
            .map(|&i| Vertex(self.layers * i + layer % self.layers))
    }

    /// Input vertex and layer of a product vertex.
    pub fn split(&self, v: Vertex) -> Option<(Vertex, u64)> {
        let i = usize::try_from(v.0 / self.layers).ok()?;
        self.vertices.get(i).map(|&orig| (orig, v.0 % self.layers))
    }

    pub fn connect(&mut self, from: (Vertex, u64), to: (Vertex, u64), label: &str) {
        if let (Some(a), Some(b)) = (self.lift(from.0, from.1), self.lift(to.0, to.1)) {
            self.graph.add_edge(a, b, label);
        }
    }

    /// Product paths starting in layer `start` and ending in a layer accepted
    /// by `accept`, mapped back to input vertices. Reflexive results are
    /// dropped.
    pub fn project<'a, I, F>(&self, paths: I, start: u64, accept: F) -> BTreeSet<Path>
    where
        I: IntoIterator<Item = &'a Path>,
        F: Fn(u64) -> bool,
    {
        paths
            .into_iter()
            .filter_map(|p| {
                let (from, p_layer) = self.split(p.start)?;
                let (to, q_layer) = self.split(p.end)?;
                (p_layer == start && accept(q_layer)).then_some(Path::new(from, to))
            })
            .filter(|p| !p.is_reflexive())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_ids_are_numbered_densely() {
        let mut g = Graph::new();
        g.add_edge(Vertex(u64::MAX - 1), Vertex(7), "a");
        let mut layered = LayeredGraph::over(&g, 4);
        assert_eq!(layered.lift(Vertex(7), 3), Some(Vertex(3)));
        assert_eq!(layered.lift(Vertex(u64::MAX - 1), 2), Some(Vertex(6)));
        assert_eq!(layered.lift(Vertex(8), 0), None);
        assert_eq!(layered.split(Vertex(6)), Some((Vertex(u64::MAX - 1), 2)));
        assert_eq!(layered.split(Vertex(8)), None);

        layered.connect((Vertex(u64::MAX - 1), 0), (Vertex(7), 1), "a");
        assert!(layered.graph.contains_edge(Vertex(4), Vertex(1), "a"));
        let projected = layered.project(&[Path::from((4, 1)), Path::from((5, 1))], 0, |q| q == 1);
        assert_eq!(
            projected.into_iter().collect::<Vec<_>>(),
            vec![Path::new(Vertex(u64::MAX - 1), Vertex(7))]
        );
    }
}
