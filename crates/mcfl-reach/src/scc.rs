//! Strongly connected components and component-level reachability.
//!
//! Components are numbered in Tarjan completion order. A component completes
//! only after every component reachable from it, so each successor component
//! carries a smaller id than its predecessor (reverse topological order). The
//! closure relies on exactly that: walking ids upward, every successor row is
//! already final when it is merged.

use crate::graph::{Graph, Vertex};
use ahash::AHashMap;
use roaring::RoaringBitmap;

#[derive(Debug, Clone, Default)]
pub struct SccIndex {
    component: AHashMap<Vertex, u32>,
    /// `reach[c]` holds every component reachable from `c`, including `c`.
    reach: Vec<RoaringBitmap>,
}

struct Frame {
    vertex: Vertex,
    successors: Vec<Vertex>,
    next: usize,
}

impl SccIndex {
    pub fn build(graph: &Graph) -> Self {
        let components = tarjan(graph);

        let mut component = AHashMap::with_capacity(graph.vertex_count());
        for (id, members) in components.iter().enumerate() {
            for &v in members {
                component.insert(v, id as u32);
            }
        }

        let mut reach: Vec<RoaringBitmap> = Vec::with_capacity(components.len());
        for (id, members) in components.iter().enumerate() {
            let id = id as u32;
            let mut row = RoaringBitmap::new();
            row.insert(id);
            for &v in members {
                for w in graph.successors(v) {
                    let succ = component[&w];
                    if succ == id || row.contains(succ) {
                        continue;
                    }
                    debug_assert!(succ < id, "successor component numbered after predecessor");
                    row |= &reach[succ as usize];
                }
            }
            reach.push(row);
        }

        Self { component, reach }
    }

    pub fn component_of(&self, v: Vertex) -> Option<u32> {
        self.component.get(&v).copied()
    }

    pub fn component_count(&self) -> usize {
        self.reach.len()
    }

    pub fn component_reaches(&self, from: u32, to: u32) -> bool {
        self.reach
            .get(from as usize)
            .is_some_and(|row| row.contains(to))
    }

    /// `u` reaches `v` in the underlying unlabeled graph. Unknown vertices
    /// reach nothing.
    pub fn reaches(&self, u: Vertex, v: Vertex) -> bool {
        match (self.component_of(u), self.component_of(v)) {
            (Some(a), Some(b)) => self.component_reaches(a, b),
            _ => false,
        }
    }
}

/// Iterative Tarjan; components in completion order.
fn tarjan(graph: &Graph) -> Vec<Vec<Vertex>> {
    let mut index: AHashMap<Vertex, u32> = AHashMap::with_capacity(graph.vertex_count());
    let mut lowlink: AHashMap<Vertex, u32> = AHashMap::with_capacity(graph.vertex_count());
    let mut on_stack: AHashMap<Vertex, bool> = AHashMap::new();
    let mut stack: Vec<Vertex> = Vec::new();
    let mut components = Vec::new();
    let mut counter = 0u32;

    for root in graph.vertices() {
        if index.contains_key(&root) {
            continue;
        }
        let mut frames = vec![open_frame(graph, root, &mut counter, &mut index, &mut lowlink)];
        stack.push(root);
        on_stack.insert(root, true);

        while let Some(frame) = frames.last_mut() {
            let v = frame.vertex;
            if frame.next < frame.successors.len() {
                let w = frame.successors[frame.next];
                frame.next += 1;
                match index.get(&w) {
                    None => {
                        frames.push(open_frame(graph, w, &mut counter, &mut index, &mut lowlink));
                        stack.push(w);
                        on_stack.insert(w, true);
                    }
                    Some(&w_index) if on_stack.get(&w).copied().unwrap_or(false) => {
                        let low = lowlink[&v].min(w_index);
                        lowlink.insert(v, low);
                    }
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            let low_v = lowlink[&v];
            if let Some(parent) = frames.last() {
                let p = parent.vertex;
                let low = lowlink[&p].min(low_v);
                lowlink.insert(p, low);
            }
            if low_v == index[&v] {
                let mut members = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack.insert(w, false);
                    members.push(w);
                    if w == v {
                        break;
                    }
                }
                components.push(members);
            }
        }
    }
    components
}

fn open_frame(
    graph: &Graph,
    v: Vertex,
    counter: &mut u32,
    index: &mut AHashMap<Vertex, u32>,
    lowlink: &mut AHashMap<Vertex, u32>,
) -> Frame {
    index.insert(v, *counter);
    lowlink.insert(v, *counter);
    *counter += 1;
    Frame {
        vertex: v,
        successors: graph.successors(v).collect(),
        next: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(raw: u64) -> Vertex {
        Vertex(raw)
    }

    fn cycle_with_tail() -> Graph {
        let mut g = Graph::new();
        g.add_edge(v(0), v(1), "a");
        g.add_edge(v(1), v(2), "a");
        g.add_edge(v(2), v(0), "a");
        g.add_edge(v(2), v(3), "a");
        g
    }

    #[test]
    fn cycle_reaches_tail_but_not_back() {
        let scc = SccIndex::build(&cycle_with_tail());
        assert_eq!(scc.component_count(), 2);

        let cycle = scc.component_of(v(0)).unwrap();
        assert_eq!(scc.component_of(v(1)), Some(cycle));
        assert_eq!(scc.component_of(v(2)), Some(cycle));
        let tail = scc.component_of(v(3)).unwrap();

        assert!(scc.component_reaches(cycle, tail));
        assert!(!scc.component_reaches(tail, cycle));
        assert!(scc.reaches(v(1), v(3)));
        assert!(!scc.reaches(v(3), v(0)));
    }

    #[test]
    fn ids_are_reverse_topological() {
        let scc = SccIndex::build(&cycle_with_tail());
        let cycle = scc.component_of(v(0)).unwrap();
        let tail = scc.component_of(v(3)).unwrap();
        assert!(tail < cycle);
    }

    #[test]
    fn every_vertex_reaches_itself() {
        let mut g = Graph::new();
        g.add_edge(v(5), v(6), "a");
        let scc = SccIndex::build(&g);
        assert!(scc.reaches(v(5), v(5)));
        assert!(scc.reaches(v(6), v(6)));
        assert!(!scc.reaches(v(6), v(5)));
        assert!(!scc.reaches(v(5), v(99)));
    }

    #[test]
    fn diamond_closure_is_transitive() {
        let mut g = Graph::new();
        g.add_edge(v(0), v(1), "a");
        g.add_edge(v(0), v(2), "a");
        g.add_edge(v(1), v(3), "a");
        g.add_edge(v(2), v(3), "a");
        g.add_edge(v(3), v(4), "a");
        let scc = SccIndex::build(&g);
        assert_eq!(scc.component_count(), 5);
        assert!(scc.reaches(v(0), v(4)));
        assert!(!scc.reaches(v(1), v(2)));
    }
}
