//! Mutual refinement: alternate the alpha and beta grammars, each time
//! shrinking the graph to the edges the previous grammar actually used, until
//! the edge count stops decreasing.

use crate::config::AnalysisFamily;
use crate::graph::{Graph, Path};
use crate::session::AnalysisSession;
use crate::transform::{
    dyck_component, filter_bracket_paths, graph_from_edges, remove_valueflow_unreachable,
    restrict_to_pairs, split_components,
};
use std::collections::BTreeSet;

/// Outcome of one alpha / beta round on a component.
enum Round {
    Converged(BTreeSet<Path>),
    Shrunk(Graph),
    Unreachable,
}

impl AnalysisSession {
    /// Over-approximates the pairs reachable under both grammars.
    ///
    /// With `target`, only that pair is decided: the result is `{target}` or
    /// empty.
    pub fn mutual_refinement(&mut self, graph: &Graph, target: Option<Path>) -> BTreeSet<Path> {
        if let Some(t) = target {
            if !graph.contains_vertex(t.start) || !graph.contains_vertex(t.end) {
                return BTreeSet::new();
            }
        }

        let mut result = BTreeSet::new();
        let mut pending = vec![graph.clone()];
        let mut rounds = 0usize;

        while let Some(current) = pending.pop() {
            let mut matched = false;
            for component in split_components(&current) {
                let component = match target {
                    Some(t) => {
                        if !component.contains_vertex(t.start) || !component.contains_vertex(t.end) {
                            continue;
                        }
                        restrict_to_pairs(&component, &[t])
                    }
                    None => component,
                };
                matched = true;
                if component.is_trivial() {
                    if target.is_some() {
                        return BTreeSet::new();
                    }
                    continue;
                }

                rounds += 1;
                match self.refine_component(&component, target) {
                    Round::Converged(paths) => result.extend(paths),
                    Round::Shrunk(next) => pending.push(next),
                    Round::Unreachable => return BTreeSet::new(),
                }
            }
            if target.is_some() && !matched {
                return BTreeSet::new();
            }
        }

        tracing::debug!(
            rounds,
            paths = result.len(),
            single_pair = target.is_some(),
            "mutual refinement converged"
        );
        result
    }

    fn refine_component(&mut self, component: &Graph, target: Option<Path>) -> Round {
        let alpha_input = dyck_component(component);
        let old_edges = alpha_input.graph.edge_count();

        let alpha = self.alpha_paths(&alpha_input);
        let alpha_paths = match target {
            Some(t) if !alpha.paths.contains(&t) => return Round::Unreachable,
            Some(t) => vec![t],
            None => alpha.paths.clone(),
        };
        let alpha_edges = alpha.provenance.supporting_edges(&alpha_paths);
        let beta_input = dyck_component(&graph_from_edges(&alpha_edges));

        let beta = self.beta_paths(&beta_input);
        let mut beta_paths = match target {
            Some(t) if !beta.paths.contains(&t) => return Round::Unreachable,
            Some(t) => vec![t],
            None => beta.paths.clone(),
        };
        let beta_edges = beta.provenance.supporting_edges(&beta_paths);
        let mut shrunk = graph_from_edges(&beta_edges);

        if self.family() == AnalysisFamily::ValueFlow {
            beta_paths = filter_bracket_paths(&shrunk, &beta_paths);
            if target.is_some() && beta_paths.is_empty() {
                return Round::Unreachable;
            }
            shrunk = remove_valueflow_unreachable(&shrunk);
        }

        let next = dyck_component(&shrunk).graph;
        let current_edges = next.edge_count();
        tracing::trace!(old_edges, current_edges, "refinement round");

        if current_edges == 0 || current_edges >= old_edges {
            let beta_set: BTreeSet<Path> = beta_paths.into_iter().collect();
            let converged = alpha_paths
                .into_iter()
                .filter(|p| !p.is_reflexive() && beta_set.contains(p))
                .filter(|p| target.map_or(true, |t| *p == t))
                .collect();
            Round::Converged(converged)
        } else {
            Round::Shrunk(next)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::graph::Vertex;

    fn session() -> AnalysisSession {
        AnalysisSession::new(SessionConfig::default())
    }

    fn v(raw: u64) -> Vertex {
        Vertex(raw)
    }

    /// `op--1 ob--2 cp--1 cb--2` is balanced per family but crosses.
    fn crossing() -> Graph {
        Graph::linear(["op--1", "ob--2", "cp--1", "cb--2"])
    }

    #[test]
    fn matched_path_survives_refinement() {
        let g = Graph::linear(["op--1", "ob--2", "cb--2", "cp--1"]);
        let paths = session().mutual_refinement(&g, None);
        assert!(paths.contains(&Path::from((0, 4))));
        assert!(paths.contains(&Path::from((1, 3))));
        assert!(!paths.contains(&Path::from((0, 1))));
    }

    #[test]
    fn crossing_brackets_pass_both_grammars() {
        // Each family is balanced on its own, so the alternation cannot rule
        // the pair out.
        let paths = session().mutual_refinement(&crossing(), None);
        assert!(paths.contains(&Path::from((0, 4))));
    }

    #[test]
    fn single_pair_answers_only_that_pair() {
        let g = Graph::linear(["op--1", "normal", "cp--1", "normal"]);
        let mut s = session();
        let t = Path::from((0, 3));
        assert_eq!(s.mutual_refinement(&g, Some(t)), [t].into_iter().collect());
        assert!(s.mutual_refinement(&g, Some(Path::from((0, 2)))).is_empty());
        assert!(s.mutual_refinement(&g, Some(Path::new(v(0), v(42)))).is_empty());
    }

    #[test]
    fn separate_components_are_refined_independently() {
        let mut g = Graph::linear(["op--1", "cp--1"]);
        g.add_edge(v(10), v(11), "ob--3");
        g.add_edge(v(11), v(12), "cb--3");
        g.add_edge(v(20), v(21), "op--9");
        let paths = session().mutual_refinement(&g, None);
        assert!(paths.contains(&Path::from((0, 2))));
        assert!(paths.contains(&Path::from((10, 12))));
        assert!(!paths.iter().any(|p| p.start == v(20)));
    }
}
