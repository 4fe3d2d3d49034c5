//! The staged analysis: cheap bounds first, then mutual refinement on a
//! condensed graph, then per-pair refinement of whatever is still undecided.

use crate::config::{AnalysisFamily, SessionConfig};
use crate::graph::{Graph, Path, Vertex};
use crate::session::AnalysisSession;
use crate::solver::{solve, SolverOptions};
use crate::transform::{
    dyck_component, dyck_component_naive, filter_bracket_paths, multiply_by_automaton,
    project_automaton_paths, project_valueflow_paths, remove_valueflow_unreachable,
    restrict_to_pairs, split_components, triple_valueflow, Condensation,
};
use ahash::AHashMap;
use mcfl_grammar::dyck::interleaved;
use mcfl_grammar::GrammarMode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Path sets of every stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageResults {
    pub regularization: BTreeSet<Path>,
    pub intersection: BTreeSet<Path>,
    pub under_approximation: BTreeSet<Path>,
    pub classic: BTreeSet<Path>,
    pub augmented: BTreeSet<Path>,
    pub on_demand: BTreeSet<Path>,
}

impl StageResults {
    pub fn report(&self) -> AnalysisReport {
        AnalysisReport {
            regularization: self.regularization.len(),
            intersection: self.intersection.len(),
            under_approximation: self.under_approximation.len(),
            mutual_refinement: self.classic.len(),
            stronger_grammar: self.augmented.len(),
            on_demand: self.on_demand.len(),
        }
    }
}

/// Stage counts of one analyzed input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub regularization: usize,
    pub intersection: usize,
    pub under_approximation: usize,
    pub mutual_refinement: usize,
    pub stronger_grammar: usize,
    pub on_demand: usize,
}

impl AnalysisReport {
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("Regularization: {}", self.regularization),
            format!("Intersection: {}", self.intersection),
            format!("Underapproximation: {}", self.under_approximation),
            format!("Mutual refinement: {}", self.mutual_refinement),
            format!("Stronger Grammar: {}", self.stronger_grammar),
            format!("On-Demand: {}", self.on_demand),
        ]
    }
}

impl std::fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for line in self.lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct Pipeline {
    session: AnalysisSession,
}

impl Pipeline {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            session: AnalysisSession::new(config),
        }
    }

    pub fn session(&self) -> &AnalysisSession {
        &self.session
    }

    fn family(&self) -> AnalysisFamily {
        self.session.family()
    }

    pub fn run(&mut self, input: &Graph) -> StageResults {
        let mut graph = match self.family() {
            AnalysisFamily::ValueFlow => remove_valueflow_unreachable(input),
            AnalysisFamily::Taint => input.clone(),
        };

        let regularization = self.regularization(&graph);
        tracing::info!(paths = regularization.len(), "regularization");

        let intersection = self.intersection(&graph);
        tracing::info!(paths = intersection.len(), "intersection");
        graph = shrink_to(&graph, &intersection);

        let under = self.under_approximation(&graph);
        tracing::info!(paths = under.len(), "under-approximation");

        self.session.clear_memo();
        self.session.set_mode(GrammarMode::Classic);
        let classic: BTreeSet<Path> = self
            .refine_condensed(&graph, &under)
            .intersection(&intersection)
            .copied()
            .collect();
        tracing::info!(paths = classic.len(), "classic mutual refinement");
        graph = shrink_to(&graph, &classic);

        self.session.clear_memo();
        self.session.set_mode(GrammarMode::Augmented);
        let augmented: BTreeSet<Path> = self
            .refine_condensed(&graph, &under)
            .intersection(&classic)
            .copied()
            .collect();
        tracing::info!(paths = augmented.len(), "augmented mutual refinement");
        graph = shrink_to(&graph, &augmented);

        let on_demand = self.on_demand(&graph, &under, &augmented);
        tracing::info!(paths = on_demand.len(), "on-demand refinement");
        tracing::debug!(stats = ?self.session.stats(), "session totals");

        StageResults {
            regularization,
            intersection,
            under_approximation: under,
            classic,
            augmented,
            on_demand,
        }
    }

    /// Alpha grammar over the product with the automaton of the other family.
    fn regularization(&self, graph: &Graph) -> BTreeSet<Path> {
        let alpha = self.session.config().grammars(GrammarMode::Classic);
        let automaton_family = alpha.alpha_family.other();
        let mut out = BTreeSet::new();
        for component in split_components(graph) {
            if component.is_trivial() {
                continue;
            }
            let dc = dyck_component_naive(&component);
            let ids = dc.ids.ids(automaton_family);
            let product = multiply_by_automaton(&dc.graph, automaton_family, ids, self.family());
            let run = solve(&product.graph, &alpha.alpha(&dc.ids), SolverOptions::without_provenance());
            out.extend(project_automaton_paths(&product, &run.paths, self.family()));
        }
        out
    }

    /// One alpha run and one beta run per component, intersected.
    fn intersection(&self, graph: &Graph) -> BTreeSet<Path> {
        let grammars = self.session.config().grammars(GrammarMode::Classic);
        let mut alpha_paths = Vec::new();
        let mut beta_paths = BTreeSet::new();
        let mut wrapped = BTreeSet::new();

        for component in split_components(graph) {
            if component.is_trivial() {
                continue;
            }
            let dc = dyck_component_naive(&component);
            let alpha = solve(&dc.graph, &grammars.alpha(&dc.ids), SolverOptions::without_provenance());

            let dc = dyck_component_naive(&restrict_to_pairs(&dc.graph, &alpha.paths));
            let beta = solve(&dc.graph, &grammars.beta(&dc.ids), SolverOptions::without_provenance());

            if self.family() == AnalysisFamily::ValueFlow {
                wrapped.extend(filter_bracket_paths(&component, &beta.paths));
            }
            alpha_paths.extend(alpha.paths);
            beta_paths.extend(beta.paths);
        }

        alpha_paths
            .into_iter()
            .filter(|p| !p.is_reflexive() && beta_paths.contains(p))
            .filter(|p| self.family() != AnalysisFamily::ValueFlow || wrapped.contains(p))
            .collect()
    }

    /// Interleaved Dyck reachability; sound for both families at once.
    fn under_approximation(&self, graph: &Graph) -> BTreeSet<Path> {
        let working = dyck_component_naive(graph).graph;
        let tripled = match self.family() {
            AnalysisFamily::ValueFlow => Some(triple_valueflow(&working)),
            AnalysisFamily::Taint => None,
        };
        let solved_on = tripled.as_ref().map_or(&working, |t| &t.graph);

        let mut found = BTreeSet::new();
        for component in split_components(solved_on) {
            if component.is_trivial() {
                continue;
            }
            let dc = dyck_component(&component);
            let grammar = interleaved(&dc.ids.parenthesis, &dc.ids.bracket);
            let run = solve(&dc.graph, &grammar, SolverOptions::without_provenance());
            found.extend(run.paths.into_iter().filter(|p| !p.is_reflexive()));
        }

        match &tripled {
            Some(tripled) => project_valueflow_paths(tripled, &found),
            None => found,
        }
    }

    /// Mutual refinement on the condensation by `under`, lifted back.
    fn refine_condensed(&mut self, graph: &Graph, under: &BTreeSet<Path>) -> BTreeSet<Path> {
        let condensation = Condensation::from_under_approximation(graph, under);
        tracing::debug!(
            vertices = graph.vertex_count(),
            condensed = condensation.graph.vertex_count(),
            merged = condensation.merged_vertex_count(),
            "condensed by under-approximation"
        );
        let refined = self.session.mutual_refinement(&condensation.graph, None);
        condensation.expand(refined.iter().filter(|p| !p.is_reflexive()))
    }

    /// Decides every pair of `over` not already in `under` one at a time.
    ///
    /// Pairs whose endpoints are both representatives go first; the rest are
    /// answered through their representative pair.
    fn on_demand(
        &mut self,
        graph: &Graph,
        under: &BTreeSet<Path>,
        over: &BTreeSet<Path>,
    ) -> BTreeSet<Path> {
        let condensation = Condensation::from_under_approximation(graph, under);
        let lift = |p: &Path| {
            Path::new(
                condensation.representative(p.start),
                condensation.representative(p.end),
            )
        };

        let mut roots: BTreeMap<Vertex, Vec<Path>> = BTreeMap::new();
        let mut derived = Vec::new();
        for p in over.difference(under) {
            if lift(p) == *p {
                roots.entry(p.start).or_default().push(*p);
            } else {
                derived.push(*p);
            }
        }
        let queue: Vec<Path> = roots.into_values().flatten().chain(derived).collect();

        let interval = self.session.config().cache_clear_interval.max(1);
        let mut decided: AHashMap<Path, bool> = AHashMap::new();
        let mut confirmed = under.clone();
        for (i, p) in queue.iter().enumerate() {
            if i % interval == 0 {
                self.session.clear_memo();
            }
            let rep = lift(p);
            let reachable = if rep.is_reflexive() {
                true
            } else if let Some(&known) = decided.get(&rep) {
                known
            } else {
                let answer = !self
                    .session
                    .mutual_refinement(&condensation.graph, Some(rep))
                    .is_empty();
                decided.insert(rep, answer);
                answer
            };
            if reachable {
                confirmed.insert(*p);
            }
        }
        tracing::debug!(
            queried = queue.len(),
            decided = decided.len(),
            confirmed = confirmed.len() - under.len(),
            "on-demand queries"
        );
        confirmed
    }
}

/// Restricts to edges on `paths` and drops unmatched brackets.
fn shrink_to(graph: &Graph, paths: &BTreeSet<Path>) -> Graph {
    let targets: Vec<Path> = paths.iter().copied().collect();
    dyck_component(&restrict_to_pairs(graph, &targets)).graph
}
