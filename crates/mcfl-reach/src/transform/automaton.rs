//! Product with a finite bracket automaton.
//!
//! The regularization baseline replaces one bracket family by a small
//! automaton that only checks a bounded amount of matching, leaving the other
//! family to the grammar. Each input vertex gets one copy per automaton state
//! (see [`LayeredGraph`]); bracket edges of the automaton's family turn into
//! `normal` transitions.

use crate::config::AnalysisFamily;
use crate::graph::{Graph, Path};
use crate::transform::layered::LayeredGraph;
use ahash::AHashMap;
use mcfl_grammar::dyck::NORMAL_LABEL;
use mcfl_grammar::{BracketFamily, DyckLabel};
use std::collections::BTreeSet;

/// Value-flow automaton: states 0 (before), 1-2 (outside, after a close),
/// 3-5 (inside a source bracket).
const VALUE_FLOW_STATES: u64 = 6;
const VALUE_FLOW_OPEN: &[(u64, u64)] = &[(0, 3), (1, 3), (2, 3), (3, 4), (4, 4), (5, 4)];
const VALUE_FLOW_CLOSE: &[(u64, u64)] = &[(3, 2), (4, 5), (5, 5)];
const VALUE_FLOW_OTHER: &[(u64, u64)] = &[(1, 1), (2, 1), (3, 3), (4, 4), (5, 4)];
const VALUE_FLOW_ACCEPT: &[u64] = &[2, 5];

fn state_count(ids: &[u32], analysis: AnalysisFamily) -> u64 {
    match analysis {
        AnalysisFamily::ValueFlow => VALUE_FLOW_STATES,
        AnalysisFamily::Taint => ids.len() as u64 + 2,
    }
}

/// Product of `graph` with the automaton over `family` brackets.
///
/// For taint, state 0 is balanced, state `i + 1` has `ids[i]` open and state
/// `k - 1` is the overflow sink.
pub fn multiply_by_automaton(
    graph: &Graph,
    family: BracketFamily,
    ids: &[u32],
    analysis: AnalysisFamily,
) -> LayeredGraph {
    let k = state_count(ids, analysis);
    let state_of: AHashMap<u32, u64> = ids
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, i as u64 + 1))
        .collect();

    let mut out = LayeredGraph::over(graph, k);
    for e in graph.edges() {
        if e.is_epsilon_loop() {
            continue;
        }
        let (from, to) = (e.from, e.to);
        let label = DyckLabel::parse(&e.label);
        let bracket = label.bracket().filter(|(f, _)| *f == family);
        match (analysis, label, bracket) {
            (AnalysisFamily::ValueFlow, DyckLabel::Open(..), Some(_)) => {
                for &(p, q) in VALUE_FLOW_OPEN {
                    out.connect((from, p), (to, q), NORMAL_LABEL);
                }
            }
            (AnalysisFamily::ValueFlow, DyckLabel::Close(..), Some(_)) => {
                for &(p, q) in VALUE_FLOW_CLOSE {
                    out.connect((from, p), (to, q), NORMAL_LABEL);
                }
            }
            (AnalysisFamily::ValueFlow, _, _) => {
                for &(p, q) in VALUE_FLOW_OTHER {
                    out.connect((from, p), (to, q), &e.label);
                }
            }
            (AnalysisFamily::Taint, DyckLabel::Open(..), Some((_, id))) => {
                for q in 1..k {
                    out.connect((from, q), (to, k - 1), NORMAL_LABEL);
                }
                let pending = state_of.get(&id).copied().unwrap_or(0);
                out.connect((from, 0), (to, pending), NORMAL_LABEL);
            }
            (AnalysisFamily::Taint, DyckLabel::Close(..), Some((_, id))) => {
                let pending = state_of.get(&id).copied().unwrap_or(0);
                out.connect((from, pending), (to, 0), NORMAL_LABEL);
                out.connect((from, k - 1), (to, k - 1), NORMAL_LABEL);
            }
            (AnalysisFamily::Taint, _, _) => {
                for q in 0..k {
                    out.connect((from, q), (to, q), &e.label);
                }
            }
        }
    }
    out
}

/// Maps product paths from state 0 to an accepting state back to the input.
///
/// Taint accepts the balanced and the overflow state.
pub fn project_automaton_paths<'a, I>(
    product: &LayeredGraph,
    paths: I,
    analysis: AnalysisFamily,
) -> BTreeSet<Path>
where
    I: IntoIterator<Item = &'a Path>,
{
    let k = product.layers();
    match analysis {
        AnalysisFamily::ValueFlow => product.project(paths, 0, |q| VALUE_FLOW_ACCEPT.contains(&q)),
        AnalysisFamily::Taint => product.project(paths, 0, |q| q == 0 || q == k - 1),
    }
}
