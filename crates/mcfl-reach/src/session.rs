//! Analysis session: grammar mode, family split and the memo tables of the
//! alpha / beta solver runs.
//!
//! Results are keyed by [`Graph::content_hash`]. They depend on the grammar
//! mode, so switching modes empties the tables.

use crate::config::{AnalysisFamily, SessionConfig};
use crate::graph::{Graph, Path};
use crate::provenance::Provenance;
use crate::solver::{solve, SolverOptions};
use crate::transform::DyckComponent;
use ahash::AHashMap;
use mcfl_grammar::{DyckGrammars, GrammarMode};
use serde::Serialize;
use std::sync::Arc;

/// Paths of one alpha or beta run and the provenance that supports them.
#[derive(Debug, Default)]
pub struct SolvedGrammar {
    pub paths: Vec<Path>,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub solver_runs: usize,
    pub memo_hits: usize,
    pub memo_clears: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Alpha,
    Beta,
}

#[derive(Debug)]
pub struct AnalysisSession {
    config: SessionConfig,
    mode: GrammarMode,
    alpha_memo: AHashMap<u64, Arc<SolvedGrammar>>,
    beta_memo: AHashMap<u64, Arc<SolvedGrammar>>,
    stats: SessionStats,
}

impl AnalysisSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            mode: config.mode,
            config,
            alpha_memo: AHashMap::new(),
            beta_memo: AHashMap::new(),
            stats: SessionStats::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn family(&self) -> AnalysisFamily {
        self.config.family
    }

    pub fn mode(&self) -> GrammarMode {
        self.mode
    }

    /// Switches the grammar mode; memoized results of the old mode are dropped.
    pub fn set_mode(&mut self, mode: GrammarMode) {
        if mode != self.mode {
            self.mode = mode;
            self.clear_memo();
        }
    }

    pub fn clear_memo(&mut self) {
        self.alpha_memo.clear();
        self.beta_memo.clear();
        self.stats.memo_clears += 1;
    }

    pub fn memo_len(&self) -> usize {
        self.alpha_memo.len() + self.beta_memo.len()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn grammars(&self) -> DyckGrammars {
        self.config.grammars(self.mode)
    }

    pub fn alpha_paths(&mut self, component: &DyckComponent) -> Arc<SolvedGrammar> {
        self.solved(Side::Alpha, component)
    }

    pub fn beta_paths(&mut self, component: &DyckComponent) -> Arc<SolvedGrammar> {
        self.solved(Side::Beta, component)
    }

    fn solved(&mut self, side: Side, component: &DyckComponent) -> Arc<SolvedGrammar> {
        let key = component.graph.content_hash();
        let memo = match side {
            Side::Alpha => &self.alpha_memo,
            Side::Beta => &self.beta_memo,
        };
        if let Some(hit) = memo.get(&key) {
            tracing::trace!(key, ?side, "memoized grammar run");
            self.stats.memo_hits += 1;
            return Arc::clone(hit);
        }

        let grammars = self.grammars();
        let grammar = match side {
            Side::Alpha => grammars.alpha(&component.ids),
            Side::Beta => grammars.beta(&component.ids),
        };
        let run = solve(&component.graph, &grammar, SolverOptions::default());
        self.stats.solver_runs += 1;

        let mut provenance = run.provenance.unwrap_or_default();
        provenance.retain_supporting(&run.paths);
        let solved = Arc::new(SolvedGrammar {
            paths: run.paths,
            provenance,
        });
        let memo = match side {
            Side::Alpha => &mut self.alpha_memo,
            Side::Beta => &mut self.beta_memo,
        };
        memo.insert(key, Arc::clone(&solved));
        solved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::dyck_component;

    fn matched() -> DyckComponent {
        dyck_component(&Graph::linear(["op--1", "normal", "cp--1"]))
    }

    #[test]
    fn repeated_runs_hit_the_memo() {
        let mut session = AnalysisSession::new(SessionConfig::default());
        let first = session.alpha_paths(&matched());
        let second = session.alpha_paths(&matched());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(session.stats().solver_runs, 1);
        assert_eq!(session.stats().memo_hits, 1);
        assert!(first.paths.contains(&Path::from((0, 3))));
    }

    #[test]
    fn switching_mode_clears_the_memo() {
        let mut session = AnalysisSession::new(SessionConfig::default());
        session.beta_paths(&matched());
        assert_eq!(session.memo_len(), 1);
        session.set_mode(GrammarMode::Classic);
        assert_eq!(session.memo_len(), 1);
        session.set_mode(GrammarMode::Augmented);
        assert_eq!(session.memo_len(), 0);
        assert_eq!(session.mode(), GrammarMode::Augmented);
    }

    #[test]
    fn alpha_and_beta_memos_are_separate() {
        let mut session = AnalysisSession::new(SessionConfig::default());
        let alpha = session.alpha_paths(&matched());
        let beta = session.beta_paths(&matched());
        assert!(!Arc::ptr_eq(&alpha, &beta));
        assert_eq!(session.stats().solver_runs, 2);
    }
}
