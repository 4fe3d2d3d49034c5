//! Solver behaviour on Dyck grammars and hand-written clause sets.

use mcfl_grammar::dyck::{balanced, interleaved};
use mcfl_grammar::{parse_normal_form, BracketFamily, DyckGrammars, DyckIds};
use mcfl_reach::text_format::parse_graph;
use mcfl_reach::transform::{dyck_component, graph_from_edges};
use mcfl_reach::{solve, Graph, Path, SolverOptions, Vertex};
use std::collections::BTreeSet;

fn path(s: u64, e: u64) -> Path {
    Path::from((s, e))
}

fn bracket_grammar(ids: &[u32]) -> mcfl_grammar::Mcfg {
    balanced(BracketFamily::Bracket, ids, BracketFamily::Parenthesis, &[])
}

// ============================================================================
// Balanced brackets
// ============================================================================

#[test]
fn test_open_then_close_is_reachable() {
    let g = parse_graph("0->1[label=\"ob--0\"]\n1->2[label=\"cb--0\"]\n");
    let r = solve(&g, &bracket_grammar(&[0]), SolverOptions::default());
    assert!(r.contains(&path(0, 2)));
    assert!(!r.contains(&path(0, 1)));
}

#[test]
fn test_two_opens_are_not_reachable() {
    let g = parse_graph("0->1[label=\"ob--0\"]\n1->2[label=\"ob--0\"]\n");
    let r = solve(&g, &bracket_grammar(&[0]), SolverOptions::default());
    assert!(!r.contains(&path(0, 2)));
    assert!(r.paths.iter().all(Path::is_reflexive));
}

#[test]
fn test_mismatched_ids_do_not_close() {
    let g = Graph::linear(["ob--1", "cb--2"]);
    let r = solve(&g, &bracket_grammar(&[1, 2]), SolverOptions::default());
    assert!(!r.contains(&path(0, 2)));
}

#[test]
fn test_nested_and_sequenced_brackets() {
    let g = Graph::linear(["ob--1", "ob--2", "cb--2", "normal", "cb--1", "ob--3", "cb--3"]);
    let r = solve(&g, &bracket_grammar(&[1, 2, 3]), SolverOptions::default());
    for p in [path(1, 3), path(1, 4), path(0, 5), path(5, 7), path(0, 7), path(3, 4)] {
        assert!(r.contains(&p), "missing {p}");
    }
    assert!(!r.contains(&path(0, 3)));
}

#[test]
fn test_cycle_allows_repeated_matching() {
    // 0 -ob--1-> 1 -normal-> 0, 1 -cb--1-> 2: any number of opens needs as many closes
    let mut g = Graph::new();
    g.add_edge(Vertex(0), Vertex(1), "ob--1");
    g.add_edge(Vertex(1), Vertex(0), "normal");
    g.add_edge(Vertex(1), Vertex(2), "cb--1");
    let r = solve(&g, &bracket_grammar(&[1]), SolverOptions::default());
    assert!(r.contains(&path(0, 2)));
    assert!(r.contains(&path(1, 0)));
    assert!(!r.contains(&path(0, 1)));
}

#[test]
fn test_interleaved_needs_both_families_matched() {
    let proper = Graph::linear(["op--1", "ob--2", "cb--2", "cp--1"]);
    let crossing = Graph::linear(["op--1", "ob--2", "cp--1", "cb--2"]);
    let grammar = interleaved(&[1], &[2]);
    assert!(solve(&proper, &grammar, SolverOptions::default()).contains(&path(0, 4)));
    assert!(!solve(&crossing, &grammar, SolverOptions::default()).contains(&path(0, 4)));
}

#[test]
fn test_augmented_grammar_keeps_classic_answers_on_balanced_words() {
    let g = Graph::linear(["op--1", "ob--2", "cb--2", "cp--1"]);
    let dc = dyck_component(&g);
    let classic = DyckGrammars::classic(BracketFamily::Parenthesis);
    let augmented = DyckGrammars {
        mode: mcfl_grammar::GrammarMode::Augmented,
        ..classic
    };
    let a = solve(&dc.graph, &classic.alpha(&dc.ids), SolverOptions::without_provenance());
    let b = solve(&dc.graph, &augmented.alpha(&dc.ids), SolverOptions::without_provenance());
    assert!(a.contains(&path(0, 4)));
    assert!(b.contains(&path(0, 4)));
    assert!(b.path_set().is_subset(&a.path_set()));
}

// ============================================================================
// Clause-level grammars
// ============================================================================

#[test]
fn test_two_dimensional_copy_language() {
    // S accepts w w for w over {a, b}; D(X, Y) spans two equal words.
    let grammar = parse_normal_form(
        "Da(a).
         Db(b).
         D(X0, a) :- Da(X0).
         D(X0, b) :- Db(X0).
         D(X0 Y0, X1 Y1) :- D(X0, X1), D(Y0, Y1).
         S(X0 X1) :- D(X0, X1).",
    )
    .expect("should parse");
    assert_eq!(grammar.dimension(), 2);

    let yes = Graph::linear(["a", "b", "a", "b"]);
    let no = Graph::linear(["a", "b", "b", "a"]);
    assert!(solve(&yes, &grammar, SolverOptions::default()).contains(&path(0, 4)));
    assert!(!solve(&no, &grammar, SolverOptions::default()).contains(&path(0, 4)));
}

#[test]
fn test_paths_are_unique_and_start_symbol_only() {
    let g = Graph::linear(["a", "a"]);
    let grammar = parse_normal_form("A(a).\nS(X0 Y0) :- A(X0), A(Y0).\nS(X0 Y0) :- A(X0), A(Y0).")
        .expect("should parse");
    let r = solve(&g, &grammar, SolverOptions::default());
    assert_eq!(r.paths, vec![path(0, 2)]);
    assert_eq!(r.derivations.derivations_of("A").len(), 2);
}

#[test]
fn test_supporting_edges_reproduce_results() {
    let g = Graph::linear(["ob--1", "normal", "cb--1", "ob--2", "normal"]);
    let grammar = bracket_grammar(&[1, 2]);
    let first = solve(&g, &grammar, SolverOptions::default());
    let targets: Vec<Path> = first.paths.iter().copied().filter(|p| !p.is_reflexive()).collect();
    let edges = first
        .provenance
        .as_ref()
        .expect("provenance recorded")
        .supporting_edges(&targets);
    assert!(edges.iter().all(|e| e.label != "ob--2"));

    let again = solve(&graph_from_edges(&edges), &grammar, SolverOptions::default());
    let non_reflexive = |r: &mcfl_reach::Reachability| -> BTreeSet<Path> {
        r.paths.iter().copied().filter(|p| !p.is_reflexive()).collect()
    };
    assert_eq!(non_reflexive(&again), targets.into_iter().collect());
}

#[test]
fn test_dyck_ids_drive_grammar_letters() {
    let ids = DyckIds {
        parenthesis: vec![3],
        bracket: vec![],
    };
    let grammar = DyckGrammars::classic(BracketFamily::Bracket).alpha(&ids);
    // brackets are balanced, parentheses are free letters
    let g = Graph::linear(["op--3", "op--3"]);
    assert!(solve(&g, &grammar, SolverOptions::default()).contains(&path(0, 2)));
}
