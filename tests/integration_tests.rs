//! Integration tests across the workspace
//!
//! These tests drive the crates the way the CLI does:
//! - graph file → Pipeline → report lines / result files
//! - grammar text → normalizer → solver → path file
//! - session config file → value-flow analysis
//!
//! Run with: cargo test --test integration_tests

use mcfl_grammar::{load_grammar, NormalFormCheck};
use mcfl_reach::text_format::{
    linear_graph, parse_paths, read_graph, read_graph_with, read_paths, write_graph, write_paths,
    LabelStyle,
};
use mcfl_reach::{solve, AnalysisReport, Path, Pipeline, SessionConfig, SolverOptions};
use std::collections::BTreeSet;
use tempfile::tempdir;

const CALL_GRAPH: &str = r#"digraph callgraph {
0->1[label="op--1"]
1->2[label="normal"]
2->3[label="cp--1"]
4->1[label="op--2"]
2->5[label="cp--2"]
3->6[label="ob--7"]
6->7[label="normal"]
7->8[label="cb--7"]
}
"#;

// ============================================================================
// Graph files through the pipeline
// ============================================================================

#[test]
fn test_pipeline_from_graph_file() {
    let dir = tempdir().expect("tempdir");
    let file = dir.path().join("callgraph.dot");
    std::fs::write(&file, CALL_GRAPH).expect("write graph");

    let graph = read_graph(&file).expect("should read");
    assert_eq!(graph.vertex_count(), 9);

    let results = Pipeline::new(SessionConfig::default()).run(&graph);
    let expected: BTreeSet<Path> = [(1, 2), (6, 7), (0, 3), (4, 5), (3, 8), (0, 8)]
        .into_iter()
        .map(Path::from)
        .collect();
    assert_eq!(results.on_demand, expected);
    assert!(results.on_demand.is_subset(&results.intersection));

    let report = results.report();
    let lines = report.lines();
    assert_eq!(lines[5], "On-Demand: 6");
    assert!(lines[0].starts_with("Regularization: "));
}

#[test]
fn test_report_serializes_to_json() {
    let graph = linear_graph("op--1 ob--2 cb--2 cp--1");
    let report = Pipeline::new(SessionConfig::default()).run(&graph).report();
    let json = serde_json::to_string(&report).expect("should serialize");
    let back: AnalysisReport = serde_json::from_str(&json).expect("should parse");
    assert_eq!(back, report);
    assert!(json.contains("\"on_demand\""));
}

#[test]
fn test_written_graph_gives_same_results() {
    let dir = tempdir().expect("tempdir");
    let original = mcfl_reach::text_format::parse_graph(CALL_GRAPH);
    let file = dir.path().join("copy.txt");
    std::fs::write(&file, write_graph(&original)).expect("write graph");
    let copy = read_graph(&file).expect("should read");

    let a = Pipeline::new(SessionConfig::default()).run(&original);
    let b = Pipeline::new(SessionConfig::default()).run(&copy);
    assert_eq!(a, b);
}

#[test]
fn test_value_flow_config_file() {
    let dir = tempdir().expect("tempdir");
    let config_file = dir.path().join("session.json");
    std::fs::write(
        &config_file,
        r#"{ "family": "value_flow", "cache_clear_interval": 1 }"#,
    )
    .expect("write config");
    let config = SessionConfig::from_json_file(&config_file).expect("should load");

    let graph = mcfl_reach::text_format::parse_graph(
        "10->11[label=\"ob--0\"]\n11->12[label=\"op--3\"]\n12->13[label=\"cp--3\"]\n13->14[label=\"cb--0\"]\n",
    );
    let results = Pipeline::new(config).run(&graph);
    assert!(results.on_demand.contains(&Path::from((10, 14))));
    assert!(!results.on_demand.contains(&Path::from((11, 13))));
}

// ============================================================================
// Grammar text through the solver
// ============================================================================

#[test]
fn test_grammar_file_to_path_file() {
    let dir = tempdir().expect("tempdir");
    let grammar = load_grammar(
        &NormalFormCheck,
        "A(a).
         B(b).
         S(X0 Y0) :- A(X0), B(Y0).
         S(X0 Y0 Z0) :- A(X0), S(Y0), B(Z0).",
    )
    .expect("should parse");

    // a^n b^n over a path graph
    let graph = linear_graph("aaabbb");
    let reach = solve(&graph, &grammar, SolverOptions::without_provenance());
    let paths_file = dir.path().join("paths.txt");
    std::fs::write(&paths_file, write_paths(&reach.paths)).expect("write paths");

    let read: BTreeSet<Path> = read_paths(&paths_file).expect("should read").into_iter().collect();
    let expected: BTreeSet<Path> = [(2, 4), (1, 5), (0, 6)].into_iter().map(Path::from).collect();
    assert_eq!(read, expected);
}

#[test]
fn test_collapsed_labels_feed_letter_grammars() {
    let dir = tempdir().expect("tempdir");
    let file = dir.path().join("brackets.dot");
    std::fs::write(
        &file,
        "0->1[label=\"ob--4\"]\n1->2[label=\"normal\"]\n2->3[label=\"cb--9\"]\n",
    )
    .expect("write graph");
    let graph = read_graph_with(&file, LabelStyle::Collapsed).expect("should read");

    // ids are gone, so a / A match regardless of their original ids;
    // `normal` became an epsilon edge
    let grammar = load_grammar(
        &NormalFormCheck,
        "Open(a).
         Close(A).
         Gap(eps).
         S(X0 Y0 Z0) :- Open(X0), Gap(Y0), Close(Z0).",
    )
    .expect("should parse");
    let reach = solve(&graph, &grammar, SolverOptions::default());
    assert!(reach.contains(&Path::from((0, 3))));
}

#[test]
fn test_path_text_ignores_noise() {
    let paths = parse_paths("1 2\n# comment\n3\n4 5 extra\n");
    assert_eq!(paths, vec![Path::from((1, 2)), Path::from((4, 5))]);
}
