//! Semi-naive worklist fixpoint for normal-form MCFGs over a labeled graph.
//!
//! Every accepted derivation is appended to the [`DerivationTable`]; the table's
//! acceptance order is the FIFO worklist. Popping a derivation fires every rule
//! whose body mentions its nonterminal. A candidate is accepted when it is new
//! and its consecutive segments are joined at SCC level (the end of segment
//! `i` reaches the start of segment `i + 1`).

use crate::derivation::{
    BoundaryKey, BoundaryRole, Derivation, DerivationId, DerivationTable, NonterminalId,
    Nonterminals,
};
use crate::graph::{Edge, Endpoint, Graph, Path};
use crate::provenance::Provenance;
use crate::scc::SccIndex;
use ahash::AHashMap;
use mcfl_grammar::{Mcfg, SegmentRef, START_SYMBOL};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverOptions {
    /// Record contributing edges and antecedents for every derivation.
    pub record_provenance: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            record_provenance: true,
        }
    }
}

impl SolverOptions {
    pub fn without_provenance() -> Self {
        Self {
            record_provenance: false,
        }
    }
}

/// Output of one solver run.
#[derive(Debug, Clone, Default)]
pub struct Reachability {
    /// Start-symbol paths in discovery order.
    pub paths: Vec<Path>,
    pub derivations: DerivationTable,
    pub provenance: Option<Provenance>,
}

impl Reachability {
    pub fn path_set(&self) -> BTreeSet<Path> {
        self.paths.iter().copied().collect()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }
}

// ============================================================================
// Compiled grammar
// ============================================================================

#[derive(Debug)]
struct Unary {
    head: NonterminalId,
    label: String,
    index: usize,
}

#[derive(Debug)]
struct Concat {
    head: NonterminalId,
    bodies: Vec<NonterminalId>,
    wiring: Vec<Vec<SegmentRef>>,
    /// `(a, b)`: segment `a` ends where segment `b` starts.
    links: Vec<(SegmentRef, SegmentRef)>,
    /// Highest referenced segment + 1, per body position.
    min_arity: Vec<usize>,
}

/// Rules keyed by what triggers them.
#[derive(Debug, Default)]
struct CompiledGrammar {
    start: Option<NonterminalId>,
    basic: AHashMap<String, Vec<NonterminalId>>,
    prepend: AHashMap<NonterminalId, Vec<Unary>>,
    append: AHashMap<NonterminalId, Vec<Unary>>,
    insert: AHashMap<NonterminalId, Vec<Unary>>,
    concat: Vec<Concat>,
    /// body nonterminal -> (concat rule, body position)
    concat_uses: AHashMap<NonterminalId, Vec<(usize, usize)>>,
}

impl CompiledGrammar {
    fn compile(grammar: &Mcfg, names: &mut Nonterminals) -> Self {
        let mut c = CompiledGrammar {
            start: Some(names.intern(START_SYMBOL)),
            ..Default::default()
        };
        for r in &grammar.basic {
            let head = names.intern(&r.head);
            c.basic.entry(r.label.clone()).or_default().push(head);
        }
        for r in &grammar.prepend {
            let unary = Unary {
                head: names.intern(&r.head),
                label: r.label.clone(),
                index: r.index,
            };
            c.prepend.entry(names.intern(&r.body)).or_default().push(unary);
        }
        for r in &grammar.append {
            let unary = Unary {
                head: names.intern(&r.head),
                label: r.label.clone(),
                index: r.index,
            };
            c.append.entry(names.intern(&r.body)).or_default().push(unary);
        }
        for r in &grammar.insert {
            let unary = Unary {
                head: names.intern(&r.head),
                label: r.label.clone(),
                index: r.index,
            };
            c.insert.entry(names.intern(&r.body)).or_default().push(unary);
        }
        for r in &grammar.concatenate {
            if r.bodies.is_empty() || r.wiring.iter().any(Vec::is_empty) {
                continue;
            }
            let bodies: Vec<NonterminalId> = r.bodies.iter().map(|b| names.intern(b)).collect();
            let mut min_arity = vec![0usize; bodies.len()];
            let mut in_range = true;
            for s in r.wiring.iter().flatten() {
                match min_arity.get_mut(s.body) {
                    Some(n) => *n = (*n).max(s.segment + 1),
                    None => in_range = false,
                }
            }
            if !in_range {
                continue;
            }
            let rule = c.concat.len();
            for (pos, body) in bodies.iter().enumerate() {
                c.concat_uses.entry(*body).or_default().push((rule, pos));
            }
            c.concat.push(Concat {
                head: names.intern(&r.head),
                bodies,
                wiring: r.wiring.clone(),
                links: r.links().collect(),
                min_arity,
            });
        }
        c
    }
}

// ============================================================================
// Solver
// ============================================================================

struct Candidate {
    derivation: Derivation,
    edge: Option<Edge>,
    antecedents: Vec<DerivationId>,
}

struct State<'g> {
    graph: &'g Graph,
    scc: SccIndex,
    table: DerivationTable,
    provenance: Option<Provenance>,
    paths: Vec<Path>,
}

impl State<'_> {
    /// Consecutive segments must be joined in the underlying graph.
    fn consistent(&self, d: &Derivation) -> bool {
        d.segments
            .windows(2)
            .all(|w| self.scc.reaches(w[0].end, w[1].start))
    }

    fn offer(&mut self, candidate: Candidate) {
        if !self.consistent(&candidate.derivation) {
            return;
        }
        let (id, _) = self.table.insert(candidate.derivation);
        if let Some(provenance) = self.provenance.as_mut() {
            if let Some(edge) = &candidate.edge {
                provenance.record_edge(id, edge);
            }
            for a in candidate.antecedents {
                if a != id {
                    provenance.record_antecedent(id, a);
                }
            }
        }
    }
}

/// Computes every derivation of `grammar` over `graph`.
pub fn solve(graph: &Graph, grammar: &Mcfg, options: SolverOptions) -> Reachability {
    let mut names = Nonterminals::default();
    let compiled = CompiledGrammar::compile(grammar, &mut names);

    let mut state = State {
        graph,
        scc: SccIndex::build(graph),
        table: DerivationTable::with_nonterminals(names),
        provenance: options.record_provenance.then(Provenance::default),
        paths: Vec::new(),
    };

    for edge in graph.edges() {
        let Some(heads) = compiled.basic.get(&edge.label) else {
            continue;
        };
        for &head in heads {
            state.offer(Candidate {
                derivation: Derivation::new(head, vec![Path::new(edge.from, edge.to)]),
                edge: Some(edge.clone()),
                antecedents: Vec::new(),
            });
        }
    }

    let mut cursor = 0usize;
    let mut buffer = Vec::new();
    while cursor < state.table.len() {
        let id = DerivationId(cursor as u32);
        cursor += 1;
        let Some(d) = state.table.get(id).cloned() else {
            break;
        };

        if Some(d.nonterminal) == compiled.start && d.dimension() == 1 {
            let path = d.segments[0];
            state.paths.push(path);
            if let Some(provenance) = state.provenance.as_mut() {
                provenance.record_root(path, id);
            }
        }

        extend_prepend(&state, &compiled, id, &d, &mut buffer);
        extend_append(&state, &compiled, id, &d, &mut buffer);
        extend_insert(&state, &compiled, id, &d, &mut buffer);
        extend_concat(&state, &compiled, id, &d, &mut buffer);
        for candidate in buffer.drain(..) {
            state.offer(candidate);
        }
    }

    tracing::debug!(
        rules = grammar.len(),
        vertices = graph.vertex_count(),
        edges = graph.edge_count(),
        derivations = state.table.len(),
        paths = state.paths.len(),
        "solver reached fixpoint"
    );

    Reachability {
        paths: state.paths,
        derivations: state.table,
        provenance: state.provenance,
    }
}

fn extend_prepend(
    state: &State<'_>,
    grammar: &CompiledGrammar,
    id: DerivationId,
    d: &Derivation,
    out: &mut Vec<Candidate>,
) {
    for rule in grammar.prepend.get(&d.nonterminal).into_iter().flatten() {
        let Some(segment) = d.segments.get(rule.index) else {
            continue;
        };
        for &u in state.graph.sources(Endpoint::Vertex(segment.start), &rule.label).iter() {
            let mut segments = d.segments.clone();
            segments[rule.index].start = u;
            out.push(Candidate {
                derivation: Derivation::new(rule.head, segments),
                edge: Some(Edge::new(u, segment.start, rule.label.as_str())),
                antecedents: vec![id],
            });
        }
    }
}

fn extend_append(
    state: &State<'_>,
    grammar: &CompiledGrammar,
    id: DerivationId,
    d: &Derivation,
    out: &mut Vec<Candidate>,
) {
    for rule in grammar.append.get(&d.nonterminal).into_iter().flatten() {
        let Some(segment) = d.segments.get(rule.index) else {
            continue;
        };
        for &w in state.graph.targets(Endpoint::Vertex(segment.end), &rule.label).iter() {
            let mut segments = d.segments.clone();
            segments[rule.index].end = w;
            out.push(Candidate {
                derivation: Derivation::new(rule.head, segments),
                edge: Some(Edge::new(segment.end, w, rule.label.as_str())),
                antecedents: vec![id],
            });
        }
    }
}

fn extend_insert(
    state: &State<'_>,
    grammar: &CompiledGrammar,
    id: DerivationId,
    d: &Derivation,
    out: &mut Vec<Candidate>,
) {
    for rule in grammar.insert.get(&d.nonterminal).into_iter().flatten() {
        if rule.index > d.segments.len() {
            continue;
        }
        for edge in state.graph.edges_with_label(&rule.label) {
            let mut segments = d.segments.clone();
            segments.insert(rule.index, Path::new(edge.from, edge.to));
            out.push(Candidate {
                derivation: Derivation::new(rule.head, segments),
                edge: Some(edge.clone()),
                antecedents: vec![id],
            });
        }
    }
}

fn extend_concat(
    state: &State<'_>,
    grammar: &CompiledGrammar,
    id: DerivationId,
    d: &Derivation,
    out: &mut Vec<Candidate>,
) {
    for &(rule_index, position) in grammar.concat_uses.get(&d.nonterminal).into_iter().flatten() {
        let rule = &grammar.concat[rule_index];
        if d.dimension() < rule.min_arity[position] {
            continue;
        }
        let mut bound: Vec<Option<DerivationId>> = vec![None; rule.bodies.len()];
        bound[position] = Some(id);
        if !links_hold(state, rule, &bound) {
            continue;
        }
        let mut found = Vec::new();
        search(state, rule, &mut bound, &mut found);
        for combination in found {
            if let Some(candidate) = assemble(state, rule, &combination) {
                out.push(candidate);
            }
        }
    }
}

fn segment_of(state: &State<'_>, bound: &[Option<DerivationId>], r: SegmentRef) -> Option<Path> {
    let id = (*bound.get(r.body)?)?;
    state.table.get(id)?.segments.get(r.segment).copied()
}

/// Every link whose two ends are bound meets exactly.
fn links_hold(state: &State<'_>, rule: &Concat, bound: &[Option<DerivationId>]) -> bool {
    rule.links.iter().all(|&(a, b)| {
        match (segment_of(state, bound, a), segment_of(state, bound, b)) {
            (Some(pa), Some(pb)) => pa.end == pb.start,
            _ => true,
        }
    })
}

/// Fills unbound body positions in order, pruning on every bound link.
fn search(
    state: &State<'_>,
    rule: &Concat,
    bound: &mut Vec<Option<DerivationId>>,
    found: &mut Vec<Vec<DerivationId>>,
) {
    let Some(position) = bound.iter().position(Option::is_none) else {
        found.push(bound.iter().flatten().copied().collect());
        return;
    };

    let body = rule.bodies[position];
    let mut candidates: Option<&[DerivationId]> = None;
    for &(a, b) in &rule.links {
        let key = if a.body == position && bound[b.body].is_some() && b.body != position {
            segment_of(state, bound, b)
                .map(|pb| BoundaryKey::new(body, a.segment, BoundaryRole::End, pb.start))
        } else if b.body == position && bound[a.body].is_some() && a.body != position {
            segment_of(state, bound, a)
                .map(|pa| BoundaryKey::new(body, b.segment, BoundaryRole::Start, pa.end))
        } else {
            None
        };
        let Some(key) = key else {
            continue;
        };
        let list = state.table.boundary(&key);
        if candidates.map_or(true, |c| list.len() < c.len()) {
            candidates = Some(list);
        }
    }
    let candidates = candidates.unwrap_or_else(|| state.table.of_nonterminal(body));

    for &candidate in candidates {
        let fits = state
            .table
            .get(candidate)
            .is_some_and(|c| c.dimension() >= rule.min_arity[position]);
        if !fits {
            continue;
        }
        bound[position] = Some(candidate);
        if links_hold(state, rule, bound) {
            search(state, rule, bound, found);
        }
        bound[position] = None;
    }
}

fn assemble(state: &State<'_>, rule: &Concat, combination: &[DerivationId]) -> Option<Candidate> {
    let bound: Vec<Option<DerivationId>> = combination.iter().copied().map(Some).collect();
    let mut segments = Vec::with_capacity(rule.wiring.len());
    for chain in &rule.wiring {
        let first = segment_of(state, &bound, *chain.first()?)?;
        let last = segment_of(state, &bound, *chain.last()?)?;
        segments.push(Path::new(first.start, last.end));
    }
    Some(Candidate {
        derivation: Derivation::new(rule.head, segments),
        edge: None,
        antecedents: combination.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Vertex;
    use mcfl_grammar::parse_normal_form;

    fn grammar(text: &str) -> Mcfg {
        parse_normal_form(text).unwrap()
    }

    fn path(s: u64, e: u64) -> Path {
        Path::from((s, e))
    }

    #[test]
    fn basic_rules_fire_once_per_edge() {
        let mut g = Graph::new();
        g.add_edge(Vertex(0), Vertex(1), "a");
        g.add_edge(Vertex(1), Vertex(2), "a");
        g.add_edge(Vertex(2), Vertex(3), "b");
        let r = solve(&g, &grammar("S(a)."), SolverOptions::default());
        assert_eq!(r.path_set(), [path(0, 1), path(1, 2)].into_iter().collect());
    }

    #[test]
    fn concatenation_requires_exact_meeting_vertex() {
        let mut g = Graph::new();
        g.add_edge(Vertex(0), Vertex(1), "a");
        g.add_edge(Vertex(1), Vertex(2), "b");
        g.add_edge(Vertex(5), Vertex(6), "b");
        let r = solve(
            &g,
            &grammar("A(a).\nB(b).\nS(X0 Y0) :- A(X0), B(Y0)."),
            SolverOptions::default(),
        );
        assert_eq!(r.paths, vec![path(0, 2)]);
    }

    #[test]
    fn repeated_bodies_combine_with_themselves() {
        let g = Graph::linear(["a", "a", "a"]);
        let r = solve(
            &g,
            &grammar("S(a).\nS(X0 Y0) :- S(X0), S(Y0)."),
            SolverOptions::default(),
        );
        let expected: BTreeSet<Path> = [(0, 1), (1, 2), (2, 3), (0, 2), (1, 3), (0, 3)]
            .into_iter()
            .map(Path::from)
            .collect();
        assert_eq!(r.path_set(), expected);
    }

    #[test]
    fn prepend_and_append_extend_segments() {
        let g = Graph::linear(["x", "a", "y"]);
        let r = solve(
            &g,
            &grammar("A(a).\nB(x X0) :- A(X0).\nS(X0 y) :- B(X0)."),
            SolverOptions::default(),
        );
        assert_eq!(r.paths, vec![path(0, 3)]);
        assert_eq!(r.derivations.derivations_of("B"), vec![&[path(0, 2)][..]]);
    }

    #[test]
    fn insert_needs_no_adjacency_but_scc_consistency() {
        let mut g = Graph::new();
        g.add_edge(Vertex(0), Vertex(1), "a");
        g.add_edge(Vertex(1), Vertex(2), "n");
        g.add_edge(Vertex(2), Vertex(3), "b");
        g.add_edge(Vertex(9), Vertex(8), "b");
        let r = solve(
            &g,
            &grammar("A(a).\nP(X0, b) :- A(X0).\nS(X0 Y0 X1) :- P(X0, X1), N(Y0).\nN(n)."),
            SolverOptions::default(),
        );
        let pairs = r.derivations.derivations_of("P");
        assert_eq!(pairs, vec![&[path(0, 1), path(2, 3)][..]]);
        assert_eq!(r.paths, vec![path(0, 3)]);
    }

    #[test]
    fn provenance_roots_every_found_path() {
        let g = Graph::linear(["a", "b"]);
        let r = solve(
            &g,
            &grammar("A(a).\nB(b).\nS(X0 Y0) :- A(X0), B(Y0)."),
            SolverOptions::default(),
        );
        let provenance = r.provenance.as_ref().unwrap();
        let edges = provenance.supporting_edges(&r.paths);
        assert_eq!(edges.len(), 2);
        assert!(solve(&g, &grammar("S(a)."), SolverOptions::without_provenance())
            .provenance
            .is_none());
    }

    #[test]
    fn out_of_range_segment_references_are_ignored() {
        let g = Graph::linear(["a"]);
        let mut mcfg = grammar("S(a).");
        mcfg.prepend.push(mcfl_grammar::PrependRule {
            head: "S".into(),
            body: "S".into(),
            label: "a".into(),
            index: 3,
            arity: 1,
        });
        mcfg.concatenate("S", &["S"], &[&[(0, 4)]]);
        let r = solve(&g, &mcfg, SolverOptions::default());
        assert_eq!(r.paths, vec![path(0, 1)]);
    }
}
