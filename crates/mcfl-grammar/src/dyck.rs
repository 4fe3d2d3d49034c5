//! Dyck grammar families over the benchmark label convention.
//!
//! Labels come in two bracket families, each with numbered open/close pairs:
//!
//! | label    | family      | role  |
//! |----------|-------------|-------|
//! | `op--N`  | parenthesis | open  |
//! | `cp--N`  | parenthesis | close |
//! | `ob--N`  | bracket     | open  |
//! | `cb--N`  | bracket     | close |
//!
//! plus `normal` (always allowed) and the epsilon self-loop label.
//!
//! A *balanced* grammar matches one family and lets the other family through as
//! plain letters. Alternating the two balanced grammars over-approximates the
//! interleaved language, which [`interleaved`] under-approximates.

use crate::rules::{AppendRule, InsertRule, Mcfg, PrependRule, EPSILON_LABEL, START_SYMBOL};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label of edges that carry no bracket.
pub const NORMAL_LABEL: &str = "normal";

/// Bracket id used by the value-flow benchmarks for source/sink wrapping.
pub const VALUE_FLOW_BRACKET: u32 = 0;

const SEGMENT_ONLY: &str = "Se";
const FLAT: &str = "Sn";
const WRAPPED_OPEN: &str = "S0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketFamily {
    Parenthesis,
    Bracket,
}

impl BracketFamily {
    pub const fn tag(self) -> char {
        match self {
            BracketFamily::Parenthesis => 'p',
            BracketFamily::Bracket => 'b',
        }
    }

    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'p' => Some(BracketFamily::Parenthesis),
            'b' => Some(BracketFamily::Bracket),
            _ => None,
        }
    }

    pub const fn other(self) -> Self {
        match self {
            BracketFamily::Parenthesis => BracketFamily::Bracket,
            BracketFamily::Bracket => BracketFamily::Parenthesis,
        }
    }

    pub fn open_label(self, id: u32) -> String {
        format!("o{}--{id}", self.tag())
    }

    pub fn close_label(self, id: u32) -> String {
        format!("c{}--{id}", self.tag())
    }

    /// Two-segment nonterminal `(open ..., close)` of this family.
    fn pair_nonterminal(self) -> &'static str {
        match self {
            BracketFamily::Parenthesis => "P",
            BracketFamily::Bracket => "B",
        }
    }

    fn opener_nonterminal(self, id: u32) -> String {
        format!("{}o{id}", self.pair_nonterminal())
    }
}

/// A label read through the bracket convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DyckLabel<'a> {
    Epsilon,
    Normal,
    Open(BracketFamily, u32),
    Close(BracketFamily, u32),
    Other(&'a str),
}

impl<'a> DyckLabel<'a> {
    pub fn parse(label: &'a str) -> Self {
        if label == EPSILON_LABEL {
            return DyckLabel::Epsilon;
        }
        if label == NORMAL_LABEL {
            return DyckLabel::Normal;
        }
        let mut chars = label.chars();
        let (Some(role), Some(tag)) = (chars.next(), chars.next()) else {
            return DyckLabel::Other(label);
        };
        let Some(family) = BracketFamily::from_tag(tag) else {
            return DyckLabel::Other(label);
        };
        let Some(id) = chars
            .as_str()
            .strip_prefix("--")
            .and_then(|digits| digits.parse::<u32>().ok())
        else {
            return DyckLabel::Other(label);
        };
        match role {
            'o' => DyckLabel::Open(family, id),
            'c' => DyckLabel::Close(family, id),
            _ => DyckLabel::Other(label),
        }
    }

    /// The matching open/close label, if this is a bracket.
    pub fn partner(self) -> Option<Self> {
        match self {
            DyckLabel::Open(f, id) => Some(DyckLabel::Close(f, id)),
            DyckLabel::Close(f, id) => Some(DyckLabel::Open(f, id)),
            _ => None,
        }
    }

    pub fn bracket(self) -> Option<(BracketFamily, u32)> {
        match self {
            DyckLabel::Open(f, id) | DyckLabel::Close(f, id) => Some((f, id)),
            _ => None,
        }
    }
}

impl fmt::Display for DyckLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DyckLabel::Epsilon => Ok(()),
            DyckLabel::Normal => f.write_str(NORMAL_LABEL),
            DyckLabel::Open(family, id) => f.write_str(&family.open_label(*id)),
            DyckLabel::Close(family, id) => f.write_str(&family.close_label(*id)),
            DyckLabel::Other(raw) => f.write_str(raw),
        }
    }
}

/// Bracket ids occurring in a graph, per family, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DyckIds {
    pub parenthesis: Vec<u32>,
    pub bracket: Vec<u32>,
}

impl DyckIds {
    pub fn ids(&self, family: BracketFamily) -> &[u32] {
        match family {
            BracketFamily::Parenthesis => &self.parenthesis,
            BracketFamily::Bracket => &self.bracket,
        }
    }

    pub fn push(&mut self, family: BracketFamily, id: u32) {
        match family {
            BracketFamily::Parenthesis => self.parenthesis.push(id),
            BracketFamily::Bracket => self.bracket.push(id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parenthesis.is_empty() && self.bracket.is_empty()
    }
}

// ============================================================================
// Building blocks
// ============================================================================

/// `Xo<id>(open).` and `X(X0, close) :- Xo<id>(X0).` for every id.
fn matched_pairs(g: &mut Mcfg, family: BracketFamily, ids: &[u32]) {
    for &id in ids {
        let opener = family.opener_nonterminal(id);
        g.basic(&opener, &family.open_label(id));
        g.insert.push(InsertRule {
            head: family.pair_nonterminal().to_string(),
            body: opener,
            label: family.close_label(id),
            index: 1,
            body_arity: 1,
        });
    }
}

/// Both brackets of every id as plain letters of `name`.
fn letters(g: &mut Mcfg, name: &str, family: BracketFamily, ids: &[u32]) {
    for &id in ids {
        g.basic(name, &family.open_label(id));
        g.basic(name, &family.close_label(id));
    }
}

/// `name(X0 Y0) :- left(X0), right(Y0).`
fn sequence(g: &mut Mcfg, name: &str, left: &str, right: &str) {
    g.concatenate(name, &[left, right], &[&[(0, 0), (1, 0)]]);
}

/// `name(Y0 X0 Y1) :- inner(X0), P(Y0, Y1).`
fn wrap(g: &mut Mcfg, name: &str, inner: &str, family: BracketFamily) {
    g.concatenate(
        name,
        &[inner, family.pair_nonterminal()],
        &[&[(1, 0), (0, 0), (1, 1)]],
    );
}

fn rename(g: &mut Mcfg, name: &str, from: &str) {
    g.concatenate(name, &[from], &[&[(0, 0)]]);
}

// ============================================================================
// Grammar families
// ============================================================================

/// Dyck language over `balanced`, with `passthrough` brackets as free letters.
pub fn balanced(
    balanced: BracketFamily,
    balanced_ids: &[u32],
    passthrough: BracketFamily,
    passthrough_ids: &[u32],
) -> Mcfg {
    let mut g = Mcfg::new();
    matched_pairs(&mut g, balanced, balanced_ids);
    letters(&mut g, START_SYMBOL, passthrough, passthrough_ids);
    g.basic(START_SYMBOL, EPSILON_LABEL);
    g.basic(START_SYMBOL, NORMAL_LABEL);
    sequence(&mut g, START_SYMBOL, START_SYMBOL, START_SYMBOL);
    if !balanced_ids.is_empty() {
        wrap(&mut g, START_SYMBOL, START_SYMBOL, balanced);
    }
    g
}

/// Parity vector spelled with one letter per class (`p` even, `i` odd).
fn parity_name(bits: usize, classes: usize) -> String {
    (0..classes)
        .map(|i| if (bits >> i) & 1 == 0 { 'p' } else { 'i' })
        .collect()
}

/// `S<parity><c?><o?>`
fn parity_nonterminal(bits: usize, classes: usize, close: bool, open: bool) -> String {
    let mut name = format!("{START_SYMBOL}{}", parity_name(bits, classes));
    if close {
        name.push('c');
    }
    if open {
        name.push('o');
    }
    name
}

/// Balanced grammar that additionally tracks, per residue class of the
/// pass-through ids (sorted, `index mod classes`), the parity of unmatched
/// pass-through brackets and whether a close / open is pending.
///
/// `S` accepts words whose pass-through brackets cancel in every class.
pub fn parity(
    balanced: BracketFamily,
    balanced_ids: &[u32],
    passthrough: BracketFamily,
    passthrough_ids: &[u32],
    classes: usize,
) -> Mcfg {
    let classes = classes.max(1);
    let mut g = Mcfg::new();
    matched_pairs(&mut g, balanced, balanced_ids);
    g.basic(SEGMENT_ONLY, EPSILON_LABEL);
    g.basic(SEGMENT_ONLY, NORMAL_LABEL);

    let mut sorted = passthrough_ids.to_vec();
    sorted.sort_unstable();
    for (i, &id) in sorted.iter().enumerate() {
        let bits = 1usize << (i % classes);
        g.basic(
            &parity_nonterminal(bits, classes, true, false),
            &passthrough.close_label(id),
        );
        g.basic(
            &parity_nonterminal(bits, classes, false, true),
            &passthrough.open_label(id),
        );
    }

    let states: Vec<(usize, bool, bool)> = (0..1usize << classes)
        .flat_map(|bits| {
            [(false, false), (false, true), (true, false), (true, true)]
                .into_iter()
                .map(move |(c, o)| (bits, c, o))
        })
        .collect();

    if !balanced_ids.is_empty() {
        wrap(&mut g, SEGMENT_ONLY, SEGMENT_ONLY, balanced);
        for &(bits, c, o) in &states {
            let name = parity_nonterminal(bits, classes, c, o);
            wrap(&mut g, &name, &name, balanced);
        }
    }

    sequence(&mut g, SEGMENT_ONLY, SEGMENT_ONLY, SEGMENT_ONLY);
    for &(bits1, c1, o1) in &states {
        let left = parity_nonterminal(bits1, classes, c1, o1);
        sequence(&mut g, &left, &left, SEGMENT_ONLY);
        sequence(&mut g, &left, SEGMENT_ONLY, &left);
        for &(bits2, c2, o2) in &states {
            let right = parity_nonterminal(bits2, classes, c2, o2);
            let joined = parity_nonterminal(bits1 ^ bits2, classes, c1, o2);
            sequence(&mut g, &joined, &left, &right);
        }
    }

    rename(&mut g, START_SYMBOL, SEGMENT_ONLY);
    rename(&mut g, START_SYMBOL, &parity_nonterminal(0, classes, false, false));
    g
}

/// Both families balanced at once.
pub fn interleaved(parenthesis_ids: &[u32], bracket_ids: &[u32]) -> Mcfg {
    let mut g = Mcfg::new();
    matched_pairs(&mut g, BracketFamily::Parenthesis, parenthesis_ids);
    matched_pairs(&mut g, BracketFamily::Bracket, bracket_ids);
    g.basic(START_SYMBOL, EPSILON_LABEL);
    g.basic(START_SYMBOL, NORMAL_LABEL);
    sequence(&mut g, START_SYMBOL, START_SYMBOL, START_SYMBOL);
    if !parenthesis_ids.is_empty() {
        wrap(&mut g, START_SYMBOL, START_SYMBOL, BracketFamily::Parenthesis);
    }
    if !bracket_ids.is_empty() {
        wrap(&mut g, START_SYMBOL, START_SYMBOL, BracketFamily::Bracket);
    }
    g
}

/// Value-flow wrapper: `ob--0 w cb--0` for any word `w` over all labels.
pub fn bracket_wrapper(parenthesis_ids: &[u32], bracket_ids: &[u32]) -> Mcfg {
    let mut g = Mcfg::new();
    g.basic(FLAT, EPSILON_LABEL);
    g.basic(FLAT, NORMAL_LABEL);
    letters(&mut g, FLAT, BracketFamily::Parenthesis, parenthesis_ids);
    letters(&mut g, FLAT, BracketFamily::Bracket, bracket_ids);
    sequence(&mut g, FLAT, FLAT, FLAT);
    g.append.push(AppendRule {
        head: WRAPPED_OPEN.to_string(),
        body: FLAT.to_string(),
        label: BracketFamily::Bracket.close_label(VALUE_FLOW_BRACKET),
        index: 0,
        arity: 1,
    });
    g.prepend.push(PrependRule {
        head: START_SYMBOL.to_string(),
        body: WRAPPED_OPEN.to_string(),
        label: BracketFamily::Bracket.open_label(VALUE_FLOW_BRACKET),
        index: 0,
        arity: 1,
    });
    g
}

// ============================================================================
// Alpha / beta selection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrammarMode {
    #[default]
    Classic,
    Augmented,
}

/// Resolves the alpha and beta grammars for a mode and family split.
///
/// Alpha balances `alpha_family`; beta balances the other one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DyckGrammars {
    pub mode: GrammarMode,
    pub alpha_family: BracketFamily,
    pub parity_classes: usize,
}

impl DyckGrammars {
    pub fn classic(alpha_family: BracketFamily) -> Self {
        Self {
            mode: GrammarMode::Classic,
            alpha_family,
            parity_classes: 2,
        }
    }

    pub fn alpha(&self, ids: &DyckIds) -> Mcfg {
        self.balancing(self.alpha_family, ids)
    }

    pub fn beta(&self, ids: &DyckIds) -> Mcfg {
        self.balancing(self.alpha_family.other(), ids)
    }

    fn balancing(&self, family: BracketFamily, ids: &DyckIds) -> Mcfg {
        let other = family.other();
        match self.mode {
            GrammarMode::Classic => balanced(family, ids.ids(family), other, ids.ids(other)),
            GrammarMode::Augmented => parity(
                family,
                ids.ids(family),
                other,
                ids.ids(other),
                self.parity_classes,
            ),
        }
    }
}
