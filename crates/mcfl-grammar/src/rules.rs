//! Normal-form MCFG rules.
//!
//! Every grammar handed to the solver is a flat list of rules in one of five
//! shapes. Nonterminals are plain strings here; the solver interns them.
//!
//! Variables in the clause text are named `X0, X1, ...` for the first body,
//! `Y0, Y1, ...` for the second, and so on (see [`variable_name`]).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Designated start nonterminal. Its one-segment derivations are the answers.
pub const START_SYMBOL: &str = "S";

/// Label of the epsilon self-loop every graph vertex carries.
pub const EPSILON_LABEL: &str = "";

/// Clause-text spelling of [`EPSILON_LABEL`].
pub const EPSILON_TOKEN: &str = "eps";

/// Body predicate standing for the empty word; dropped from concatenations.
pub const EMPTY_WORD_PREDICATE: &str = "Eps";

const VARIABLE_LETTERS: [char; 10] = ['X', 'Y', 'Z', 'V', 'W', 'Q', 'R', 'S', 'T', 'U'];

/// Clause-text name of segment `segment` of body `body`.
pub fn variable_name(body: usize, segment: usize) -> String {
    match VARIABLE_LETTERS.get(body) {
        Some(letter) => format!("{letter}{segment}"),
        None => format!("A{body}_{segment}"),
    }
}

fn label_token(label: &str) -> &str {
    if label == EPSILON_LABEL {
        EPSILON_TOKEN
    } else {
        label
    }
}

fn body_atom(name: &str, body: usize, arity: usize) -> String {
    let vars: Vec<String> = (0..arity).map(|i| variable_name(body, i)).collect();
    format!("{name}({})", vars.join(", "))
}

// ============================================================================
// Rule shapes
// ============================================================================

/// `Head(label).`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BasicRule {
    pub head: String,
    pub label: String,
}

/// `Head(..., label x_i, ...) :- Body(...)`: extends segment `index` backward.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrependRule {
    pub head: String,
    pub body: String,
    pub label: String,
    pub index: usize,
    pub arity: usize,
}

/// `Head(..., x_i label, ...) :- Body(...)`: extends segment `index` forward.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppendRule {
    pub head: String,
    pub body: String,
    pub label: String,
    pub index: usize,
    pub arity: usize,
}

/// `Head(..., label, ...) :- Body(...)`: inserts a one-edge segment at `index`.
///
/// The inserted edge need not touch the body derivation; only the SCC
/// consistency check constrains where it may land.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InsertRule {
    pub head: String,
    pub body: String,
    pub label: String,
    pub index: usize,
    pub body_arity: usize,
}

/// Reference to segment `segment` of the derivation bound at body position `body`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentRef {
    pub body: usize,
    pub segment: usize,
}

impl SegmentRef {
    pub const fn new(body: usize, segment: usize) -> Self {
        Self { body, segment }
    }
}

/// `Head(terms) :- Body1(...), Body2(...), ...`
///
/// `wiring[k]` lists the body segments whose concatenation forms head segment
/// `k`. Consecutive references must meet at the same vertex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConcatenateRule {
    pub head: String,
    pub bodies: Vec<String>,
    pub wiring: Vec<Vec<SegmentRef>>,
}

impl ConcatenateRule {
    /// Segment count the rule expects from body `body` (highest reference + 1).
    pub fn body_arity(&self, body: usize) -> usize {
        self.wiring
            .iter()
            .flatten()
            .filter(|r| r.body == body)
            .map(|r| r.segment + 1)
            .max()
            .unwrap_or(0)
    }

    /// Pairs of consecutive references `(left, right)`: `left` must end where
    /// `right` starts.
    pub fn links(&self) -> impl Iterator<Item = (SegmentRef, SegmentRef)> + '_ {
        self.wiring
            .iter()
            .flat_map(|chain| chain.windows(2).map(|w| (w[0], w[1])))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    Basic(BasicRule),
    Prepend(PrependRule),
    Append(AppendRule),
    Insert(InsertRule),
    Concatenate(ConcatenateRule),
}

impl Rule {
    pub fn head(&self) -> &str {
        match self {
            Rule::Basic(r) => &r.head,
            Rule::Prepend(r) => &r.head,
            Rule::Append(r) => &r.head,
            Rule::Insert(r) => &r.head,
            Rule::Concatenate(r) => &r.head,
        }
    }
}

// ============================================================================
// Clause text
// ============================================================================

impl fmt::Display for BasicRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}).", self.head, label_token(&self.label))
    }
}

impl fmt::Display for PrependRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = (0..self.arity)
            .map(|i| {
                let var = variable_name(0, i);
                if i == self.index {
                    format!("{} {var}", label_token(&self.label))
                } else {
                    var
                }
            })
            .collect();
        write!(
            f,
            "{}({}) :- {}.",
            self.head,
            args.join(", "),
            body_atom(&self.body, 0, self.arity)
        )
    }
}

impl fmt::Display for AppendRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = (0..self.arity)
            .map(|i| {
                let var = variable_name(0, i);
                if i == self.index {
                    format!("{var} {}", label_token(&self.label))
                } else {
                    var
                }
            })
            .collect();
        write!(
            f,
            "{}({}) :- {}.",
            self.head,
            args.join(", "),
            body_atom(&self.body, 0, self.arity)
        )
    }
}

impl fmt::Display for InsertRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut args: Vec<String> = (0..self.body_arity).map(|i| variable_name(0, i)).collect();
        let at = self.index.min(args.len());
        args.insert(at, label_token(&self.label).to_string());
        write!(
            f,
            "{}({}) :- {}.",
            self.head,
            args.join(", "),
            body_atom(&self.body, 0, self.body_arity)
        )
    }
}

impl fmt::Display for ConcatenateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head: Vec<String> = self
            .wiring
            .iter()
            .map(|chain| {
                chain
                    .iter()
                    .map(|r| variable_name(r.body, r.segment))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();
        let bodies: Vec<String> = self
            .bodies
            .iter()
            .enumerate()
            .map(|(i, name)| body_atom(name, i, self.body_arity(i)))
            .collect();
        write!(f, "{}({}) :- {}.", self.head, head.join(", "), bodies.join(", "))
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Basic(r) => r.fmt(f),
            Rule::Prepend(r) => r.fmt(f),
            Rule::Append(r) => r.fmt(f),
            Rule::Insert(r) => r.fmt(f),
            Rule::Concatenate(r) => r.fmt(f),
        }
    }
}

// ============================================================================
// Grammar
// ============================================================================

/// A grammar in normal form, rules grouped by shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mcfg {
    pub basic: Vec<BasicRule>,
    pub prepend: Vec<PrependRule>,
    pub append: Vec<AppendRule>,
    pub insert: Vec<InsertRule>,
    pub concatenate: Vec<ConcatenateRule>,
}

impl Mcfg {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: Rule) {
        match rule {
            Rule::Basic(r) => self.basic.push(r),
            Rule::Prepend(r) => self.prepend.push(r),
            Rule::Append(r) => self.append.push(r),
            Rule::Insert(r) => self.insert.push(r),
            Rule::Concatenate(r) => self.concatenate.push(r),
        }
    }

    pub fn basic(&mut self, head: &str, label: &str) {
        self.basic.push(BasicRule {
            head: head.to_string(),
            label: label.to_string(),
        });
    }

    /// Adds a concatenation from `(body, segment)` pairs.
    pub fn concatenate(&mut self, head: &str, bodies: &[&str], wiring: &[&[(usize, usize)]]) {
        self.concatenate.push(ConcatenateRule {
            head: head.to_string(),
            bodies: bodies.iter().map(|b| b.to_string()).collect(),
            wiring: wiring
                .iter()
                .map(|chain| chain.iter().map(|&(b, s)| SegmentRef::new(b, s)).collect())
                .collect(),
        });
    }

    pub fn len(&self) -> usize {
        self.basic.len()
            + self.prepend.len()
            + self.append.len()
            + self.insert.len()
            + self.concatenate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All rules, in shape order (basic, prepend, append, insert, concatenate).
    pub fn rules(&self) -> impl Iterator<Item = Rule> + '_ {
        self.basic
            .iter()
            .cloned()
            .map(Rule::Basic)
            .chain(self.prepend.iter().cloned().map(Rule::Prepend))
            .chain(self.append.iter().cloned().map(Rule::Append))
            .chain(self.insert.iter().cloned().map(Rule::Insert))
            .chain(self.concatenate.iter().cloned().map(Rule::Concatenate))
    }

    /// Largest segment count of any head (at least 1).
    pub fn dimension(&self) -> usize {
        let unary = self
            .prepend
            .iter()
            .map(|r| r.arity)
            .chain(self.append.iter().map(|r| r.arity))
            .chain(self.insert.iter().map(|r| r.body_arity + 1));
        let concat = self.concatenate.iter().map(|r| r.wiring.len());
        unary.chain(concat).fold(1, usize::max)
    }

    /// Largest body count of any rule; unary rules count as rank 1.
    pub fn rank(&self) -> usize {
        let unary = usize::from(
            !(self.prepend.is_empty() && self.append.is_empty() && self.insert.is_empty()),
        );
        self.concatenate
            .iter()
            .map(|r| r.bodies.len())
            .fold(unary, usize::max)
    }

    /// Every terminal label the grammar mentions.
    pub fn labels(&self) -> std::collections::BTreeSet<&str> {
        self.basic
            .iter()
            .map(|r| r.label.as_str())
            .chain(self.prepend.iter().map(|r| r.label.as_str()))
            .chain(self.append.iter().map(|r| r.label.as_str()))
            .chain(self.insert.iter().map(|r| r.label.as_str()))
            .collect()
    }
}

impl fmt::Display for Mcfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-dimensional MCFG of rank {}",
            self.dimension(),
            self.rank()
        )?;
        for rule in self.rules() {
            write!(f, "\n{rule}")?;
        }
        Ok(())
    }
}
