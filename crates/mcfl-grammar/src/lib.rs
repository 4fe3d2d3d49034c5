//! Normal-form multiple context-free grammars (MCFGs).
//!
//! - [`rules`]: the five rule shapes and the [`Mcfg`] container
//! - [`clause`]: reader for normal-form clause text
//! - [`normalize`]: the external normalization contract
//! - [`dyck`]: Dyck grammar families used by the reachability analyses

pub mod clause;
pub mod dyck;
pub mod normalize;
pub mod rules;

pub use clause::{parse_clause, parse_normal_form, GrammarError};
pub use dyck::{BracketFamily, DyckGrammars, DyckIds, DyckLabel, GrammarMode};
pub use normalize::{load_grammar, ExternalNormalizer, NormalFormCheck, Normalizer};
pub use rules::{
    AppendRule, BasicRule, ConcatenateRule, InsertRule, Mcfg, PrependRule, Rule, SegmentRef,
    EPSILON_LABEL, START_SYMBOL,
};
