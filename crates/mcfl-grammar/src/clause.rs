//! Reader for normal-form clause text.
//!
//! Each clause is one line, terminated by `.`:
//!
//! ```text
//! Po0(op--0).
//! P(X0, cp--0) :- Po0(X0).
//! S(Y0 X0 Y1) :- S(X0), P(Y0, Y1).
//! ```
//!
//! Arguments are separated by a comma followed by whitespace; inside one
//! argument, tokens are separated by whitespace or a bare comma. The shape of
//! a clause is decided structurally:
//!
//! - no body: basic
//! - one body of equal arity: prepend / append (a rename if no terminal)
//! - one body of different arity: insert
//! - several bodies: concatenate (`Eps` bodies and their variables dropped)

use crate::rules::{
    AppendRule, BasicRule, ConcatenateRule, InsertRule, Mcfg, PrependRule, Rule, SegmentRef,
    EMPTY_WORD_PREDICATE, EPSILON_LABEL, EPSILON_TOKEN,
};
use nom::{
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char as pchar, multispace0},
    combinator::{all_consuming, opt},
    multi::separated_list1,
    sequence::{delimited, preceded, tuple},
    IResult,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("grammar normalization failed: {message}")]
    Normalization { message: String },

    #[error("parse error on line {line}: {message}")]
    Clause { line: usize, message: String },

    #[error("failed to run grammar normalizer `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Syntax
// ============================================================================

#[derive(Debug)]
struct Atom<'a> {
    name: &'a str,
    args: Vec<Vec<&'a str>>,
}

impl Atom<'_> {
    fn variables(&self) -> impl Iterator<Item = &str> + '_ {
        self.args.iter().flatten().copied()
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn atom(input: &str) -> IResult<&str, Atom<'_>> {
    let (input, name) = preceded(multispace0, take_while1(is_name_char))(input)?;
    let (input, raw) = delimited(
        preceded(multispace0, pchar('(')),
        take_while(|c| c != '(' && c != ')'),
        pchar(')'),
    )(input)?;
    Ok((
        input,
        Atom {
            name,
            args: split_arguments(raw),
        },
    ))
}

fn clause(input: &str) -> IResult<&str, (Atom<'_>, Vec<Atom<'_>>)> {
    let (input, head) = atom(input)?;
    let (input, bodies) = opt(preceded(
        tuple((multispace0, tag(":-"))),
        separated_list1(preceded(multispace0, pchar(',')), atom),
    ))(input)?;
    let (input, _) = multispace0(input)?;
    Ok((input, (head, bodies.unwrap_or_default())))
}

fn split_arguments(raw: &str) -> Vec<Vec<&str>> {
    let mut args = Vec::new();
    let mut start = 0;
    for (i, c) in raw.char_indices() {
        if c == ',' && raw[i + 1..].starts_with(char::is_whitespace) {
            args.push(tokens(&raw[start..i]));
            start = i + 1;
        }
    }
    args.push(tokens(&raw[start..]));
    args
}

fn tokens(arg: &str) -> Vec<&str> {
    arg.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect()
}

fn terminal(token: &str) -> String {
    if token == EPSILON_TOKEN {
        EPSILON_LABEL.to_string()
    } else {
        token.to_string()
    }
}

// ============================================================================
// Classification
// ============================================================================

fn classify(head: &Atom<'_>, bodies: &[Atom<'_>]) -> Result<Rule, String> {
    match bodies {
        [] => basic(head),
        [body] => unary(head, body),
        _ => concatenate(head, bodies),
    }
}

fn basic(head: &Atom<'_>) -> Result<Rule, String> {
    match head.args.as_slice() {
        [arg] => match arg.as_slice() {
            [label] => Ok(Rule::Basic(BasicRule {
                head: head.name.to_string(),
                label: terminal(label),
            })),
            _ => Err(format!("`{}` must carry exactly one terminal", head.name)),
        },
        _ => Err(format!("`{}` must have exactly one argument", head.name)),
    }
}

fn unary(head: &Atom<'_>, body: &Atom<'_>) -> Result<Rule, String> {
    let vars: Vec<&str> = body.variables().collect();
    let is_var = |t: &str| vars.contains(&t);
    let arity = body.args.len();

    if head.args.len() == arity {
        let mut extended = head.args.iter().enumerate().filter(|(_, t)| t.len() > 1);
        let Some((index, tokens)) = extended.next() else {
            return concatenate(head, std::slice::from_ref(body));
        };
        if extended.next().is_some() {
            return Err(format!("`{}` extends more than one segment", head.name));
        }
        return match tokens.as_slice() {
            [first, second] if is_var(*first) && !is_var(*second) => {
                Ok(Rule::Append(AppendRule {
                    head: head.name.to_string(),
                    body: body.name.to_string(),
                    label: terminal(second),
                    index,
                    arity,
                }))
            }
            [first, second] if !is_var(*first) && is_var(*second) => {
                Ok(Rule::Prepend(PrependRule {
                    head: head.name.to_string(),
                    body: body.name.to_string(),
                    label: terminal(first),
                    index,
                    arity,
                }))
            }
            _ => concatenate(head, std::slice::from_ref(body)),
        };
    }

    let mut inserted = head
        .args
        .iter()
        .enumerate()
        .filter(|(_, t)| t.first().is_some_and(|t| !is_var(*t)));
    match (inserted.next(), inserted.next()) {
        (None, _) => concatenate(head, std::slice::from_ref(body)),
        (Some((index, tokens)), None) => match tokens.as_slice() {
            [label] if head.args.len() == arity + 1 => Ok(Rule::Insert(InsertRule {
                head: head.name.to_string(),
                body: body.name.to_string(),
                label: terminal(label),
                index,
                body_arity: arity,
            })),
            _ => Err(format!(
                "`{}` must insert exactly one terminal segment",
                head.name
            )),
        },
        (Some(_), Some(_)) => Err(format!("`{}` inserts more than one segment", head.name)),
    }
}

fn concatenate(head: &Atom<'_>, bodies: &[Atom<'_>]) -> Result<Rule, String> {
    let empty: Vec<&str> = bodies
        .iter()
        .filter(|b| b.name == EMPTY_WORD_PREDICATE)
        .flat_map(|b| b.variables())
        .collect();
    let bodies: Vec<&Atom<'_>> = bodies
        .iter()
        .filter(|b| b.name != EMPTY_WORD_PREDICATE)
        .collect();
    if bodies.is_empty() {
        return Err(format!("`{}` has no non-empty body", head.name));
    }
    if bodies.iter().any(|b| b.args.iter().any(|a| a.len() != 1)) {
        return Err(format!(
            "body arguments of `{}` must be single variables",
            head.name
        ));
    }

    let locate = |token: &str| {
        bodies.iter().enumerate().find_map(|(i, b)| {
            b.args
                .iter()
                .position(|a| a[0] == token)
                .map(|j| SegmentRef::new(i, j))
        })
    };

    let mut wiring = Vec::with_capacity(head.args.len());
    for (k, arg) in head.args.iter().enumerate() {
        let chain = arg
            .iter()
            .filter(|t| !empty.contains(*t))
            .map(|t| locate(*t).ok_or_else(|| format!("variable `{t}` is not bound by any body")))
            .collect::<Result<Vec<_>, _>>()?;
        if chain.is_empty() {
            return Err(format!("argument {k} of `{}` has no variables", head.name));
        }
        wiring.push(chain);
    }

    Ok(Rule::Concatenate(ConcatenateRule {
        head: head.name.to_string(),
        bodies: bodies.iter().map(|b| b.name.to_string()).collect(),
        wiring,
    }))
}

// ============================================================================
// Entry points
// ============================================================================

/// Parses one clause (the trailing `.` is optional).
pub fn parse_clause(text: &str) -> Result<Rule, String> {
    let text = text.trim();
    let text = text.split_once('.').map_or(text, |(c, _)| c);
    let (head, bodies) = all_consuming(clause)(text)
        .map(|(_, v)| v)
        .map_err(|_| format!("malformed clause `{text}`"))?;
    classify(&head, &bodies)
}

/// Parses normalizer output into a grammar.
///
/// Blank lines, lines without a `.` and lines starting with `-` are skipped.
pub fn parse_normal_form(text: &str) -> Result<Mcfg, GrammarError> {
    let mut mcfg = Mcfg::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('-') || !line.contains('.') {
            continue;
        }
        let rule = parse_clause(line).map_err(|message| GrammarError::Clause {
            line: idx + 1,
            message,
        })?;
        mcfg.push(rule);
    }
    Ok(mcfg)
}
