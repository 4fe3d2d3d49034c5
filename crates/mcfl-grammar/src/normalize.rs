//! Normalization seam.
//!
//! Raw grammar text must be rewritten into the five normal-form shapes before
//! the solver can use it. That rewriting is an external service; this module
//! only defines the contract and two adapters.

use crate::clause::{parse_normal_form, GrammarError};
use crate::rules::Mcfg;
use std::io::Write;
use std::process::{Command, Stdio};

/// Turns raw grammar text into normal-form clause text.
pub trait Normalizer {
    fn normalize(&self, raw: &str) -> Result<String, GrammarError>;
}

/// Identity normalizer for text that is already in normal form.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalFormCheck;

impl Normalizer for NormalFormCheck {
    fn normalize(&self, raw: &str) -> Result<String, GrammarError> {
        parse_normal_form(raw).map_err(|err| GrammarError::Normalization {
            message: err.to_string(),
        })?;
        Ok(raw.to_string())
    }
}

/// Runs an external program that reads raw text on stdin and prints clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalNormalizer {
    program: String,
    args: Vec<String>,
}

impl ExternalNormalizer {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `python3 mcfg.py -n`
    pub fn python_reference() -> Self {
        Self::new("python3", ["mcfg.py", "-n"])
    }

    /// Splits a command line on whitespace (no quoting).
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn io_error(&self, source: std::io::Error) -> GrammarError {
        GrammarError::Io {
            program: self.program.clone(),
            source,
        }
    }
}

impl Normalizer for ExternalNormalizer {
    fn normalize(&self, raw: &str) -> Result<String, GrammarError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.io_error(e))?;

        // The child may fill its stdout pipe before it has read all of stdin.
        let writer = child.stdin.take().map(|mut stdin| {
            let input = raw.to_string();
            std::thread::spawn(move || stdin.write_all(input.as_bytes()))
        });

        let output = child.wait_with_output().map_err(|e| self.io_error(e))?;
        if let Some(handle) = writer {
            match handle.join() {
                Ok(result) => result.map_err(|e| self.io_error(e))?,
                Err(_) => {
                    return Err(GrammarError::Normalization {
                        message: "stdin writer thread panicked".to_string(),
                    })
                }
            }
        }

        if !output.status.success() {
            return Err(GrammarError::Normalization {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        String::from_utf8(output.stdout).map_err(|e| GrammarError::Normalization {
            message: format!("normalizer output is not UTF-8: {e}"),
        })
    }
}

/// Normalizes `raw` and parses the result.
pub fn load_grammar(normalizer: &dyn Normalizer, raw: &str) -> Result<Mcfg, GrammarError> {
    let normalized = normalizer.normalize(raw)?;
    parse_normal_form(&normalized)
}
