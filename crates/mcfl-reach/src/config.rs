//! Session configuration.

use crate::error::{AnalysisError, Result};
use mcfl_grammar::{BracketFamily, DyckGrammars, GrammarMode};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Benchmark label convention the analysis is run under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisFamily {
    #[default]
    Taint,
    ValueFlow,
}

impl std::str::FromStr for AnalysisFamily {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "taint" => Ok(AnalysisFamily::Taint),
            "valueflow" | "value_flow" | "value-flow" => Ok(AnalysisFamily::ValueFlow),
            other => Err(AnalysisError::config(format!("unknown analysis family `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub family: AnalysisFamily,
    /// Grammar mode of an [`AnalysisSession`](crate::AnalysisSession) driven
    /// directly. [`Pipeline::run`](crate::Pipeline::run) ignores it and runs
    /// the classic stage before the augmented one.
    pub mode: GrammarMode,
    /// Residue classes of the augmented grammar.
    pub parity_classes: usize,
    /// Bracket family balanced by the alpha grammar.
    pub alpha_family: BracketFamily,
    /// On-demand queries between memo resets.
    pub cache_clear_interval: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            family: AnalysisFamily::Taint,
            mode: GrammarMode::Classic,
            parity_classes: 2,
            alpha_family: BracketFamily::Parenthesis,
            cache_clear_interval: 100,
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: SessionConfig =
            serde_json::from_str(text).map_err(|e| AnalysisError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| AnalysisError::io(path, e))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.parity_classes == 0 {
            return Err(AnalysisError::config("parity_classes must be at least 1"));
        }
        if self.cache_clear_interval == 0 {
            return Err(AnalysisError::config("cache_clear_interval must be at least 1"));
        }
        Ok(())
    }

    pub fn grammars(&self, mode: GrammarMode) -> DyckGrammars {
        DyckGrammars {
            mode,
            alpha_family: self.alpha_family,
            parity_classes: self.parity_classes,
        }
    }
}
