//! Compile configuration
//!
//! Options are plain data: the lexer and parser read them, nothing mutates them.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::diagnostics::{CompileError, DiagnosticPolicy};

pub const DEFAULT_INDENT_UNIT: usize = 4;

/// Markup tags the classifier recognizes without any other markup cue.
pub const DEFAULT_KNOWN_TAGS: &[&str] = &[
    "div", "span", "p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "button", "input",
    "canvas", "img", "a", "nav", "footer", "main", "section", "article", "header", "form", "label",
    "textarea", "select", "option", "table", "tr", "td", "th", "thead", "tbody", "strong", "em",
    "small", "pre", "code",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    pub file_id: String,
    pub indent_unit: usize,
    pub known_tags: Vec<String>,
    pub strict: bool,
    pub diagnostic_policy: DiagnosticPolicy,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            file_id: "<anonymous>".to_string(),
            indent_unit: DEFAULT_INDENT_UNIT,
            known_tags: DEFAULT_KNOWN_TAGS.iter().map(|t| t.to_string()).collect(),
            strict: false,
            diagnostic_policy: DiagnosticPolicy::Advisory,
        }
    }
}

impl CompileOptions {
    pub fn for_file(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, CompileError> {
        serde_json::from_str(json).map_err(CompileError::InvalidOptions)
    }

    pub fn lexer_config(&self) -> LexerConfig {
        LexerConfig {
            indent_unit: self.indent_unit.max(1),
            known_tags: self.known_tags.iter().cloned().collect(),
        }
    }
}

/// The subset of options the lexer needs, with the tag list as a set.
#[derive(Debug, Clone)]
pub struct LexerConfig {
    pub indent_unit: usize,
    pub known_tags: HashSet<String>,
}

impl Default for LexerConfig {
    fn default() -> Self {
        CompileOptions::default().lexer_config()
    }
}
