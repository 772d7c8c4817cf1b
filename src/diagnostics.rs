//! Diagnostics for the Viand front-end
//!
//! Every report the pipeline produces is a [`Diagnostic`]. Nothing here aborts
//! parsing: whether diagnostics are fatal is decided by the caller through
//! [`DiagnosticPolicy`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const DIAG_INDENT_WIDTH: &str = "VIAND-INDENT";
pub const DIAG_MISALIGNED_DEDENT: &str = "VIAND-DEDENT";
pub const DIAG_DUPLICATE_DECLARATION: &str = "VIAND-DUPLICATE";

fn get_hint(code: &str) -> &'static str {
    match code {
        DIAG_INDENT_WIDTH => "Indent every nested block by the configured unit.",
        DIAG_MISALIGNED_DEDENT => "Dedent back to the indentation of an enclosing block.",
        DIAG_DUPLICATE_DECLARATION => "Later declarations shadow earlier ones in generated code.",
        _ => "",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub severity: Severity,
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn error(code: &str, line: usize, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            severity: Severity::Error,
            line,
            message: message.into(),
        }
    }

    pub fn warning(code: &str, line: usize, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            severity: Severity::Warning,
            line,
            message: message.into(),
        }
    }

    pub fn hint(&self) -> &'static str {
        get_hint(&self.code)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POLICY & ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// How the caller wants accumulated diagnostics treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticPolicy {
    /// Diagnostics are returned alongside the manifest.
    #[default]
    Advisory,
    /// Any error-severity diagnostic fails the compile.
    Fatal,
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{file}: {count} diagnostic(s), first: {first}")]
    Diagnostics {
        file: String,
        count: usize,
        first: Diagnostic,
    },
    #[error("invalid compile options: {0}")]
    InvalidOptions(#[source] serde_json::Error),
    #[error("invalid sibling sources: {0}")]
    InvalidSiblings(#[source] serde_json::Error),
}
