//! Compile Module for the Viand Compiler
//!
//! Pipeline entry points. One compile runs lexer, hierarchy pass and manifest
//! builder over a single source and its siblings; nothing is shared between
//! compiles, so batches run in parallel.

#[cfg(feature = "napi")]
use napi_derive::napi;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::diagnostics::{
    CompileError, Diagnostic, DiagnosticPolicy, Severity, DIAG_DUPLICATE_DECLARATION,
    DIAG_MISALIGNED_DEDENT,
};
use crate::hierarchy::assign_depths;
use crate::lexer::tokenize;
use crate::manifest::{ComponentManifest, Declaration};
use crate::options::CompileOptions;
use crate::parse::{build_manifest, ParseOutput};
use crate::siblings::SiblingSources;

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOutput {
    pub manifest: ComponentManifest,
    pub reports: Vec<Diagnostic>,
}

impl CompileOutput {
    /// Reports in their `Line <n>: <message>` form.
    pub fn report_lines(&self) -> Vec<String> {
        self.reports.iter().map(ToString::to_string).collect()
    }

    pub fn has_errors(&self) -> bool {
        self.reports.iter().any(|d| d.severity == Severity::Error)
    }
}

/// One file of a batch compile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceUnit {
    pub file_id: String,
    pub source: String,
    pub siblings: SiblingSources,
}

/// A code generator consuming a finished manifest. Implementations only read
/// the manifest; `$name` references are still in sigil form.
pub trait Backend {
    type Error: std::error::Error;

    fn name(&self) -> &str;

    fn emit(&self, manifest: &ComponentManifest) -> Result<String, Self::Error>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Compile one component. Never fails; every problem is in `reports`.
pub fn compile(source: &str, siblings: &SiblingSources, options: &CompileOptions) -> CompileOutput {
    let config = options.lexer_config();
    let mut lexed = tokenize(source, &config);
    let hierarchy = assign_depths(&mut lexed.tokens);

    let ParseOutput {
        manifest,
        mut reports,
    } = build_manifest(&lexed.tokens, &lexed.diagnostics, siblings);

    if options.strict {
        reports.extend(hierarchy.misaligned_dedents.iter().map(|&line| {
            Diagnostic::warning(
                DIAG_MISALIGNED_DEDENT,
                line,
                "Dedent does not line up with an enclosing block",
            )
        }));
        reports.extend(duplicate_declarations("prop", &manifest.props));
        reports.extend(duplicate_declarations("state", &manifest.state));
        reports.sort_by_key(|d| d.line);
    }

    tracing::debug!(
        file = %options.file_id,
        tokens = lexed.tokens.len(),
        diagnostics = reports.len(),
        "compiled {}",
        manifest.name
    );

    CompileOutput { manifest, reports }
}

/// [`compile`], then apply the options' [`DiagnosticPolicy`].
pub fn compile_checked(
    source: &str,
    siblings: &SiblingSources,
    options: &CompileOptions,
) -> Result<CompileOutput, CompileError> {
    let output = compile(source, siblings, options);
    if options.diagnostic_policy == DiagnosticPolicy::Fatal {
        let mut errors = output
            .reports
            .iter()
            .filter(|d| d.severity == Severity::Error);
        if let Some(first) = errors.next() {
            return Err(CompileError::Diagnostics {
                file: options.file_id.clone(),
                count: 1 + errors.count(),
                first: first.clone(),
            });
        }
    }
    Ok(output)
}

/// Compile independent units in parallel. Output order matches `units`; each
/// unit's `file_id` replaces the one in `options`.
pub fn compile_batch(units: &[SourceUnit], options: &CompileOptions) -> Vec<CompileOutput> {
    units
        .par_iter()
        .map(|unit| {
            let options = CompileOptions {
                file_id: unit.file_id.clone(),
                ..options.clone()
            };
            compile(&unit.source, &unit.siblings, &options)
        })
        .collect()
}

fn duplicate_declarations(kind: &str, declarations: &[Declaration]) -> Vec<Diagnostic> {
    let mut seen = HashSet::new();
    declarations
        .iter()
        .filter(|d| !seen.insert(d.id.as_str()))
        .map(|d| {
            Diagnostic::warning(
                DIAG_DUPLICATE_DECLARATION,
                d.source_line,
                format!("Duplicate {} '{}' shadows an earlier declaration", kind, d.id),
            )
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE BRIDGE
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
fn options_from_bridge(options_json: Option<String>) -> napi::Result<CompileOptions> {
    match options_json {
        Some(json) => {
            CompileOptions::from_json(&json).map_err(|e| napi::Error::from_reason(e.to_string()))
        }
        None => Ok(CompileOptions::default()),
    }
}

#[cfg(feature = "napi")]
#[napi(js_name = "compileViand")]
pub fn compile_viand_native(
    source: String,
    siblings_json: Option<String>,
    options_json: Option<String>,
) -> napi::Result<serde_json::Value> {
    let siblings = match siblings_json {
        Some(json) => SiblingSources::from_json(&json)
            .map_err(|e| napi::Error::from_reason(e.to_string()))?,
        None => SiblingSources::default(),
    };
    let options = options_from_bridge(options_json)?;
    let output = compile_checked(&source, &siblings, &options)
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_value(output).map_err(|e| napi::Error::from_reason(e.to_string()))
}

#[cfg(feature = "napi")]
#[napi(js_name = "formatViand")]
pub fn format_viand_native(source: String, options_json: Option<String>) -> napi::Result<String> {
    let options = options_from_bridge(options_json)?;
    Ok(crate::format::format_source(&source, &options))
}
