//! Lexer Module for the Viand Compiler
//!
//! Turns source text into one classified [`Token`] per meaningful line.
//! Classification is line-local: each trimmed line is tested against
//! [`CLASSIFICATION_ORDER`] top to bottom and the first predicate that matches
//! decides the category. Lines nothing claims become [`TokenCategory::Expression`].

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, DIAG_INDENT_WIDTH};
use crate::options::LexerConfig;

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenCategory {
    Component,
    Memory,
    Import,
    Prop,
    State,
    Derived,
    Function,
    Lifecycle,
    Watch,
    StyleRoot,
    HeadRoot,
    TestRoot,
    TestPersona,
    ViewRoot,
    ControlFlow,
    Element,
    Assertion,
    Expression,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub line_number: usize,
    pub raw_indent_width: usize,
    pub category: TokenCategory,
    /// Comment-stripped and trimmed.
    pub text: String,
    /// The line as written.
    pub raw_text: String,
    /// Nesting level; zero until the hierarchy pass runs.
    pub depth: usize,
}

#[derive(Debug, Clone, Default)]
pub struct LexResult {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLASSIFICATION TABLE
// ═══════════════════════════════════════════════════════════════════════════════

pub type Predicate = fn(&str, &LexerConfig) -> bool;

/// Priority order of line classification. Earlier entries shadow later ones:
/// a `$` line is state even when it carries `:` or `(`, which would otherwise
/// make it markup.
pub const CLASSIFICATION_ORDER: &[(TokenCategory, Predicate)] = &[
    (TokenCategory::Component, is_component),
    (TokenCategory::Memory, is_memory),
    (TokenCategory::ViewRoot, is_view_root),
    (TokenCategory::StyleRoot, is_style_root),
    (TokenCategory::HeadRoot, is_head_root),
    (TokenCategory::TestRoot, is_test_root),
    (TokenCategory::Assertion, is_assertion),
    (TokenCategory::TestPersona, is_test_persona),
    (TokenCategory::State, is_state),
    (TokenCategory::Prop, is_prop),
    (TokenCategory::Derived, is_derived),
    (TokenCategory::Import, is_import),
    (TokenCategory::Function, is_function),
    (TokenCategory::Lifecycle, is_lifecycle),
    (TokenCategory::Watch, is_watch),
    (TokenCategory::ControlFlow, is_control_flow),
    (TokenCategory::Element, is_element),
];

lazy_static! {
    static ref TEST_ROOT_RE: Regex = Regex::new(r"^test(?:\s+[\w.\-]+)?\s*:$").unwrap();
    static ref PASCAL_RE: Regex = Regex::new(r"^[A-Z]").unwrap();
}

const PERSONAS: &[&str] = &["@logic", "@ui", "@integration"];

/// Markup keywords that are not tags.
const MARKUP_KEYWORDS: &[&str] = &["slot", "fragment"];

/// `text` begins with `keyword` as a whole word.
pub(crate) fn starts_with_keyword(text: &str, keyword: &str) -> bool {
    match text.strip_prefix(keyword) {
        Some(rest) => {
            rest.is_empty() || rest.starts_with(|c: char| c.is_whitespace() || c == ':')
        }
        None => false,
    }
}

fn is_component(text: &str, _: &LexerConfig) -> bool {
    starts_with_keyword(text, "component")
}

fn is_memory(text: &str, _: &LexerConfig) -> bool {
    starts_with_keyword(text, "memory")
}

fn is_view_root(text: &str, _: &LexerConfig) -> bool {
    text.starts_with("view:")
}

fn is_style_root(text: &str, _: &LexerConfig) -> bool {
    text.starts_with("style:")
}

fn is_head_root(text: &str, _: &LexerConfig) -> bool {
    text.starts_with("head:")
}

fn is_test_root(text: &str, _: &LexerConfig) -> bool {
    TEST_ROOT_RE.is_match(text)
}

fn is_assertion(text: &str, _: &LexerConfig) -> bool {
    text.starts_with("must ")
}

fn is_test_persona(text: &str, _: &LexerConfig) -> bool {
    PERSONAS.iter().any(|p| starts_with_keyword(text, p))
}

fn is_state(text: &str, _: &LexerConfig) -> bool {
    text.starts_with('$')
}

fn is_prop(text: &str, _: &LexerConfig) -> bool {
    starts_with_keyword(text, "@prop")
}

fn is_derived(text: &str, _: &LexerConfig) -> bool {
    text.starts_with("sync ")
}

fn is_import(text: &str, _: &LexerConfig) -> bool {
    text.starts_with("use ")
}

fn is_function(text: &str, _: &LexerConfig) -> bool {
    text.starts_with("fn ")
}

fn is_lifecycle(text: &str, _: &LexerConfig) -> bool {
    text.starts_with("on mount:")
}

fn is_watch(text: &str, _: &LexerConfig) -> bool {
    text.starts_with("on change ")
}

fn is_control_flow(text: &str, _: &LexerConfig) -> bool {
    text.starts_with("each ")
        || text.starts_with("if ")
        || text.starts_with("match ")
        || text.starts_with("case ")
        || starts_with_keyword(text, "else")
        || starts_with_keyword(text, "default")
}

fn is_element(text: &str, config: &LexerConfig) -> bool {
    if text.contains(':') || text.contains('(') || text.contains('#') {
        return true;
    }
    if MARKUP_KEYWORDS.iter().any(|k| starts_with_keyword(text, k)) {
        return true;
    }
    let first_word = text
        .split(|c: char| c == ' ' || c == '.' || c == '(' || c == '#' || c == ':')
        .next()
        .unwrap_or("");
    config.known_tags.contains(first_word) || PASCAL_RE.is_match(first_word)
}

/// Classify one comment-stripped, trimmed line.
pub fn classify(text: &str, config: &LexerConfig) -> TokenCategory {
    CLASSIFICATION_ORDER
        .iter()
        .find(|(_, predicate)| predicate(text, config))
        .map(|(category, _)| *category)
        .unwrap_or(TokenCategory::Expression)
}

// ═══════════════════════════════════════════════════════════════════════════════
// LINE SCANNING
// ═══════════════════════════════════════════════════════════════════════════════

/// Remove a trailing `//` comment that is not inside a quoted string.
pub fn strip_line_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'"' || b == b'\'' || b == b'`' {
                    quote = Some(b);
                } else if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
                    return &line[..i];
                }
            }
        }
        i += 1;
    }
    line
}

fn leading_whitespace(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

/// Split `source` into classified tokens and indentation diagnostics.
pub fn tokenize(source: &str, config: &LexerConfig) -> LexResult {
    let mut result = LexResult::default();
    let unit = config.indent_unit.max(1);

    for (index, line) in source.lines().enumerate() {
        let line_number = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let text = strip_line_comment(line).trim();
        if text.is_empty() {
            continue;
        }

        let raw_indent_width = leading_whitespace(line);
        if raw_indent_width % unit != 0 {
            result.diagnostics.push(Diagnostic::error(
                DIAG_INDENT_WIDTH,
                line_number,
                format!(
                    "Indentation Error (used {} spaces, must be multiple of {})",
                    raw_indent_width, unit
                ),
            ));
        }

        result.tokens.push(Token {
            line_number,
            raw_indent_width,
            category: classify(text, config),
            text: text.to_string(),
            raw_text: line.to_string(),
            depth: 0,
        });
    }

    result
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
