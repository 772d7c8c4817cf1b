//! # Viand Compiler Front-End
//!
//! Compiles an indentation-sensitive component source into a
//! [`ComponentManifest`], the IR every code-generating backend consumes.
//!
//! ## Pipeline
//!
//! 1. **Lexer** (`lexer`): one classified [`Token`] per meaningful line, plus
//!    indentation-width diagnostics. Classification walks
//!    [`CLASSIFICATION_ORDER`]; the first predicate to match wins.
//! 2. **Hierarchy** (`hierarchy`): raw indentation widths become nesting
//!    depths through an indent stack. Uneven dedents are tolerated.
//! 3. **Manifest builder** (`parse`): a typed frame stack turns the depth
//!    annotated tokens into the manifest. Sibling texts (SQL, API,
//!    localization, head) are parsed by their own small readers (`siblings`).
//!
//! ## Manifest Invariants
//!
//! - Expressions, logic lines and attribute values are opaque strings. Variable
//!   references keep their `$name` sigil; rewriting them is a backend concern.
//! - Nesting is fully resolved: backends never look at indentation or
//!   attribute syntax again.
//! - `if` / `else if` / `else` is one [`IfNode`] with a linked `alternate`
//!   chain, never sibling nodes.
//! - Parsing is total. Malformed lines are dropped or degrade to text nodes;
//!   the only diagnostics come from the lexer (and, with `strict`, from the
//!   duplicate and dedent checks).

mod compile;
mod diagnostics;
mod format;
mod hierarchy;
mod lexer;
mod manifest;
mod markup;
mod options;
mod parse;
mod siblings;

#[cfg(test)]
mod parse_tests;

pub use compile::{compile, compile_batch, compile_checked, Backend, CompileOutput, SourceUnit};
#[cfg(feature = "napi")]
pub use compile::{compile_viand_native, format_viand_native};
pub use diagnostics::*;
pub use format::format_source;
pub use hierarchy::{assign_depths, HierarchyReport};
pub use lexer::{classify, tokenize, LexResult, Predicate, Token, TokenCategory, CLASSIFICATION_ORDER};
pub use manifest::*;
pub use markup::{find_split_colon, split_markup_line, split_top_level, MarkupLine};
pub use options::{CompileOptions, LexerConfig, DEFAULT_INDENT_UNIT, DEFAULT_KNOWN_TAGS};
pub use parse::{build_manifest, ParseOutput};
pub use siblings::{
    parse_api_endpoints, parse_head, parse_localization, parse_sql_queries, SiblingSources,
};
