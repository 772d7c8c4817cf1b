//! Canonical formatter for Viand source.
//!
//! Re-emits every token at `depth * indent_unit` spaces. Markup lines get a
//! single space around the event arrow and after the inline colon. Comments
//! and blank lines do not survive.

use crate::hierarchy::assign_depths;
use crate::lexer::{tokenize, TokenCategory};
use crate::markup::{rfind_top_level, split_markup_line};
use crate::options::CompileOptions;

pub fn format_source(source: &str, options: &CompileOptions) -> String {
    let config = options.lexer_config();
    let mut tokens = tokenize(source, &config).tokens;
    assign_depths(&mut tokens);

    let mut out = String::new();
    for token in &tokens {
        out.push_str(&" ".repeat(token.depth * config.indent_unit));
        if token.category == TokenCategory::Element {
            out.push_str(&normalize_markup(&token.text));
        } else {
            out.push_str(&token.text);
        }
        out.push('\n');
    }
    out
}

fn normalize_markup(text: &str) -> String {
    let split = split_markup_line(text);
    let declaration = normalize_arrow(split.declaration);
    let line = match split.inline {
        Some(inline) => format!("{}: {}", declaration, inline),
        None if split.opens_block => format!("{}:", declaration),
        None => declaration,
    };
    line.trim().to_string()
}

fn normalize_arrow(declaration: &str) -> String {
    match rfind_top_level(declaration, "->") {
        Some(i) => format!(
            "{} -> {}",
            declaration[..i].trim_end(),
            declaration[i + 2..].trim_start()
        ),
        None => declaration.to_string(),
    }
}
