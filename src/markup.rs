//! Markup line parsing for the Viand view grammar.
//!
//! A markup line has the shape
//! `tag.class#ref(key: value, ...) -> event(handler): inline content`.
//! Every split here is depth-aware: separators inside `()`, `[]`, `{}` or a
//! quoted string never count.

use lazy_static::lazy_static;
use regex::Regex;
use std::str::CharIndices;

use crate::lexer::starts_with_keyword;
use crate::manifest::{AttributeValue, Attributes, HandlerRef, TextKind, TextNode};

lazy_static! {
    static ref SLOT_NAME_RE: Regex = Regex::new(r"^slot\s+(\w+)").unwrap();
    static ref REF_RE: Regex = Regex::new(r"#([A-Za-z_][\w-]*)").unwrap();
    static ref EVENT_RE: Regex = Regex::new(r"^([A-Za-z0-9_.]+)\s*\((.*)\)$").unwrap();
    static ref HANDLER_PATH_RE: Regex = Regex::new(r"^[A-Za-z_$][\w$.]*$").unwrap();
    static ref VARIABLE_RE: Regex = Regex::new(r"\$[A-Za-z_]\w*").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"^[A-Za-z][\w-]*$").unwrap();
}

pub const DEFAULT_SLOT_NAME: &str = "children";
pub const DEFAULT_TAG: &str = "div";
pub const FRAGMENT_TAG: &str = "fragment";

/// Attribute prefixes whose own colon belongs to the key (`class:active: $on`).
const COMPOUND_ATTRIBUTE_PREFIXES: &[&str] = &["bind", "class", "style"];

// ═══════════════════════════════════════════════════════════════════════════════
// TOP-LEVEL SCANNING
// ═══════════════════════════════════════════════════════════════════════════════

/// Yields the characters of a string that sit outside every bracket pair and
/// quoted string. Bracket and quote characters themselves are never yielded.
struct TopLevel<'a> {
    chars: CharIndices<'a>,
    depth: i32,
    quote: Option<char>,
    escaped: bool,
}

impl<'a> TopLevel<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.char_indices(),
            depth: 0,
            quote: None,
            escaped: false,
        }
    }
}

impl Iterator for TopLevel<'_> {
    type Item = (usize, char);

    fn next(&mut self) -> Option<Self::Item> {
        for (i, c) in self.chars.by_ref() {
            if let Some(q) = self.quote {
                if self.escaped {
                    self.escaped = false;
                } else if c == '\\' {
                    self.escaped = true;
                } else if c == q {
                    self.quote = None;
                }
                continue;
            }
            match c {
                '"' | '\'' | '`' => self.quote = Some(c),
                '(' | '[' | '{' => self.depth += 1,
                ')' | ']' | '}' => self.depth -= 1,
                _ if self.depth == 0 => return Some((i, c)),
                _ => {}
            }
        }
        None
    }
}

/// Byte offset of the first colon outside brackets and quotes.
pub fn find_split_colon(text: &str) -> Option<usize> {
    TopLevel::new(text).find(|&(_, c)| c == ':').map(|(i, _)| i)
}

/// Split on `separator` wherever it appears outside brackets and quotes.
pub fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, c) in TopLevel::new(text) {
        if c == separator {
            parts.push(&text[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Byte offset of the last top-level occurrence of `pattern`.
pub(crate) fn rfind_top_level(text: &str, pattern: &str) -> Option<usize> {
    let first = pattern.chars().next()?;
    TopLevel::new(text)
        .filter(|&(i, c)| c == first && text[i..].starts_with(pattern))
        .map(|(i, _)| i)
        .last()
}

// ═══════════════════════════════════════════════════════════════════════════════
// MARKUP LINES
// ═══════════════════════════════════════════════════════════════════════════════

/// A markup line split into its declaration and optional inline content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupLine<'a> {
    pub declaration: &'a str,
    pub inline: Option<&'a str>,
    /// Ends in a bare `:`; the following deeper lines are children.
    pub opens_block: bool,
}

pub fn split_markup_line(text: &str) -> MarkupLine<'_> {
    let text = text.trim();
    match find_split_colon(text) {
        Some(idx) => {
            let inline = text[idx + 1..].trim();
            MarkupLine {
                declaration: text[..idx].trim(),
                inline: (!inline.is_empty()).then_some(inline),
                opens_block: inline.is_empty(),
            }
        }
        None => MarkupLine {
            declaration: text,
            inline: None,
            opens_block: false,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDecl {
    pub tag: String,
    pub ref_name: Option<String>,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupDecl {
    Slot(String),
    Fragment,
    Element(ElementDecl),
    /// Not a markup declaration at all; the line is prose.
    Text,
}

pub fn parse_declaration(declaration: &str) -> MarkupDecl {
    let declaration = declaration.trim();

    if starts_with_keyword(declaration, "slot") {
        let name = SLOT_NAME_RE
            .captures(declaration)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| DEFAULT_SLOT_NAME.to_string());
        return MarkupDecl::Slot(name);
    }

    let (tag_side, event_side) = match rfind_top_level(declaration, "->") {
        Some(i) => (declaration[..i].trim(), Some(declaration[i + 2..].trim())),
        None => (declaration, None),
    };

    let mut attributes = Attributes::new();
    let head = match (tag_side.find('('), tag_side.rfind(')')) {
        (Some(open), Some(close)) if open < close => {
            parse_attribute_list(&tag_side[open + 1..close], &mut attributes);
            tag_side[..open].trim()
        }
        _ => tag_side,
    };

    let ref_name = REF_RE.captures(head).map(|c| c[1].to_string());
    let head = REF_RE.replace_all(head, "");
    let mut parts = head.split('.').map(str::trim);
    let tag = match parts.next() {
        Some(t) if TAG_RE.is_match(t) => t.to_string(),
        Some(t) if !t.is_empty() => return MarkupDecl::Text,
        _ => DEFAULT_TAG.to_string(),
    };
    let classes: Vec<&str> = parts.filter(|c| !c.is_empty()).collect();
    if !classes.is_empty() {
        attributes.insert("class", AttributeValue::Expr(classes.join(" ")));
    }

    if let Some(event) = event_side.filter(|e| !e.is_empty()) {
        let (name, handler) = parse_event_binding(event);
        attributes.insert(name, AttributeValue::Handler(handler));
    }

    if tag == FRAGMENT_TAG && attributes.is_empty() && ref_name.is_none() {
        return MarkupDecl::Fragment;
    }

    MarkupDecl::Element(ElementDecl {
        tag,
        ref_name,
        attributes,
    })
}

fn parse_attribute_list(raw: &str, attributes: &mut Attributes) {
    for pair in split_top_level(raw, ',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let Some(idx) = find_split_colon(pair) else {
            attributes.insert(pair, AttributeValue::Expr("true".to_string()));
            continue;
        };
        let mut key = pair[..idx].trim().to_string();
        let mut value = pair[idx + 1..].trim();
        if COMPOUND_ATTRIBUTE_PREFIXES.contains(&key.as_str()) {
            if let Some(next) = find_split_colon(value) {
                key = format!("{}:{}", key, value[..next].trim());
                value = value[next + 1..].trim();
            }
        }
        attributes.insert(key, AttributeValue::Expr(value.to_string()));
    }
}

/// `click()` binds a click to `click()`, `input(update)` forwards the input
/// event to `update`, `keydown.enter(submit())` becomes `onkeydown|enter`.
fn parse_event_binding(event: &str) -> (String, HandlerRef) {
    if let Some(caps) = EVENT_RE.captures(event) {
        let name = &caps[1];
        let args = caps[2].trim();
        if args.is_empty() {
            return (
                "onclick".to_string(),
                HandlerRef {
                    handler: format!("{}()", name),
                    forwards_event: false,
                },
            );
        }
        return (
            format!("on{}", name.replace('.', "|")),
            HandlerRef {
                handler: args.to_string(),
                forwards_event: !args.ends_with(')'),
            },
        );
    }

    let bare = event.trim_end_matches("()").trim();
    let handler = if HANDLER_PATH_RE.is_match(bare) {
        format!("{}()", bare)
    } else {
        event.to_string()
    };
    (
        "onclick".to_string(),
        HandlerRef {
            handler,
            forwards_event: false,
        },
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Inner text when `text` is exactly one quoted string literal.
fn unquote(text: &str) -> Option<&str> {
    let quote = text.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let mut escaped = false;
    for (i, c) in text.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return (i + c.len_utf8() == text.len()).then(|| &text[1..i]);
        }
    }
    None
}

pub fn text_node(raw: &str, line: usize) -> TextNode {
    let trimmed = raw.trim();
    match unquote(trimmed) {
        Some(inner) => TextNode {
            content: inner.to_string(),
            kind: if VARIABLE_RE.is_match(inner) {
                TextKind::Interpolated
            } else {
                TextKind::Literal
            },
            line,
        },
        None => TextNode {
            content: trimmed.to_string(),
            kind: TextKind::Expression,
            line,
        },
    }
}
