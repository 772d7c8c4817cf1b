//! Parse Module for the Viand Compiler
//!
//! Builds a [`ComponentManifest`] from a depth-annotated token stream.
//!
//! The builder keeps an explicit stack of open frames. Before each token every
//! frame at the token's depth or deeper is closed, and closing a frame hands its
//! finished node to the frame below it (or to the manifest). The token is then
//! dispatched on its category and the kind of the frame left on top.
//!
//! The parser is lenient: a declaration that does not match its pattern is
//! dropped, and a line with no sensible home degrades to a text node or is
//! skipped. Only the lexer's diagnostics are reported.

use lazy_static::lazy_static;
use regex::Regex;

use crate::diagnostics::Diagnostic;
use crate::lexer::{starts_with_keyword, Token, TokenCategory};
use crate::manifest::{
    ComponentManifest, Declaration, DefaultCase, DerivedValue, EachNode, ElementNode, ElseBranch,
    FragmentNode, FunctionNode, IfNode, Import, LogicBlock, LogicItem, MatchCase, MatchNode,
    Persona, SlotNode, StyleRule, TestBlock, ViewNode, Watcher, DEFAULT_DECLARED_TYPE,
    DEFAULT_VALUE_EXPR,
};
use crate::markup::{find_split_colon, parse_declaration, split_markup_line, text_node, MarkupDecl};
use crate::siblings::{apply_siblings, HeadReader, SiblingSources};

// ═══════════════════════════════════════════════════════════════════════════════
// DECLARATION PATTERNS
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    static ref COMPONENT_RE: Regex = Regex::new(r"^component\s+(\w+)").unwrap();
    static ref MEMORY_RE: Regex = Regex::new(r"^memory\s+(\w+)").unwrap();
    static ref IMPORT_FROM_RE: Regex =
        Regex::new(r#"^use\s+(.+?)\s+from\s+["']([^"']*)["']"#).unwrap();
    static ref IMPORT_BARE_RE: Regex = Regex::new(r"^use\s+(\w+)\s*$").unwrap();
    static ref PROP_RE: Regex = Regex::new(r#"^@prop\s+"?([A-Za-z_]\w*)"?"#).unwrap();
    static ref STATE_RE: Regex = Regex::new(r"^\$([A-Za-z_]\w*)").unwrap();
    static ref TYPE_RE: Regex = Regex::new(r"^\s*:\s*([A-Za-z0-9_\[\]]+)").unwrap();
    static ref DERIVED_RE: Regex = Regex::new(r"^sync\s+\$([A-Za-z_]\w*)\s*=\s*(.*)$").unwrap();
    static ref FUNCTION_RE: Regex = Regex::new(r"^fn\s+(\w+)\s*\((.*?)\)").unwrap();
    static ref EACH_RE: Regex =
        Regex::new(r"^each\s+\$([A-Za-z_]\w*)\s+in\s+(.+?)\s*:?\s*$").unwrap();
    static ref TEST_NAME_RE: Regex = Regex::new(r"^test\s+([\w.\-]+)").unwrap();
}

/// Module path given to bare `use NAME` imports.
pub const STDLIB_PREFIX: &str = "viand:";

// ═══════════════════════════════════════════════════════════════════════════════
// FRAMES
// ═══════════════════════════════════════════════════════════════════════════════

/// One open block. Each variant owns the node it is filling in; `depth` is the
/// depth of the line that opened it.
#[derive(Debug)]
enum Frame {
    /// Bottom of the stack; view lines here land in `manifest.view`.
    Root,
    /// `view:`; children land in `manifest.view`.
    View { depth: usize },
    Element { depth: usize, node: ElementNode },
    Fragment { depth: usize, node: FragmentNode },
    Each { depth: usize, node: EachNode },
    If { depth: usize, node: IfNode },
    /// `else` / `else if`; attached to the preceding `if` chain on close.
    Else {
        depth: usize,
        condition: Option<String>,
        children: Vec<ViewNode>,
        line: usize,
    },
    Match { depth: usize, node: MatchNode },
    Case { depth: usize, case: MatchCase },
    Default { depth: usize, case: DefaultCase },
    Function { depth: usize, function: FunctionNode },
    Block { depth: usize, block: LogicBlock },
    Lifecycle { depth: usize, body: Vec<LogicItem> },
    Watch { depth: usize, watcher: Watcher },
    TestSuite { depth: usize, name: Option<String> },
    Persona { depth: usize, test: TestBlock },
    Style { depth: usize },
    StyleRule { depth: usize, index: usize },
    Head { depth: usize, reader: HeadReader },
}

impl Frame {
    fn depth(&self) -> Option<usize> {
        match self {
            Frame::Root => None,
            Frame::View { depth }
            | Frame::Element { depth, .. }
            | Frame::Fragment { depth, .. }
            | Frame::Each { depth, .. }
            | Frame::If { depth, .. }
            | Frame::Else { depth, .. }
            | Frame::Match { depth, .. }
            | Frame::Case { depth, .. }
            | Frame::Default { depth, .. }
            | Frame::Function { depth, .. }
            | Frame::Block { depth, .. }
            | Frame::Lifecycle { depth, .. }
            | Frame::Watch { depth, .. }
            | Frame::TestSuite { depth, .. }
            | Frame::Persona { depth, .. }
            | Frame::Style { depth }
            | Frame::StyleRule { depth, .. }
            | Frame::Head { depth, .. } => Some(*depth),
        }
    }

    /// Children list of frames that own one. `Root` and `View` write to the
    /// manifest instead and are handled by the builder.
    fn view_children(&mut self) -> Option<&mut Vec<ViewNode>> {
        match self {
            Frame::Element { node, .. } => Some(&mut node.children),
            Frame::Fragment { node, .. } => Some(&mut node.children),
            Frame::Each { node, .. } => Some(&mut node.children),
            Frame::If { node, .. } => Some(&mut node.children),
            Frame::Else { children, .. } => Some(children),
            Frame::Case { case, .. } => Some(&mut case.children),
            Frame::Default { case, .. } => Some(&mut case.children),
            _ => None,
        }
    }

    fn body(&mut self) -> Option<&mut Vec<LogicItem>> {
        match self {
            Frame::Function { function, .. } => Some(&mut function.body),
            Frame::Block { block, .. } => Some(&mut block.body),
            Frame::Lifecycle { body, .. } => Some(body),
            Frame::Watch { watcher, .. } => Some(&mut watcher.body),
            Frame::Persona { test, .. } => Some(&mut test.body),
            _ => None,
        }
    }

    fn is_body(&self) -> bool {
        matches!(
            self,
            Frame::Function { .. }
                | Frame::Block { .. }
                | Frame::Lifecycle { .. }
                | Frame::Watch { .. }
                | Frame::Persona { .. }
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub manifest: ComponentManifest,
    pub reports: Vec<Diagnostic>,
}

/// Build the manifest for one component. `lexer_diagnostics` are passed
/// through into the reports untouched.
pub fn build_manifest(
    tokens: &[Token],
    lexer_diagnostics: &[Diagnostic],
    siblings: &SiblingSources,
) -> ParseOutput {
    let mut builder = ManifestBuilder::new();
    apply_siblings(&mut builder.manifest, siblings);
    for token in tokens {
        builder.process(token);
    }
    ParseOutput {
        manifest: builder.finish(),
        reports: lexer_diagnostics.to_vec(),
    }
}

struct ManifestBuilder {
    manifest: ComponentManifest,
    stack: Vec<Frame>,
}

impl ManifestBuilder {
    fn new() -> Self {
        Self {
            manifest: ComponentManifest::default(),
            stack: vec![Frame::Root],
        }
    }

    fn finish(mut self) -> ComponentManifest {
        self.close_frames_from(0);
        self.manifest
    }

    fn push(&mut self, frame: Frame) {
        self.stack.push(frame);
    }

    fn in_test(&self) -> bool {
        self.stack.iter().any(|f| matches!(f, Frame::Persona { .. }))
    }

    fn in_body(&self) -> bool {
        self.stack.last().map_or(false, Frame::is_body)
    }

    // ─── Frame closing ───────────────────────────────────────────────────────

    /// Close every frame opened at `depth` or deeper.
    fn close_frames_from(&mut self, depth: usize) {
        while let Some(top) = self.stack.last().and_then(Frame::depth) {
            if top < depth {
                break;
            }
            if let Some(frame) = self.stack.pop() {
                self.close(frame);
            }
        }
    }

    fn close(&mut self, frame: Frame) {
        match frame {
            Frame::Element { node, .. } => self.attach_view(ViewNode::Element(node)),
            Frame::Fragment { node, .. } => self.attach_view(ViewNode::Fragment(node)),
            Frame::Each { node, .. } => self.attach_view(ViewNode::Each(node)),
            Frame::If { node, .. } => self.attach_view(ViewNode::If(node)),
            Frame::Match { node, .. } => self.attach_view(ViewNode::Match(node)),
            Frame::Else {
                condition,
                children,
                line,
                ..
            } => {
                let branch = match condition {
                    Some(condition_expr) => ElseBranch::ElseIf(IfNode {
                        condition_expr,
                        children,
                        alternate: None,
                        line,
                    }),
                    None => ElseBranch::Else { children, line },
                };
                let attached = match self.view_sink().and_then(|sink| sink.last_mut()) {
                    Some(ViewNode::If(node)) => node.attach_alternate(branch).is_ok(),
                    _ => false,
                };
                if !attached {
                    tracing::trace!(line, "else branch lost its if chain");
                }
            }
            Frame::Case { case, .. } => {
                if let Some(Frame::Match { node, .. }) = self.stack.last_mut() {
                    node.cases.push(case);
                }
            }
            Frame::Default { case, .. } => {
                if let Some(Frame::Match { node, .. }) = self.stack.last_mut() {
                    node.default_case = Some(case);
                }
            }
            Frame::Function { function, .. } => self.manifest.functions.push(function),
            Frame::Block { block, .. } => {
                let line = block.line;
                match self.stack.last_mut().and_then(Frame::body) {
                    Some(body) => body.push(LogicItem::Block(block)),
                    None => tracing::trace!(line, "logic block outside a body"),
                }
            }
            Frame::Lifecycle { body, .. } => self.manifest.lifecycle_body.extend(body),
            Frame::Watch { watcher, .. } => self.manifest.watchers.push(watcher),
            Frame::Persona { test, .. } => self.manifest.tests.push(test),
            Frame::Root
            | Frame::View { .. }
            | Frame::TestSuite { .. }
            | Frame::Style { .. }
            | Frame::StyleRule { .. }
            | Frame::Head { .. } => {}
        }
    }

    // ─── Sinks ───────────────────────────────────────────────────────────────

    /// Where view nodes parsed right now should go, if anywhere.
    fn view_sink(&mut self) -> Option<&mut Vec<ViewNode>> {
        match self.stack.last_mut() {
            Some(Frame::Root) | Some(Frame::View { .. }) | None => Some(&mut self.manifest.view),
            Some(frame) => frame.view_children(),
        }
    }

    fn has_view_sink(&mut self) -> bool {
        self.view_sink().is_some()
    }

    fn attach_view(&mut self, node: ViewNode) {
        let line = node.line();
        match self.view_sink() {
            Some(sink) => sink.push(node),
            None => tracing::trace!(line, "view node outside view context"),
        }
    }

    fn fallback_text(&mut self, token: &Token) {
        if token.depth > 0 {
            self.attach_view(ViewNode::Text(text_node(&token.text, token.line_number)));
        }
    }

    // ─── Dispatch ────────────────────────────────────────────────────────────

    fn process(&mut self, token: &Token) {
        self.close_frames_from(token.depth);

        if self.declaration(token) || self.block_opener(token) {
            return;
        }

        let in_style = matches!(
            self.stack.last(),
            Some(Frame::Style { .. }) | Some(Frame::StyleRule { .. })
        );
        let in_head = matches!(self.stack.last(), Some(Frame::Head { .. }));
        if in_style {
            return self.style_line(token);
        }
        if in_head {
            return self.head_line(token);
        }
        if self.in_body() {
            return self.body_line(token);
        }

        match token.category {
            TokenCategory::ControlFlow => self.control_flow(token),
            TokenCategory::Element => self.markup(token),
            _ => self.fallback_text(token),
        }
    }

    fn declaration(&mut self, token: &Token) -> bool {
        let text = token.text.as_str();
        let line = token.line_number;
        match token.category {
            TokenCategory::Component => {
                if let Some(caps) = COMPONENT_RE.captures(text) {
                    self.manifest.name = caps[1].to_string();
                }
            }
            TokenCategory::Memory => {
                if let Some(caps) = MEMORY_RE.captures(text) {
                    self.manifest.name = caps[1].to_string();
                    self.manifest.is_singleton = true;
                }
            }
            TokenCategory::Import => match parse_import(text) {
                Some(import) => self.manifest.imports.push(import),
                None => tracing::trace!(line, "dropped malformed import"),
            },
            TokenCategory::Prop => match parse_binding(&PROP_RE, text, line) {
                Some(prop) => self.manifest.props.push(prop),
                None => tracing::trace!(line, "dropped malformed prop"),
            },
            TokenCategory::State => {
                if self.in_body() {
                    self.push_logic(LogicItem::Line {
                        text: text.to_string(),
                        line,
                    });
                } else if let Some(state) = parse_binding(&STATE_RE, text, line) {
                    self.manifest.state.push(state);
                } else {
                    tracing::trace!(line, "dropped malformed state");
                }
            }
            TokenCategory::Derived => match DERIVED_RE.captures(text) {
                Some(caps) => self.manifest.derived.push(DerivedValue {
                    id: caps[1].to_string(),
                    expr: caps[2].trim().to_string(),
                    source_line: line,
                }),
                None => tracing::trace!(line, "dropped malformed derived value"),
            },
            _ => return false,
        }
        true
    }

    fn block_opener(&mut self, token: &Token) -> bool {
        let text = token.text.as_str();
        let line = token.line_number;
        let depth = token.depth;
        match token.category {
            TokenCategory::Function => match FUNCTION_RE.captures(text) {
                Some(caps) => self.push(Frame::Function {
                    depth,
                    function: FunctionNode {
                        name: caps[1].to_string(),
                        params: caps[2]
                            .split(',')
                            .map(str::trim)
                            .filter(|p| !p.is_empty())
                            .map(String::from)
                            .collect(),
                        body: Vec::new(),
                        source_line: line,
                    },
                }),
                None => tracing::trace!(line, "dropped malformed function header"),
            },
            TokenCategory::Lifecycle => self.push(Frame::Lifecycle {
                depth,
                body: Vec::new(),
            }),
            TokenCategory::Watch => self.push(Frame::Watch {
                depth,
                watcher: Watcher {
                    dependency_expr: header_expr(text, "on change"),
                    body: Vec::new(),
                    source_line: line,
                },
            }),
            TokenCategory::TestRoot => self.push(Frame::TestSuite {
                depth,
                name: TEST_NAME_RE.captures(text).map(|c| c[1].to_string()),
            }),
            TokenCategory::TestPersona => {
                let marker = text.split(':').next().unwrap_or(text);
                match Persona::from_marker(marker) {
                    Some(persona) => {
                        let suite = self.stack.iter().rev().find_map(|f| match f {
                            Frame::TestSuite { name, .. } => name.clone(),
                            _ => None,
                        });
                        self.push(Frame::Persona {
                            depth,
                            test: TestBlock {
                                persona,
                                suite,
                                body: Vec::new(),
                                source_line: line,
                            },
                        });
                    }
                    None => tracing::trace!(line, "unknown test persona"),
                }
            }
            TokenCategory::ViewRoot => self.push(Frame::View { depth }),
            TokenCategory::StyleRoot => self.push(Frame::Style { depth }),
            TokenCategory::HeadRoot => self.push(Frame::Head {
                depth,
                reader: HeadReader::default(),
            }),
            _ => return false,
        }
        true
    }

    // ─── Style & head ────────────────────────────────────────────────────────

    fn style_line(&mut self, token: &Token) {
        let text = token.text.as_str();
        if let Some(selector) = text.strip_suffix(':') {
            let index = self.manifest.style_rules.len();
            self.manifest.style_rules.push(StyleRule {
                selector: selector.trim().to_string(),
                declarations: Vec::new(),
                source_line: token.line_number,
            });
            self.push(Frame::StyleRule {
                depth: token.depth,
                index,
            });
            return;
        }

        let rule = self.stack.iter().rev().find_map(|f| match f {
            Frame::StyleRule { index, .. } => Some(*index),
            _ => None,
        });
        match rule.and_then(|i| self.manifest.style_rules.get_mut(i)) {
            Some(rule) => rule.declarations.push(text.to_string()),
            None => tracing::trace!(line = token.line_number, "style declaration outside a rule"),
        }
    }

    fn head_line(&mut self, token: &Token) {
        let ComponentManifest { head, .. } = &mut self.manifest;
        if let Some(Frame::Head { depth, reader }) = self.stack.last_mut() {
            let nested = token.depth > *depth + 1;
            reader.feed(head, &token.text, nested);
        }
    }

    // ─── Logic bodies ────────────────────────────────────────────────────────

    fn push_logic(&mut self, item: LogicItem) {
        if let Some(body) = self.stack.last_mut().and_then(Frame::body) {
            body.push(item);
        }
    }

    fn body_line(&mut self, token: &Token) {
        let text = token.text.as_str();
        let line = token.line_number;

        if token.category == TokenCategory::ControlFlow
            && (text.starts_with("if ") || starts_with_keyword(text, "else"))
        {
            self.push(Frame::Block {
                depth: token.depth,
                block: LogicBlock {
                    header: text.to_string(),
                    body: Vec::new(),
                    line,
                },
            });
            return;
        }

        if token.category == TokenCategory::Assertion && self.in_test() {
            let expr = text.strip_prefix("must").unwrap_or(text).trim().to_string();
            self.push_logic(LogicItem::Assertion { expr, line });
            return;
        }

        self.push_logic(LogicItem::Line {
            text: text.to_string(),
            line,
        });
    }

    // ─── View: control flow ──────────────────────────────────────────────────

    fn control_flow(&mut self, token: &Token) {
        let text = token.text.as_str();
        let line = token.line_number;
        let depth = token.depth;

        if text.starts_with("case ") || starts_with_keyword(text, "default") {
            return self.match_arm(token);
        }
        if !self.has_view_sink() {
            tracing::trace!(line, "control flow outside view context");
            return;
        }

        if text.starts_with("each ") {
            match EACH_RE.captures(text) {
                Some(caps) => {
                    let list = caps[2].trim();
                    self.push(Frame::Each {
                        depth,
                        node: EachNode {
                            list_expr: list.strip_prefix('$').unwrap_or(list).to_string(),
                            item_binding: caps[1].to_string(),
                            children: Vec::new(),
                            line,
                        },
                    });
                }
                None => self.fallback_text(token),
            }
        } else if text.starts_with("match ") {
            self.push(Frame::Match {
                depth,
                node: MatchNode {
                    subject_expr: header_expr(text, "match"),
                    cases: Vec::new(),
                    default_case: None,
                    line,
                },
            });
        } else if text.starts_with("if ") {
            self.push(Frame::If {
                depth,
                node: IfNode {
                    condition_expr: header_expr(text, "if"),
                    children: Vec::new(),
                    alternate: None,
                    line,
                },
            });
        } else if starts_with_keyword(text, "else") {
            let rest = text["else".len()..].trim_start();
            let condition = rest
                .starts_with("if ")
                .then(|| header_expr(rest, "if"));
            let chain_open = matches!(
                self.view_sink().and_then(|sink| sink.last()),
                Some(ViewNode::If(node)) if node.is_open()
            );
            if chain_open {
                self.push(Frame::Else {
                    depth,
                    condition,
                    children: Vec::new(),
                    line,
                });
            } else {
                self.fallback_text(token);
            }
        } else {
            self.fallback_text(token);
        }
    }

    /// `case COND[: inline]` and `default[: inline]`, valid directly under `match`.
    fn match_arm(&mut self, token: &Token) {
        let text = token.text.as_str();
        let line = token.line_number;
        let is_case = text.starts_with("case ");
        let keyword = if is_case { "case" } else { "default" };

        let (head, inline) = match find_split_colon(text) {
            Some(idx) => (&text[..idx], Some(text[idx + 1..].trim()).filter(|s| !s.is_empty())),
            None => (text, None),
        };
        let condition = head[keyword.len()..].trim().to_string();
        let children: Vec<ViewNode> = inline
            .map(|s| ViewNode::Text(text_node(s, line)))
            .into_iter()
            .collect();

        if !matches!(self.stack.last(), Some(Frame::Match { .. })) {
            tracing::trace!(line, "{} outside match", keyword);
            return self.fallback_text(token);
        }

        let depth = token.depth;
        match (is_case, inline.is_some()) {
            (true, false) => self.push(Frame::Case {
                depth,
                case: MatchCase {
                    condition,
                    children,
                    line,
                },
            }),
            (false, false) => self.push(Frame::Default {
                depth,
                case: DefaultCase { children, line },
            }),
            (is_case, true) => {
                if let Some(Frame::Match { node, .. }) = self.stack.last_mut() {
                    if is_case {
                        node.cases.push(MatchCase {
                            condition,
                            children,
                            line,
                        });
                    } else {
                        node.default_case = Some(DefaultCase { children, line });
                    }
                }
            }
        }
    }

    // ─── View: markup ────────────────────────────────────────────────────────

    fn markup(&mut self, token: &Token) {
        let line = token.line_number;
        if !self.has_view_sink() {
            tracing::trace!(line, "markup outside view context");
            return;
        }

        let split = split_markup_line(&token.text);
        let inline_child = split
            .inline
            .map(|s| vec![ViewNode::Text(text_node(s, line))])
            .unwrap_or_default();

        match parse_declaration(split.declaration) {
            MarkupDecl::Text => {
                self.attach_view(ViewNode::Text(text_node(&token.text, line)));
            }
            MarkupDecl::Slot(name) => {
                if !self.manifest.slots.contains(&name) {
                    self.manifest.slots.push(name.clone());
                }
                self.attach_view(ViewNode::Slot(SlotNode { name, line }));
            }
            MarkupDecl::Fragment => {
                let node = FragmentNode {
                    children: inline_child,
                    line,
                };
                if split.opens_block {
                    self.push(Frame::Fragment {
                        depth: token.depth,
                        node,
                    });
                } else {
                    self.attach_view(ViewNode::Fragment(node));
                }
            }
            MarkupDecl::Element(decl) => {
                if let Some(name) = &decl.ref_name {
                    self.manifest.element_refs.insert(name.clone());
                }
                let node = ElementNode {
                    tag: decl.tag,
                    attributes: decl.attributes,
                    ref_name: decl.ref_name,
                    children: inline_child,
                    line,
                };
                if split.opens_block {
                    self.push(Frame::Element {
                        depth: token.depth,
                        node,
                    });
                } else {
                    self.attach_view(ViewNode::Element(node));
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LINE HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Text after `keyword`, without a trailing block colon.
fn header_expr(text: &str, keyword: &str) -> String {
    text.strip_prefix(keyword)
        .unwrap_or(text)
        .trim()
        .trim_end_matches(':')
        .trim()
        .to_string()
}

fn parse_import(text: &str) -> Option<Import> {
    if let Some(caps) = IMPORT_FROM_RE.captures(text) {
        let name: String = caps[1].chars().filter(|c| *c != '{' && *c != '}').collect();
        return Some(Import {
            name: name.trim().to_string(),
            path: caps[2].to_string(),
        });
    }
    IMPORT_BARE_RE.captures(text).map(|caps| Import {
        name: caps[1].to_string(),
        path: format!("{}{}", STDLIB_PREFIX, &caps[1]),
    })
}

/// Shared shape of `@prop name: type = value` and `$name: type = value`.
fn parse_binding(pattern: &Regex, text: &str, line: usize) -> Option<Declaration> {
    let caps = pattern.captures(text)?;
    let end = caps.get(0)?.end();
    let rest = &text[end..];
    let (head, value) = match rest.find('=') {
        Some(i) => (&rest[..i], Some(rest[i + 1..].trim())),
        None => (rest, None),
    };
    Some(Declaration {
        id: caps[1].to_string(),
        declared_type: TYPE_RE
            .captures(head)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| DEFAULT_DECLARED_TYPE.to_string()),
        default_value_expr: value
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_VALUE_EXPR)
            .to_string(),
        source_line: line,
    })
}
