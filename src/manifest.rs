//! Component manifest: the IR handed to every backend.
//!
//! Logic, text and attribute strings stay opaque. Variable references keep
//! their `$` sigil; rewriting them is up to each backend.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ═══════════════════════════════════════════════════════════════════════════════
// MANIFEST
// ═══════════════════════════════════════════════════════════════════════════════

pub const DEFAULT_COMPONENT_NAME: &str = "Component";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentManifest {
    pub name: String,
    pub is_singleton: bool,
    pub imports: Vec<Import>,
    pub props: Vec<Declaration>,
    pub state: Vec<Declaration>,
    pub derived: Vec<DerivedValue>,
    pub functions: Vec<FunctionNode>,
    pub lifecycle_body: Vec<LogicItem>,
    pub watchers: Vec<Watcher>,
    pub element_refs: BTreeSet<String>,
    pub style_rules: Vec<StyleRule>,
    pub view: Vec<ViewNode>,
    /// Slot names in first-seen order.
    pub slots: Vec<String>,
    pub tests: Vec<TestBlock>,
    pub sql_queries: Vec<SqlQuery>,
    pub api_endpoints: Vec<ApiEndpoint>,
    /// key -> locale -> text
    pub localization: BTreeMap<String, BTreeMap<String, String>>,
    pub head: HeadMetadata,
}

impl Default for ComponentManifest {
    fn default() -> Self {
        Self {
            name: DEFAULT_COMPONENT_NAME.to_string(),
            is_singleton: false,
            imports: Vec::new(),
            props: Vec::new(),
            state: Vec::new(),
            derived: Vec::new(),
            functions: Vec::new(),
            lifecycle_body: Vec::new(),
            watchers: Vec::new(),
            element_refs: BTreeSet::new(),
            style_rules: Vec::new(),
            view: Vec::new(),
            slots: Vec::new(),
            tests: Vec::new(),
            sql_queries: Vec::new(),
            api_endpoints: Vec::new(),
            localization: BTreeMap::new(),
            head: HeadMetadata::default(),
        }
    }
}

impl ComponentManifest {
    pub fn state_named(&self, id: &str) -> Option<&Declaration> {
        self.state.iter().rev().find(|d| d.id == id)
    }

    pub fn prop_named(&self, id: &str) -> Option<&Declaration> {
        self.props.iter().rev().find(|d| d.id == id)
    }

    pub fn function_named(&self, name: &str) -> Option<&FunctionNode> {
        self.functions.iter().find(|f| f.name == name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECLARATIONS & LOGIC
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Import {
    pub name: String,
    pub path: String,
}

pub const DEFAULT_DECLARED_TYPE: &str = "any";
pub const DEFAULT_VALUE_EXPR: &str = "undefined";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Declaration {
    pub id: String,
    pub declared_type: String,
    pub default_value_expr: String,
    pub source_line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedValue {
    pub id: String,
    pub expr: String,
    pub source_line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionNode {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<LogicItem>,
    pub source_line: usize,
}

/// One entry of a function, lifecycle, watcher or test body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LogicItem {
    Line { text: String, line: usize },
    Block(LogicBlock),
    /// `must EXPR` with the keyword stripped.
    Assertion { expr: String, line: usize },
}

impl LogicItem {
    pub fn as_line(&self) -> Option<&str> {
        match self {
            LogicItem::Line { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// A nested conditional inside logic; `header` is the verbatim `if ...:` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicBlock {
    pub header: String,
    pub body: Vec<LogicItem>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watcher {
    pub dependency_expr: String,
    pub body: Vec<LogicItem>,
    pub source_line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleRule {
    pub selector: String,
    pub declarations: Vec<String>,
    pub source_line: usize,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    Logic,
    Ui,
    Integration,
}

impl Persona {
    /// Parse `@logic`, `@ui` or `@integration`, with or without a trailing colon.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker.trim().trim_end_matches(':').trim() {
            "@logic" => Some(Persona::Logic),
            "@ui" => Some(Persona::Ui),
            "@integration" => Some(Persona::Integration),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestBlock {
    pub persona: Persona,
    /// Name from the enclosing `test NAME:` line, if any.
    pub suite: Option<String>,
    pub body: Vec<LogicItem>,
    pub source_line: usize,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIBLING DSL RESULTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlQuery {
    pub label: String,
    pub statement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    pub label: String,
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub mock: String,
}

impl ApiEndpoint {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            method: "GET".to_string(),
            path: "/".to_string(),
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
            mock: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadMetadata {
    pub fields: BTreeMap<String, String>,
    pub sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl HeadMetadata {
    pub fn title(&self) -> Option<&str> {
        self.fields.get("title").map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.sections.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VIEW NODES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ViewNode {
    Element(ElementNode),
    Text(TextNode),
    Fragment(FragmentNode),
    Each(EachNode),
    If(IfNode),
    Match(MatchNode),
    Slot(SlotNode),
}

impl ViewNode {
    pub fn line(&self) -> usize {
        match self {
            ViewNode::Element(n) => n.line,
            ViewNode::Text(n) => n.line,
            ViewNode::Fragment(n) => n.line,
            ViewNode::Each(n) => n.line,
            ViewNode::If(n) => n.line,
            ViewNode::Match(n) => n.line,
            ViewNode::Slot(n) => n.line,
        }
    }

    pub fn children(&self) -> &[ViewNode] {
        match self {
            ViewNode::Element(n) => &n.children,
            ViewNode::Fragment(n) => &n.children,
            ViewNode::Each(n) => &n.children,
            ViewNode::If(n) => &n.children,
            ViewNode::Text(_) | ViewNode::Match(_) | ViewNode::Slot(_) => &[],
        }
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            ViewNode::Element(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match self {
            ViewNode::Text(n) => Some(n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub tag: String,
    pub attributes: Attributes,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub ref_name: Option<String>,
    pub children: Vec<ViewNode>,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextKind {
    /// Quoted text without variable references.
    Literal,
    /// Quoted text containing `$name` references.
    Interpolated,
    /// Unquoted text, handed to backends as an expression.
    Expression,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub content: String,
    pub kind: TextKind,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentNode {
    pub children: Vec<ViewNode>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EachNode {
    pub list_expr: String,
    pub item_binding: String,
    pub children: Vec<ViewNode>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IfNode {
    pub condition_expr: String,
    pub children: Vec<ViewNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate: Option<Box<ElseBranch>>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ElseBranch {
    ElseIf(IfNode),
    Else { children: Vec<ViewNode>, line: usize },
}

impl IfNode {
    /// Hang `branch` off the end of the chain. Hands the branch back when the
    /// chain already ends in a plain `else`.
    pub fn attach_alternate(&mut self, branch: ElseBranch) -> Result<(), ElseBranch> {
        if self.alternate.is_none() {
            self.alternate = Some(Box::new(branch));
            return Ok(());
        }
        match self.alternate.as_deref_mut() {
            Some(ElseBranch::ElseIf(next)) => next.attach_alternate(branch),
            _ => Err(branch),
        }
    }

    /// The chain can still take an `else` / `else if`.
    pub fn is_open(&self) -> bool {
        match self.alternate.as_deref() {
            None => true,
            Some(ElseBranch::ElseIf(next)) => next.is_open(),
            Some(ElseBranch::Else { .. }) => false,
        }
    }

    /// Number of `else if` / `else` links hanging off this node.
    pub fn chain_len(&self) -> usize {
        match self.alternate.as_deref() {
            None => 0,
            Some(ElseBranch::ElseIf(next)) => 1 + next.chain_len(),
            Some(ElseBranch::Else { .. }) => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchNode {
    pub subject_expr: String,
    pub cases: Vec<MatchCase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_case: Option<DefaultCase>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCase {
    pub condition: String,
    pub children: Vec<ViewNode>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultCase {
    pub children: Vec<ViewNode>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotNode {
    pub name: String,
    pub line: usize,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATTRIBUTES
// ═══════════════════════════════════════════════════════════════════════════════

/// Event binding target produced by `tag -> event(handler)` markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerRef {
    pub handler: String,
    /// The handler receives the DOM event arguments.
    pub forwards_event: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Handler(HandlerRef),
    Expr(String),
}

impl AttributeValue {
    pub fn as_expr(&self) -> Option<&str> {
        match self {
            AttributeValue::Expr(s) => Some(s),
            AttributeValue::Handler(_) => None,
        }
    }

    pub fn as_handler(&self) -> Option<&HandlerRef> {
        match self {
            AttributeValue::Handler(h) => Some(h),
            AttributeValue::Expr(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

/// Insertion-ordered attribute map. Re-inserting a name replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(Vec<Attribute>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: AttributeValue) {
        let name = name.into();
        match self.0.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.0.push(Attribute { name, value }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.0.iter().find(|a| a.name == name).map(|a| &a.value)
    }

    pub fn expr(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttributeValue::as_expr)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|a| a.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn if_node(condition: &str) -> IfNode {
        IfNode {
            condition_expr: condition.to_string(),
            children: vec![],
            alternate: None,
            line: 1,
        }
    }

    #[test]
    fn test_attribute_reinsert_keeps_position() {
        let mut attrs = Attributes::new();
        attrs.insert("id", AttributeValue::Expr("a".into()));
        attrs.insert("class", AttributeValue::Expr("b".into()));
        attrs.insert("id", AttributeValue::Expr("c".into()));
        assert_eq!(attrs.names().collect::<Vec<_>>(), vec!["id", "class"]);
        assert_eq!(attrs.expr("id"), Some("c"));
    }

    #[test]
    fn test_if_chain_attaches_at_tail() {
        let mut root = if_node("$x");
        assert!(root
            .attach_alternate(ElseBranch::ElseIf(if_node("$y")))
            .is_ok());
        assert!(root.is_open());
        let final_else = ElseBranch::Else {
            children: vec![],
            line: 3,
        };
        assert!(root.attach_alternate(final_else.clone()).is_ok());
        assert!(!root.is_open());
        assert_eq!(root.chain_len(), 2);
        assert_eq!(root.attach_alternate(final_else.clone()), Err(final_else));
    }

    #[test]
    fn test_view_node_serializes_with_type_tag() {
        let node = ViewNode::Slot(SlotNode {
            name: "header".into(),
            line: 4,
        });
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "slot");
        assert_eq!(json["name"], "header");
    }

    #[test]
    fn test_handler_attribute_round_trips_untagged() {
        let value = AttributeValue::Handler(HandlerRef {
            handler: "save()".into(),
            forwards_event: false,
        });
        let json = serde_json::to_string(&value).unwrap();
        let back: AttributeValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
        let plain: AttributeValue = serde_json::from_str("\"$name\"").unwrap();
        assert_eq!(plain.as_expr(), Some("$name"));
    }
}
