#[cfg(test)]
mod tests {
    use crate::hierarchy::assign_depths;
    use crate::lexer::tokenize;
    use crate::manifest::*;
    use crate::options::LexerConfig;
    use crate::parse::build_manifest;
    use crate::siblings::SiblingSources;

    fn build_with(source: &str, siblings: &SiblingSources) -> ComponentManifest {
        let mut lexed = tokenize(source, &LexerConfig::default());
        assign_depths(&mut lexed.tokens);
        build_manifest(&lexed.tokens, &lexed.diagnostics, siblings).manifest
    }

    fn build(source: &str) -> ComponentManifest {
        build_with(source, &SiblingSources::default())
    }

    fn text_of(node: &ViewNode) -> &str {
        node.as_text().map(|t| t.content.as_str()).unwrap_or("")
    }

    // ═══════════════════════════════════════════════════════════════════════
    // DECLARATIONS
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_minimal_counter_component() {
        let source = "component Counter:\n    $count = 0\n    view:\n        button -> click(): \"Add\"\n";
        let manifest = build(source);

        assert_eq!(manifest.name, "Counter");
        assert!(!manifest.is_singleton);
        assert_eq!(manifest.state.len(), 1);
        assert_eq!(manifest.state[0].id, "count");
        assert_eq!(manifest.state[0].default_value_expr, "0");
        assert_eq!(manifest.state[0].declared_type, DEFAULT_DECLARED_TYPE);

        assert_eq!(manifest.view.len(), 1);
        let button = manifest.view[0].as_element().unwrap();
        assert_eq!(button.tag, "button");
        let handler = button
            .attributes
            .get("onclick")
            .and_then(AttributeValue::as_handler)
            .unwrap();
        assert_eq!(handler.handler, "click()");
        assert!(!handler.forwards_event);
        assert_eq!(button.children.len(), 1);
        let label = button.children[0].as_text().unwrap();
        assert_eq!(label.content, "Add");
        assert_eq!(label.kind, TextKind::Literal);
    }

    #[test]
    fn test_memory_marks_singleton() {
        let manifest = build("memory Session:\n    $token = \"\"");
        assert_eq!(manifest.name, "Session");
        assert!(manifest.is_singleton);
        assert_eq!(manifest.state[0].default_value_expr, "\"\"");
    }

    #[test]
    fn test_props_imports_and_derived() {
        let source = r#"component Profile:
    use router
    use { fetchUser } from "./api"
    @prop userId: number = 1
    @prop "title"
    sync $label = $name + "!"
"#;
        let manifest = build(source);

        assert_eq!(
            manifest.imports,
            vec![
                Import {
                    name: "router".into(),
                    path: "viand:router".into()
                },
                Import {
                    name: "fetchUser".into(),
                    path: "./api".into()
                },
            ]
        );

        let user_id = manifest.prop_named("userId").unwrap();
        assert_eq!(user_id.declared_type, "number");
        assert_eq!(user_id.default_value_expr, "1");
        assert_eq!(user_id.source_line, 4);

        let title = manifest.prop_named("title").unwrap();
        assert_eq!(title.declared_type, DEFAULT_DECLARED_TYPE);
        assert_eq!(title.default_value_expr, DEFAULT_VALUE_EXPR);

        assert_eq!(manifest.derived.len(), 1);
        assert_eq!(manifest.derived[0].id, "label");
        assert_eq!(manifest.derived[0].expr, "$name + \"!\"");
    }

    #[test]
    fn test_typed_state_keeps_full_value() {
        let manifest = build("$ready: bool = $a == $b");
        let ready = manifest.state_named("ready").unwrap();
        assert_eq!(ready.declared_type, "bool");
        assert_eq!(ready.default_value_expr, "$a == $b");
    }

    #[test]
    fn test_malformed_declarations_are_dropped() {
        let manifest = build("fn broken\n@prop 9lives\nsync count = 1\n$ = 3");
        assert!(manifest.functions.is_empty());
        assert!(manifest.props.is_empty());
        assert!(manifest.derived.is_empty());
        assert!(manifest.state.is_empty());
        assert!(manifest.view.is_empty());
    }

    #[test]
    fn test_duplicate_state_is_kept_in_order() {
        let manifest = build("$x = 1\n$x = 2");
        assert_eq!(manifest.state.len(), 2);
        assert_eq!(manifest.state_named("x").unwrap().default_value_expr, "2");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // LOGIC BODIES
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_function_body_with_nested_blocks() {
        let source = r#"component Todo:
    $items = []
    fn add(text, done):
        $items = [...$items, text]
        if text == "":
            return
        else:
            log("ok")
        save()
"#;
        let manifest = build(source);

        assert_eq!(manifest.state.len(), 1);
        let add = manifest.function_named("add").unwrap();
        assert_eq!(add.params, vec!["text", "done"]);
        assert_eq!(add.source_line, 3);
        assert_eq!(add.body.len(), 4);
        assert_eq!(add.body[0].as_line(), Some("$items = [...$items, text]"));
        match &add.body[1] {
            LogicItem::Block(block) => {
                assert_eq!(block.header, "if text == \"\":");
                assert_eq!(block.body.len(), 1);
                assert_eq!(block.body[0].as_line(), Some("return"));
            }
            other => panic!("expected logic block, got {:?}", other),
        }
        match &add.body[2] {
            LogicItem::Block(block) => assert_eq!(block.header, "else:"),
            other => panic!("expected logic block, got {:?}", other),
        }
        assert_eq!(add.body[3].as_line(), Some("save()"));
    }

    #[test]
    fn test_lifecycle_and_watchers() {
        let source = r#"component Profile:
    on mount:
        load($userId)
    on change $userId:
        $name = ""
"#;
        let manifest = build(source);

        assert_eq!(manifest.lifecycle_body.len(), 1);
        assert_eq!(manifest.lifecycle_body[0].as_line(), Some("load($userId)"));
        assert_eq!(manifest.watchers.len(), 1);
        assert_eq!(manifest.watchers[0].dependency_expr, "$userId");
        assert_eq!(manifest.watchers[0].body[0].as_line(), Some("$name = \"\""));
        assert!(manifest.state.is_empty());
    }

    #[test]
    fn test_persona_tests_with_assertions() {
        let source = r#"component Counter:
    $count = 0
test Counter:
    @logic:
        $count = 1
        must $count == 1
    @ui:
        must "Add" visible
"#;
        let manifest = build(source);

        assert_eq!(manifest.state.len(), 1);
        assert_eq!(manifest.tests.len(), 2);

        let logic = &manifest.tests[0];
        assert_eq!(logic.persona, Persona::Logic);
        assert_eq!(logic.suite.as_deref(), Some("Counter"));
        assert_eq!(logic.body[0].as_line(), Some("$count = 1"));
        assert_eq!(
            logic.body[1],
            LogicItem::Assertion {
                expr: "$count == 1".into(),
                line: 6
            }
        );
        assert_eq!(manifest.tests[1].persona, Persona::Ui);
    }

    #[test]
    fn test_must_outside_tests_is_a_plain_line() {
        let source = "fn check():\n    must $ready\non mount:\n    must $loaded";
        let manifest = build(source);
        assert_eq!(
            manifest.functions[0].body[0].as_line(),
            Some("must $ready")
        );
        assert_eq!(manifest.lifecycle_body[0].as_line(), Some("must $loaded"));
    }

    #[test]
    fn test_must_inside_persona_block_is_assertion() {
        let source = "test App:\n    @logic:\n        if $ready:\n            must $count == 0";
        let manifest = build(source);
        let LogicItem::Block(block) = &manifest.tests[0].body[0] else {
            panic!("expected logic block");
        };
        assert_eq!(
            block.body[0],
            LogicItem::Assertion {
                expr: "$count == 0".into(),
                line: 4
            }
        );
    }

    // ═══════════════════════════════════════════════════════════════════════
    // VIEW CONTROL FLOW
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_if_else_chain_is_one_node() {
        let source = r#"view:
    if $x:
        p: "A"
    else if $y:
        p: "B"
    else:
        p: "C"
"#;
        let manifest = build(source);

        assert_eq!(manifest.view.len(), 1);
        let ViewNode::If(node) = &manifest.view[0] else {
            panic!("expected if node");
        };
        assert_eq!(node.condition_expr, "$x");
        assert_eq!(node.chain_len(), 2);
        assert!(!node.is_open());

        let Some(ElseBranch::ElseIf(second)) = node.alternate.as_deref() else {
            panic!("expected else-if link");
        };
        assert_eq!(second.condition_expr, "$y");
        let Some(ElseBranch::Else { children, .. }) = second.alternate.as_deref() else {
            panic!("expected final else");
        };
        assert_eq!(children.len(), 1);
    }

    #[test]
    fn test_orphan_else_degrades_to_text() {
        let manifest = build("view:\n    else:\n        p: \"orphan\"");
        assert_eq!(manifest.view.len(), 2);
        assert_eq!(text_of(&manifest.view[0]), "else:");
        assert_eq!(manifest.view[1].as_element().unwrap().tag, "p");
    }

    #[test]
    fn test_each_binds_item_and_list() {
        let manifest = build("view:\n    each $row in $rows:\n        li: $row.name");
        let ViewNode::Each(each) = &manifest.view[0] else {
            panic!("expected each node");
        };
        assert_eq!(each.item_binding, "row");
        assert_eq!(each.list_expr, "rows");
        assert_eq!(each.children.len(), 1);
        let li = each.children[0].as_element().unwrap();
        assert_eq!(li.children[0].as_text().unwrap().kind, TextKind::Expression);
    }

    #[test]
    fn test_malformed_each_becomes_text() {
        let manifest = build("view:\n    each row of rows:");
        assert_eq!(text_of(&manifest.view[0]), "each row of rows:");
    }

    #[test]
    fn test_match_with_inline_and_block_cases() {
        let source = r#"view:
    match $status:
        case "ok": "Fine"
        case "err":
            p: "Broken"
        default: "Unknown"
"#;
        let manifest = build(source);

        let ViewNode::Match(node) = &manifest.view[0] else {
            panic!("expected match node");
        };
        assert_eq!(node.subject_expr, "$status");
        assert_eq!(node.cases.len(), 2);
        assert_eq!(node.cases[0].condition, "\"ok\"");
        assert_eq!(text_of(&node.cases[0].children[0]), "Fine");
        assert_eq!(node.cases[1].children.len(), 1);
        let default = node.default_case.as_ref().unwrap();
        assert_eq!(text_of(&default.children[0]), "Unknown");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // VIEW MARKUP
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_slots_refs_and_fragments() {
        let source = r#"view:
    div.card#panel:
        slot header
        slot
        slot header
        fragment:
            p: "x"
    input#field(value: $name)
"#;
        let manifest = build(source);

        assert_eq!(manifest.slots, vec!["header", "children"]);
        assert_eq!(
            manifest.element_refs.iter().collect::<Vec<_>>(),
            vec!["field", "panel"]
        );

        assert_eq!(manifest.view.len(), 2);
        let card = manifest.view[0].as_element().unwrap();
        assert_eq!(card.attributes.expr("class"), Some("card"));
        assert_eq!(card.ref_name.as_deref(), Some("panel"));
        assert_eq!(card.children.len(), 4);
        assert!(matches!(card.children[3], ViewNode::Fragment(ref f) if f.children.len() == 1));

        let input = manifest.view[1].as_element().unwrap();
        assert_eq!(input.attributes.expr("value"), Some("$name"));
    }

    #[test]
    fn test_nested_paren_attribute_opens_block() {
        let manifest = build("view:\n    input(value: format(x, 2)):");
        let input = manifest.view[0].as_element().unwrap();
        assert_eq!(input.attributes.len(), 1);
        assert_eq!(input.attributes.expr("value"), Some("format(x, 2)"));
        assert!(input.children.is_empty());
    }

    #[test]
    fn test_quoted_colons_do_not_split() {
        let manifest = build("view:\n    div(onclick: \"a:b(c:d)\"): \"literal: text\"");
        let div = manifest.view[0].as_element().unwrap();
        assert_eq!(div.attributes.expr("onclick"), Some("\"a:b(c:d)\""));
        assert_eq!(text_of(&div.children[0]), "literal: text");
    }

    #[test]
    fn test_quoted_prose_with_colon_is_text() {
        let manifest = build("view:\n    div:\n        \"Total: $total\"");
        let div = manifest.view[0].as_element().unwrap();
        assert_eq!(div.children.len(), 1);
        let text = div.children[0].as_text().unwrap();
        assert_eq!(text.content, "Total: $total");
        assert_eq!(text.kind, TextKind::Interpolated);
    }

    #[test]
    fn test_interpolated_text() {
        let manifest = build("view:\n    p: \"Hi $name\"");
        let p = manifest.view[0].as_element().unwrap();
        assert_eq!(p.children[0].as_text().unwrap().kind, TextKind::Interpolated);
    }

    #[test]
    fn test_root_level_prose_is_dropped() {
        let manifest = build("hello world\nview:\n    plain words here");
        assert_eq!(manifest.view.len(), 1);
        assert_eq!(text_of(&manifest.view[0]), "plain words here");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // STYLE, HEAD & SIBLINGS
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_style_rules_collect_raw_declarations() {
        let source = r#"component Card:
    style:
        .card:
            padding: 4px
            color: red
        .title:
            font-weight: bold
"#;
        let manifest = build(source);

        assert_eq!(manifest.style_rules.len(), 2);
        assert_eq!(manifest.style_rules[0].selector, ".card");
        assert_eq!(
            manifest.style_rules[0].declarations,
            vec!["padding: 4px", "color: red"]
        );
        assert_eq!(manifest.style_rules[1].selector, ".title");
        assert!(manifest.view.is_empty());
    }

    #[test]
    fn test_head_block_in_source() {
        let source = r#"component Page:
    head:
        title: "Home"
        og:
            type: website
    view:
        h1: "Home"
"#;
        let manifest = build(source);

        assert_eq!(manifest.head.title(), Some("Home"));
        assert_eq!(manifest.head.sections["og"]["type"], "website");
        assert_eq!(manifest.view.len(), 1);
    }

    #[test]
    fn test_siblings_populate_manifest() {
        let siblings = SiblingSources {
            sql: Some("-- label: all\nSELECT * FROM posts;".into()),
            api: Some("-- label: list\nGET /api/posts".into()),
            lang: None,
            head: Some("title: Blog".into()),
        };
        let manifest = build_with("component Blog:\n    view:\n        h1: \"Blog\"", &siblings);

        assert_eq!(manifest.sql_queries[0].label, "all");
        assert_eq!(manifest.api_endpoints[0].path, "/api/posts");
        assert_eq!(manifest.head.title(), Some("Blog"));
        assert_eq!(manifest.view.len(), 1);
    }
}
