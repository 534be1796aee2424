//! Parser tests: black-box coverage of `wisteria_parser::parse` against the
//! public `Node` shape, exercising the grammar described in spec.md §4.2.

use wisteria_parser::ast::{BinOp, ForMode, ForTarget, Literal, Node, UnaryOp};
use wisteria_parser::parse;

fn root_children(source: &str) -> Vec<Node> {
    match parse(source).unwrap_or_else(|e| panic!("parse failed for {source:?}: {e}")) {
        Node::Root { children, .. } => children,
        other => panic!("expected Root, got {other:?}"),
    }
}

fn single_output_expr(source: &str) -> Node {
    let children = root_children(source);
    assert_eq!(children.len(), 1, "expected exactly one top-level node in {source:?}");
    match &children[0] {
        Node::Output { children, .. } => {
            assert_eq!(children.len(), 1);
            children[0].clone()
        }
        other => panic!("expected Output, got {other:?}"),
    }
}

// ==================== Literal Tests ====================

#[test]
fn parses_integer_and_float_literals() {
    assert!(matches!(single_output_expr("{{ 42 }}"), Node::Literal { value: Literal::Int(42), .. }));
    match single_output_expr("{{ 3.5 }}") {
        Node::Literal { value: Literal::Float(f), .. } => assert!((f - 3.5).abs() < f64::EPSILON),
        other => panic!("expected float literal, got {other:?}"),
    }
}

#[test]
fn parses_string_literal_with_escapes() {
    match single_output_expr(r#"{{ "a\nb" }}"#) {
        Node::Literal { value: Literal::Str(s), .. } => assert_eq!(s, "a\nb"),
        other => panic!("expected string literal, got {other:?}"),
    }
}

#[test]
fn parses_boolean_and_none_keywords() {
    assert!(matches!(single_output_expr("{{ true }}"), Node::Literal { value: Literal::Bool(true), .. }));
    assert!(matches!(single_output_expr("{{ false }}"), Node::Literal { value: Literal::Bool(false), .. }));
    assert!(matches!(single_output_expr("{{ none }}"), Node::Literal { value: Literal::None, .. }));
    assert!(matches!(single_output_expr("{{ null }}"), Node::Literal { value: Literal::None, .. }));
}

// ==================== Operator Precedence Tests ====================

#[test]
fn binary_arithmetic_respects_precedence() {
    // 1 + 2 * 3 should parse as Add(1, Mul(2, 3))
    match single_output_expr("{{ 1 + 2 * 3 }}") {
        Node::BinOp { op: BinOp::Add, right, .. } => {
            assert!(matches!(*right, Node::BinOp { op: BinOp::Mul, .. }));
        }
        other => panic!("expected top-level Add, got {other:?}"),
    }
}

#[test]
fn filter_application_is_left_associative() {
    // x | f | g(a) => Filter(g, [Filter(f, [x]), a])
    match single_output_expr("{{ x | f | g(1) }}") {
        Node::Filter { name, args, .. } => {
            assert_eq!(name, "g");
            assert_eq!(args.len(), 2);
            assert!(matches!(&args[0], Node::Filter { name, .. } if name == "f"));
        }
        other => panic!("expected outer Filter, got {other:?}"),
    }
}

#[test]
fn unary_minus_binds_tighter_than_addition_but_not_power() {
    match single_output_expr("{{ -1 + 2 }}") {
        Node::BinOp { op: BinOp::Add, left, .. } => {
            assert!(matches!(*left, Node::UnaryOp { op: UnaryOp::Neg, .. }));
        }
        other => panic!("expected Add, got {other:?}"),
    }
}

// ==================== `is` / `in` Tests ====================

#[test]
fn not_in_desugars_to_negated_in_node() {
    match single_output_expr("{{ x not in items }}") {
        Node::In { negated: true, .. } => {}
        other => panic!("expected negated In, got {other:?}"),
    }
}

#[test]
fn is_not_desugars_to_negated_is_node() {
    match single_output_expr("{{ x is not defined }}") {
        Node::Is { negated: true, name, .. } => assert_eq!(name, "defined"),
        other => panic!("expected negated Is, got {other:?}"),
    }
}

// ==================== Keyword Args / Dict Tests ====================

#[test]
fn trailing_keyword_args_collapse_into_one_dict() {
    match single_output_expr("{{ f(1, a=2, b=3) }}") {
        Node::FunCall { args, .. } => {
            assert_eq!(args.len(), 2);
            match &args[1] {
                Node::KeywordArgs { pairs, .. } => {
                    assert_eq!(pairs.len(), 2);
                    assert_eq!(pairs[0].0, "a");
                    assert_eq!(pairs[1].0, "b");
                }
                other => panic!("expected trailing KeywordArgs, got {other:?}"),
            }
        }
        other => panic!("expected FunCall, got {other:?}"),
    }
}

#[test]
fn dict_literal_requires_string_or_symbol_keys() {
    let children = root_children(r#"{{ {"a": 1, b: 2} }}"#);
    assert_eq!(children.len(), 1);
}

// ==================== Statement Tests ====================

#[test]
fn parses_for_else() {
    let children = root_children("{% for x in items %}{{ x }}{% else %}empty{% endfor %}");
    assert_eq!(children.len(), 1);
    match &children[0] {
        Node::For { mode: ForMode::Sync, target: ForTarget::Single(name), else_: Some(_), .. } => {
            assert_eq!(name, "x");
        }
        other => panic!("expected For with else, got {other:?}"),
    }
}

#[test]
fn parses_key_value_for_target() {
    let children = root_children("{% for k, v in items %}{{ k }}{% endfor %}");
    match &children[0] {
        Node::For { target: ForTarget::KeyValue(k, v), .. } => {
            assert_eq!(k, "k");
            assert_eq!(v, "v");
        }
        other => panic!("expected KeyValue for-target, got {other:?}"),
    }
}

#[test]
fn raw_block_collapses_to_a_single_template_data_node() {
    let children = root_children("{% raw %}{{ not an expr }}{% endraw %}");
    assert_eq!(children.len(), 1);
    match &children[0] {
        Node::TemplateData { text, .. } => assert_eq!(text, "{{ not an expr }}"),
        other => panic!("expected TemplateData, got {other:?}"),
    }
}

#[test]
fn trim_markers_eat_adjacent_whitespace() {
    let children = root_children("a \n {%- if true -%} \n b \n {%- endif -%} \n c");
    // Whitespace adjacent to `-` markers on both sides of the block should be gone.
    let rendered_text: Vec<&str> = children
        .iter()
        .filter_map(|n| match n {
            Node::TemplateData { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert!(rendered_text.iter().all(|t| !t.contains('\n') || t.trim() != ""));
}

#[test]
fn duplicate_case_is_parsed_as_fallthrough_eligible_empty_body() {
    let children = root_children("{% switch x %}{% case 1 %}{% case 2 %}two{% endswitch %}");
    match &children[0] {
        Node::Switch { cases, .. } => {
            assert_eq!(cases.len(), 2);
            assert!(matches!(&cases[0].body, Node::NodeList { children, .. } if children.is_empty()));
        }
        other => panic!("expected Switch, got {other:?}"),
    }
}

#[test]
fn extends_parses_anywhere_in_root_body() {
    let children = root_children("{% if cond %}{% extends \"base.html\" %}{% endif %}");
    match &children[0] {
        Node::If { body, .. } => {
            assert!(matches!(body.as_ref(), Node::NodeList { children, .. } if matches!(children[0], Node::Extends { .. })));
        }
        other => panic!("expected If wrapping Extends, got {other:?}"),
    }
}

// ==================== Error Tests ====================

#[test]
fn unterminated_string_is_a_lex_error_with_span() {
    let err = parse(r#"{{ "unterminated }}"#).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("line") || msg.contains(':'), "error should carry a span: {msg}");
}

#[test]
fn unknown_block_tag_fails_with_offending_token_named() {
    let err = parse("{% bogus %}").unwrap_err();
    assert!(!err.to_string().is_empty());
}
