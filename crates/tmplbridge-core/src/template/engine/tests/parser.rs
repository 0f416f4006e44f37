use serde_json::json;

use super::super::ast::{Node, Operand};
use super::super::parser::parse;
use super::*;

fn syntax_message(source: &str) -> String {
    match parse(source).unwrap_err() {
        TemplateError::MalformedSyntax { message, .. } => message,
        other => panic!("expected syntax error for {source:?}, got {other:?}"),
    }
}

#[test]
fn test_parse_else_if_chain() {
    let tree = parse("{{if .a}}x{{else if .b}}y{{else}}z{{end}}").unwrap();
    assert_eq!(tree.root.len(), 1);
    let Node::If(outer) = &tree.root[0] else {
        panic!("expected if node");
    };
    let else_list = outer.else_list.as_ref().unwrap();
    assert_eq!(else_list.len(), 1);
    let Node::If(inner) = &else_list[0] else {
        panic!("expected nested if node");
    };
    assert!(inner.else_list.is_some());
}

#[test]
fn test_parse_number_literal() {
    let tree = parse("{{1_000}}").unwrap();
    let Node::Action(action) = &tree.root[0] else {
        panic!("expected action");
    };
    assert_eq!(action.pipe.cmds[0].args[0], Operand::Literal(json!(1000)));
}

#[test]
fn test_parse_define_and_template() {
    let tree = parse(r#"{{define "t"}}hi{{end}}{{template "t"}}"#).unwrap();
    assert!(tree.defines.contains_key("t"));
    assert!(matches!(&tree.root[0], Node::Template(call) if call.name == "t"));
}

#[test]
fn test_parse_block_defines_and_calls() {
    let tree = parse(r#"{{block "b" .}}default{{end}}"#).unwrap();
    assert!(tree.defines.contains_key("b"));
    assert!(matches!(&tree.root[0], Node::Template(call) if call.pipe.is_some()));
}

#[test]
fn test_parse_range_declarations() {
    let tree = parse("{{range $i, $e := .}}{{$i}}{{$e}}{{end}}").unwrap();
    let Node::Range(range) = &tree.root[0] else {
        panic!("expected range node");
    };
    assert_eq!(range.pipe.decl, vec!["$i".to_string(), "$e".to_string()]);
}

#[test]
fn test_parse_undefined_function() {
    let err = parse("{{upper .x}}").unwrap_err();
    assert_eq!(
        err,
        TemplateError::UndefinedFunction {
            name: "upper".to_string(),
            line: 1
        }
    );
}

#[test]
fn test_parse_undefined_variable() {
    assert!(matches!(
        parse("{{$x}}").unwrap_err(),
        TemplateError::UndefinedVariable { .. }
    ));
}

#[test]
fn test_parse_variable_scope_ends_with_block() {
    assert!(matches!(
        parse("{{if true}}{{$x := 1}}{{end}}{{$x}}").unwrap_err(),
        TemplateError::UndefinedVariable { .. }
    ));
}

#[test]
fn test_parse_structural_errors() {
    assert!(syntax_message("{{if .a}}x").contains("unexpected EOF"));
    assert!(syntax_message("x{{end}}").contains("unexpected {{end}}"));
    assert!(syntax_message("{{break}}").contains("outside {{range}}"));
    assert!(syntax_message("{{nil}}").contains("nil is not a command"));
    assert!(syntax_message("{{}}").contains("missing value for command"));
    assert!(syntax_message(r#"{{.a"x"}}"#).contains("missing space?"));
    assert!(syntax_message(r#"{{if true}}{{define "x"}}{{end}}{{end}}"#)
        .contains("unexpected <define>"));
}

#[test]
fn test_parse_duplicate_define() {
    let message = syntax_message(r#"{{define "a"}}x{{end}}{{define "a"}}y{{end}}"#);
    assert!(message.contains("multiple definition"));
}

#[test]
fn test_parse_empty_define_keeps_existing() {
    let tree = parse(r#"{{define "a"}}x{{end}}{{define "a"}}{{end}}"#).unwrap();
    assert_eq!(tree.defines["a"].len(), 1);
}

#[test]
fn test_parse_error_line() {
    let err = parse("one\ntwo\n{{if}}").unwrap_err();
    assert_eq!(err.line(), 3);
}
