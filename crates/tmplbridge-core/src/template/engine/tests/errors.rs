use serde_json::json;

use super::*;

#[test]
fn test_compile_errors_report_line() {
    let err = raw("line1\n{{.a | nofunc}}", &json!({"a": 1})).unwrap_err();
    assert_eq!(err.phase(), Phase::Compile);
    assert_eq!(err.line(), 2);
    assert_eq!(err.to_string(), "line 2: function \"nofunc\" not defined");
}

#[test]
fn test_unbalanced_if_is_compile_error() {
    let err = raw("{{if .a}}never closed", &json!({"a": true})).unwrap_err();
    assert!(matches!(err, TemplateError::MalformedSyntax { .. }));
    assert_eq!(err.phase(), Phase::Compile);
}

#[test]
fn test_index_out_of_range() {
    let err = raw("{{index .items 5}}", &profile()).unwrap_err();
    assert_eq!(
        err,
        TemplateError::IndexOutOfRange {
            index: 5,
            len: 2,
            line: 1
        }
    );
    assert_eq!(err.phase(), Phase::Execute);
}

#[test]
fn test_range_over_scalar() {
    let err = raw("{{range .name}}{{end}}", &profile()).unwrap_err();
    assert_eq!(
        err,
        TemplateError::NotIterable {
            kind: "string",
            line: 1
        }
    );
}

#[test]
fn test_argument_to_non_function() {
    let err = raw("{{.name 1}}", &profile()).unwrap_err();
    assert!(matches!(err, TemplateError::NotAFunction { ref operand, .. } if operand == ".name"));
    let err = raw(r#"{{"x" | .name}}"#, &profile()).unwrap_err();
    assert!(matches!(err, TemplateError::NotAFunction { .. }));
}

#[test]
fn test_wrong_arg_count() {
    let err = raw("{{len}}", &json!({})).unwrap_err();
    assert!(matches!(err, TemplateError::WrongArgCount { ref func, got: 0, .. } if func == "len"));
    assert_eq!(err.phase(), Phase::Execute);
}

#[test]
fn test_type_mismatch() {
    let err = raw(r#"{{if lt .name 3}}{{end}}"#, &profile()).unwrap_err();
    assert!(matches!(err, TemplateError::TypeMismatch { .. }));
    let err = raw(r#"{{printf 3}}"#, &json!({})).unwrap_err();
    assert!(matches!(err, TemplateError::TypeMismatch { .. }));
}

#[test]
fn test_render_error_names_phase_and_mode() {
    let options = RenderOptions::new(EscapeMode::Escaped, MissingKeyPolicy::ErrorOnMissing);
    let err = render("{{if}}", &json!({}), options).unwrap_err();
    assert_eq!(
        err.to_string(),
        "failed to compile escaped template: line 1: missing value for if"
    );

    let options = RenderOptions::new(EscapeMode::Raw, MissingKeyPolicy::ErrorOnMissing);
    let err = render("{{.missing}}", &json!({}), options).unwrap_err();
    assert_eq!(
        err.to_string(),
        "failed to execute raw template: line 1: map has no entry for key \"missing\" (evaluating .missing)"
    );
}

/// Run `f` on a thread with the 2 MiB stack spawned threads get by default
fn on_small_stack<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap()
}

#[test]
fn test_recursion_depth_limit() {
    let err = on_small_stack(|| {
        raw(
            r#"{{define "r"}}{{template "r" .}}{{end}}{{template "r" .}}"#,
            &json!({}),
        )
    })
    .unwrap_err();
    assert!(matches!(err, TemplateError::DepthExceeded { limit: 200, .. }));
    assert_eq!(err.phase(), Phase::Execute);
}

#[test]
fn test_recursion_through_blocks_hits_limit() {
    let err = on_small_stack(|| {
        let source = r#"{{define "r"}}{{if 1}}{{with .}}{{template "r" (or .)}}{{end}}{{end}}{{end}}{{template "r" .}}"#;
        lenient(source, &json!({"a": 1}))
    })
    .unwrap_err();
    assert!(matches!(err, TemplateError::DepthExceeded { limit: 200, .. }));
}

#[test]
fn test_deep_parentheses_rejected() {
    let err = on_small_stack(|| {
        let source = format!("{{{{{}1{}}}}}", "(".repeat(20_000), ")".repeat(20_000));
        raw(&source, &json!({}))
    })
    .unwrap_err();
    assert!(matches!(err, TemplateError::MalformedSyntax { .. }));
    assert!(err.to_string().contains("max nesting depth (100) exceeded"));
}

#[test]
fn test_deep_blocks_rejected() {
    let err = on_small_stack(|| {
        let source = format!("{}x{}", "{{if 1}}".repeat(20_000), "{{end}}".repeat(20_000));
        escaped(&source, &json!({}))
    })
    .unwrap_err();
    assert!(matches!(err, TemplateError::MalformedSyntax { .. }));
    assert_eq!(err.phase(), Phase::Compile);
}

#[test]
fn test_nesting_within_limit_renders() {
    let result = on_small_stack(|| {
        let source = format!("{}x{}", "{{if 1}}".repeat(100), "{{end}}".repeat(100));
        escaped(&source, &json!({}))
    })
    .unwrap();
    assert_eq!(result, "x");
}

#[test]
fn test_escaped_template_chain_depth_limit() {
    let err = on_small_stack(|| {
        let mut source = String::new();
        for i in 0..300 {
            source.push_str(&format!(r#"{{{{define "t{}"}}}}<b>{{{{template "t{}" .}}}}</b>{{{{end}}}}"#, i, i + 1));
        }
        source.push_str(r#"{{define "t300"}}end{{end}}{{template "t0" .}}"#);
        escaped(&source, &json!({}))
    })
    .unwrap_err();
    assert!(matches!(err, TemplateError::EscapeContext { .. }));
    assert!(err.to_string().contains("depth limit (200)"));
}

#[test]
fn test_escaped_recursion_compiles() {
    let source = r#"{{define "list"}}<li>{{.n}}</li>{{with .next}}{{template "list" .}}{{end}}{{end}}<ul>{{template "list" .}}</ul>"#;
    let data = json!({"n": 1, "next": {"n": 2, "next": null}});
    let result = escaped(source, &data).unwrap();
    assert_eq!(result, "<ul><li>1</li><li>2</li></ul>");
}
