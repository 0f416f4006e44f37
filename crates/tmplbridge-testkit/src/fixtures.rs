//! Canonical templates and payloads
//!
//! Shared by the core and boundary test suites so both exercise the same
//! end-to-end cases.

/// Greeting example: escaped mode, zero-value policy
pub const GREETING_TEMPLATE: &str = "Hello, {{.name}}! You have {{len .items}} items.";
pub const GREETING_PAYLOAD: &str = r#"{"name":"MoYan","items":["book","pen"]}"#;
pub const GREETING_OUTPUT: &str = "Hello, MoYan! You have 2 items.";

/// Script injection attempt through a text interpolation
pub const XSS_TEMPLATE: &str = "<p>{{.X}}</p>";
pub const XSS_PAYLOAD: &str = r#"{"X":"<script>alert(1)</script>"}"#;
pub const XSS_RAW_OUTPUT: &str = "<p><script>alert(1)</script></p>";

pub const MISSING_KEY_TEMPLATE: &str = "{{.Missing}}";
pub const EMPTY_OBJECT_PAYLOAD: &str = "{}";

/// Truncated JSON
pub const MALFORMED_PAYLOAD: &str = r#"{"a":"#;

/// `{{if}}` without `{{end}}`
pub const UNBALANCED_TEMPLATE: &str = "{{if .a}}never closed";

/// Templates that compile in both modes
pub const VALID_TEMPLATES: &[&str] = &[
    "",
    "plain text",
    "Hello, {{.name}}!",
    "<p>{{.name}}</p>",
    "<a href=\"/u/{{.name}}\" title=\"{{.title}}\">{{.name}}</a>",
    "{{range $i, $e := .items}}{{$i}}:{{$e}} {{end}}",
    "{{if .flag}}on{{else}}off{{end}}",
    "{{with .user}}{{.name}}{{end}}",
    "{{len .items}} {{index .items 0}}",
    "{{printf \"%s=%d\" .name .count}}",
    "<script>var data = {{.}};</script>",
    "{{.missing}}",
    "{{.user.missing}}",
];

/// Templates that fail to compile
pub const INVALID_TEMPLATES: &[&str] = &[
    UNBALANCED_TEMPLATE,
    "{{end}}",
    "{{.name",
    "{{nofunc .name}}",
    "{{$undefined}}",
    "{{break}}",
];

/// Payloads that are not a single JSON value
pub const INVALID_PAYLOADS: &[&str] = &[MALFORMED_PAYLOAD, "", "{", "[1, 2", "{} {}", "nul"];
