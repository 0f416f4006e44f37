//! Fixtures and render shortcuts shared by the engine tests

use serde_json::{json, Value};

use super::*;

/// Raw mode, strict about missing keys
pub fn raw(source: &str, data: &Value) -> Result<String, TemplateError> {
    run(source, data, EscapeMode::Raw, MissingKeyPolicy::ErrorOnMissing)
}

/// Escaped mode, strict about missing keys
pub fn escaped(source: &str, data: &Value) -> Result<String, TemplateError> {
    run(source, data, EscapeMode::Escaped, MissingKeyPolicy::ErrorOnMissing)
}

/// Raw mode, missing keys render as empty
pub fn lenient(source: &str, data: &Value) -> Result<String, TemplateError> {
    run(source, data, EscapeMode::Raw, MissingKeyPolicy::ZeroValue)
}

pub fn run(
    source: &str,
    data: &Value,
    mode: EscapeMode,
    policy: MissingKeyPolicy,
) -> Result<String, TemplateError> {
    CompiledTemplate::compile(source, mode)?.execute(data, policy)
}

/// Create a user profile payload
pub fn profile() -> Value {
    json!({
        "name": "MoYan",
        "items": ["book", "pen"],
        "user": {
            "name": "Ada",
            "age": 36,
            "tags": ["admin", "ops"]
        },
        "title": "Report",
        "count": 3,
        "price": 9.99,
        "flag": true,
        "empty": "",
        "nothing": null
    })
}
