//! End-to-end behaviour through the exported functions

use tmplbridge_ffi::{BridgeError, TemplateRenderer};
use tmplbridge_testkit::fixtures::*;
use tmplbridge_testkit::ledger_guard;

fn render(
    template: &str,
    payload: &str,
    escape_html: bool,
    missing_key_zero: bool,
) -> Result<String, String> {
    let data: serde_json::Value = match serde_json::from_str(payload) {
        Ok(data) => data,
        Err(_) => return render_text(template, payload, escape_html, missing_key_zero),
    };
    TemplateRenderer::new(template, &data)
        .escape_html(escape_html)
        .missing_key_zero(missing_key_zero)
        .render()
        .map_err(|e| e.to_string())
}

/// Pass the payload through untouched, for payloads that are not JSON
fn render_text(
    template: &str,
    payload: &str,
    escape_html: bool,
    missing_key_zero: bool,
) -> Result<String, String> {
    use std::ffi::{CStr, CString};
    use tmplbridge_ffi::{tmplbridge_release_string, tmplbridge_render};

    let template = CString::new(template).unwrap();
    let payload = CString::new(payload).unwrap();
    let buffer = unsafe {
        tmplbridge_render(template.as_ptr(), payload.as_ptr(), escape_html, missing_key_zero)
    };
    let (ptr, ok) = if buffer.output.is_null() {
        (buffer.error, false)
    } else {
        (buffer.output, true)
    };
    let text = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
    tmplbridge_release_string(ptr);
    if ok {
        Ok(text)
    } else {
        Err(text)
    }
}

#[test]
fn test_greeting_example() {
    let _guard = ledger_guard();
    let output = render(GREETING_TEMPLATE, GREETING_PAYLOAD, true, true).unwrap();
    assert_eq!(output, GREETING_OUTPUT);
}

#[test]
fn test_escaped_mode_blocks_script_injection() {
    let _guard = ledger_guard();
    let escaped = render(XSS_TEMPLATE, XSS_PAYLOAD, true, false).unwrap();
    assert!(!escaped.contains("<script>"));
    assert_eq!(escaped, "<p>&lt;script&gt;alert(1)&lt;/script&gt;</p>");

    let raw = render(XSS_TEMPLATE, XSS_PAYLOAD, false, false).unwrap();
    assert_eq!(raw, XSS_RAW_OUTPUT);
}

#[test]
fn test_missing_key_policies() {
    let _guard = ledger_guard();
    for escape in [true, false] {
        assert_eq!(
            render(MISSING_KEY_TEMPLATE, EMPTY_OBJECT_PAYLOAD, escape, true),
            Ok(String::new())
        );
        let message = render(MISSING_KEY_TEMPLATE, EMPTY_OBJECT_PAYLOAD, escape, false).unwrap_err();
        assert!(message.contains("Missing"), "{message}");
    }
}

#[test]
fn test_malformed_payload_always_fails() {
    let _guard = ledger_guard();
    for template in VALID_TEMPLATES {
        for payload in INVALID_PAYLOADS {
            let message = render_text(template, payload, true, true).unwrap_err();
            assert!(message.starts_with("failed to decode JSON payload"), "{message}");
        }
    }
}

#[test]
fn test_invalid_templates_always_fail() {
    let _guard = ledger_guard();
    for template in INVALID_TEMPLATES {
        for (escape, zero) in [(true, true), (true, false), (false, true), (false, false)] {
            let message = render(template, GREETING_PAYLOAD, escape, zero).unwrap_err();
            assert!(message.contains("failed to compile"), "{template}: {message}");
        }
    }
}

#[test]
fn test_rendering_is_idempotent() {
    let _guard = ledger_guard();
    for template in VALID_TEMPLATES {
        let first = render(template, GREETING_PAYLOAD, true, true);
        let second = render(template, GREETING_PAYLOAD, true, true);
        assert_eq!(first, second, "{template}");
    }
}

#[test]
fn test_bridge_error_variants() {
    let _guard = ledger_guard();
    let data = serde_json::json!({});
    let err = TemplateRenderer::new("{{if}}", &data).render().unwrap_err();
    assert!(matches!(err, BridgeError::Render(ref m) if m.starts_with("failed to compile escaped template")));
}
