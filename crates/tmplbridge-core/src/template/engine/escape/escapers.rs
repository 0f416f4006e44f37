//! Context-specific escaping and filtering functions

use serde_json::Value;

use super::context::AttrKind;
use crate::template::engine::helpers::print_value;

/// Replacement written when a value is unsafe in its context
pub(crate) const FILTER_FAILSAFE: &str = "ZgotmplZ";

/// One stage of an action's output escaping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Escaper {
    /// HTML text and RCDATA
    Html,
    /// Quoted attribute value
    Attr,
    /// Unquoted attribute value
    HtmlNospace,
    /// Attribute name position inside a tag
    HtmlNameFilter,
    /// URL start: reject unsafe schemes
    UrlFilter,
    /// URL path: percent-encode without touching reserved characters
    UrlNormalizer,
    /// URL query or fragment: percent-encode everything reserved
    UrlEscaper,
    /// JavaScript expression
    JsVal,
    /// Inside a JavaScript string literal
    JsStr,
    /// Inside JavaScript template literal text
    JsTmplStr,
    /// Inside a JavaScript regular expression literal
    JsRegexp,
    /// CSS outside strings
    CssValueFilter,
    /// Inside a CSS string
    CssEscaper,
    /// Inside a comment: drop the value
    Elide,
}

impl Escaper {
    /// Apply as the first stage, which sees the value itself
    pub(crate) fn apply_value(self, value: &Value) -> String {
        match self {
            Escaper::JsVal => js_val_escape(value),
            other => other.apply(&print_value(value)),
        }
    }

    pub(crate) fn apply(self, s: &str) -> String {
        match self {
            Escaper::Html | Escaper::Attr => html_escape(s),
            Escaper::HtmlNospace => html_nospace_escape(s),
            Escaper::HtmlNameFilter => html_name_filter(s),
            Escaper::UrlFilter => url_filter(s),
            Escaper::UrlNormalizer => url_process(s, true),
            Escaper::UrlEscaper => url_process(s, false),
            Escaper::JsVal => js_val_escape(&Value::String(s.to_string())),
            Escaper::JsStr => js_str_escape(s),
            Escaper::JsTmplStr => js_tmpl_str_escape(s),
            Escaper::JsRegexp => js_regexp_escape(s),
            Escaper::CssValueFilter => css_value_filter(s),
            Escaper::CssEscaper => css_escape(s),
            Escaper::Elide => String::new(),
        }
    }
}

/// Run a full escaper chain over a printed value
pub(crate) fn escape_chain(chain: &[Escaper], value: &Value) -> String {
    let Some((first, rest)) = chain.split_first() else {
        return print_value(value);
    };
    rest.iter()
        .fold(first.apply_value(value), |acc, escaper| escaper.apply(&acc))
}

pub(crate) fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\0' => out.push('\u{FFFD}'),
            '"' => out.push_str("&#34;"),
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&#39;"),
            '+' => out.push_str("&#43;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

fn html_nospace_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\0' => out.push_str("&#xfffd;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\u{0B}' => out.push_str("&#11;"),
            '\u{0C}' => out.push_str("&#12;"),
            '\r' => out.push_str("&#13;"),
            ' ' => out.push_str("&#32;"),
            '"' => out.push_str("&#34;"),
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&#39;"),
            '+' => out.push_str("&#43;"),
            '<' => out.push_str("&lt;"),
            '=' => out.push_str("&#61;"),
            '>' => out.push_str("&gt;"),
            '`' => out.push_str("&#96;"),
            other => out.push(other),
        }
    }
    out
}

fn html_name_filter(s: &str) -> String {
    let name = s.to_ascii_lowercase();
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    // A name that would switch the value's content type is never safe
    if !valid || AttrKind::from_name(&name) != AttrKind::None {
        return FILTER_FAILSAFE.to_string();
    }
    name
}

fn url_filter(s: &str) -> String {
    if let Some((scheme, _)) = s.split_once(':') {
        if !scheme.contains('/') {
            let allowed = ["http", "https", "mailto"]
                .iter()
                .any(|safe| scheme.eq_ignore_ascii_case(safe));
            if !allowed {
                return format!("#{}", FILTER_FAILSAFE);
            }
        }
    }
    s.to_string()
}

/// Percent-encode for URLs; `normalize` keeps reserved characters and
/// existing valid escapes
fn url_process(s: &str, normalize: bool) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    for (i, &b) in bytes.iter().enumerate() {
        let keep = match b {
            b'!' | b'#' | b'$' | b'&' | b'*' | b'+' | b',' | b'/' | b':' | b';' | b'='
            | b'?' | b'@' | b'[' | b']' => normalize,
            b'-' | b'.' | b'_' | b'~' => true,
            b'%' => {
                normalize
                    && bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                    && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit)
            }
            b => b.is_ascii_alphanumeric(),
        };
        if keep {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02x}", b));
        }
    }
    out
}

fn is_js_ident_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Encode a value as a JavaScript expression safe to embed in HTML
fn js_val_escape(value: &Value) -> String {
    let json = serde_json::to_string(value).unwrap_or_else(|_| "null".to_string());
    let mut encoded = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => encoded.push_str("\\u003c"),
            '>' => encoded.push_str("\\u003e"),
            '&' => encoded.push_str("\\u0026"),
            '\u{2028}' => encoded.push_str("\\u2028"),
            '\u{2029}' => encoded.push_str("\\u2029"),
            other => encoded.push(other),
        }
    }
    // Keep identifiers and numbers from running into adjacent keywords
    let pad = encoded.chars().next().is_some_and(is_js_ident_part)
        || encoded.chars().last().is_some_and(is_js_ident_part);
    if pad {
        format!(" {} ", encoded)
    } else {
        encoded
    }
}

fn js_str_escape(s: &str) -> String {
    js_escape_with(s, |_| None)
}

/// String escaping plus `$`, `{` and `}`, so data cannot open an interpolation
fn js_tmpl_str_escape(s: &str) -> String {
    js_escape_with(s, |c| match c {
        '$' => Some("\\u0024"),
        '{' => Some("\\u007b"),
        '}' => Some("\\u007d"),
        _ => None,
    })
}

/// String escaping plus every regexp metacharacter; never empty, so the
/// literal cannot turn into a `//` comment
fn js_regexp_escape(s: &str) -> String {
    let out = js_escape_with(s, |c| match c {
        '$' => Some("\\$"),
        '(' => Some("\\("),
        ')' => Some("\\)"),
        '*' => Some("\\*"),
        '-' => Some("\\-"),
        '.' => Some("\\."),
        '?' => Some("\\?"),
        '[' => Some("\\["),
        ']' => Some("\\]"),
        '^' => Some("\\^"),
        '{' => Some("\\{"),
        '|' => Some("\\|"),
        '}' => Some("\\}"),
        _ => None,
    });
    if out.is_empty() {
        "(?:)".to_string()
    } else {
        out
    }
}

/// Backslash-escape `s` for a JavaScript literal, consulting `extra` first
fn js_escape_with(s: &str, extra: impl Fn(char) -> Option<&'static str>) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if let Some(replacement) = extra(c) {
            out.push_str(replacement);
            continue;
        }
        match c {
            '\0' => out.push_str("\\u0000"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\u{0B}' => out.push_str("\\u000b"),
            '\u{0C}' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            '"' => out.push_str("\\u0022"),
            '`' => out.push_str("\\u0060"),
            '&' => out.push_str("\\u0026"),
            '\'' => out.push_str("\\u0027"),
            '+' => out.push_str("\\u002b"),
            '/' => out.push_str("\\/"),
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '\\' => out.push_str("\\\\"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            other => out.push(other),
        }
    }
    out
}

fn css_value_filter(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut ident = String::new();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            0 | b'"' | b'\'' | b'(' | b')' | b'/' | b';' | b'@' | b'[' | b'\\' | b']' | b'`'
            | b'{' | b'}' | b'<' | b'>' => return FILTER_FAILSAFE.to_string(),
            // No `--` (comment openers and closers)
            b'-' if i > 0 && bytes[i - 1] == b'-' => return FILTER_FAILSAFE.to_string(),
            b if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' => {
                ident.push(b.to_ascii_lowercase() as char)
            }
            _ => {}
        }
    }
    if ident.contains("expression") || ident.contains("mozbinding") {
        return FILTER_FAILSAFE.to_string();
    }
    s.to_string()
}

fn css_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        let replacement = match c {
            '\0' => "\\0",
            '\t' => "\\9",
            '\n' => "\\a",
            '\u{0C}' => "\\c",
            '\r' => "\\d",
            '"' => "\\22",
            '&' => "\\26",
            '\'' => "\\27",
            '(' => "\\28",
            ')' => "\\29",
            '+' => "\\2b",
            '/' => "\\2f",
            ':' => "\\3a",
            ';' => "\\3b",
            '<' => "\\3c",
            '>' => "\\3e",
            '\\' => "\\\\",
            '{' => "\\7b",
            '}' => "\\7d",
            other => {
                out.push(other);
                continue;
            }
        };
        out.push_str(replacement);
        // A following hex digit or space would extend the escape
        if replacement != "\\\\"
            && chars
                .peek()
                .is_some_and(|next| next.is_ascii_hexdigit() || *next == ' ')
        {
            out.push(' ');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_html_escape_table() {
        assert_eq!(
            html_escape(r#"<a href="x">'&'+</a>"#),
            "&lt;a href=&#34;x&#34;&gt;&#39;&amp;&#39;&#43;&lt;/a&gt;"
        );
        assert_eq!(html_escape("nul\0"), "nul\u{FFFD}");
    }

    #[test]
    fn test_nospace_escapes_whitespace_and_equals() {
        assert_eq!(html_nospace_escape("a b=c"), "a&#32;b&#61;c");
    }

    #[test]
    fn test_name_filter() {
        assert_eq!(html_name_filter("Title"), "title");
        assert_eq!(html_name_filter("data-x_1"), "data-x_1");
        assert_eq!(html_name_filter("onclick"), FILTER_FAILSAFE);
        assert_eq!(html_name_filter("href"), FILTER_FAILSAFE);
        assert_eq!(html_name_filter("a b"), FILTER_FAILSAFE);
        assert_eq!(html_name_filter(""), FILTER_FAILSAFE);
    }

    #[test]
    fn test_url_filter_rejects_unsafe_schemes() {
        assert_eq!(url_filter("javascript:alert(1)"), "#ZgotmplZ");
        assert_eq!(url_filter("JavaScript:alert(1)"), "#ZgotmplZ");
        assert_eq!(url_filter("https://example.com"), "https://example.com");
        assert_eq!(url_filter("mailto:a@b.c"), "mailto:a@b.c");
        assert_eq!(url_filter("/path:with/colon"), "/path:with/colon");
        assert_eq!(url_filter("relative/page"), "relative/page");
    }

    #[test]
    fn test_url_normalizer_and_escaper() {
        assert_eq!(url_process("/a b?c=d", true), "/a%20b?c=d");
        assert_eq!(url_process("100%25", true), "100%25");
        assert_eq!(url_process("a&b=c d", false), "a%26b%3dc%20d");
        assert_eq!(url_process("50%", false), "50%25");
    }

    #[test]
    fn test_js_val_escape() {
        assert_eq!(
            js_val_escape(&json!("</script>")),
            r#""\u003c/script\u003e""#
        );
        assert_eq!(js_val_escape(&json!(42)), " 42 ");
        assert_eq!(js_val_escape(&json!(null)), " null ");
        assert_eq!(js_val_escape(&json!({"a": [1, 2]})), r#"{"a":[1,2]}"#);
    }

    #[test]
    fn test_js_str_escape() {
        assert_eq!(
            js_str_escape(r#"it's "x"</"#),
            r"it\u0027s \u0022x\u0022\u003c\/"
        );
        assert_eq!(js_str_escape("a\nb"), r"a\nb");
    }

    #[test]
    fn test_js_tmpl_str_escape_blocks_interpolation() {
        assert_eq!(
            js_tmpl_str_escape("${alert(1)}`"),
            r"\u0024\u007balert(1)\u007d\u0060"
        );
    }

    #[test]
    fn test_js_regexp_escape() {
        assert_eq!(js_regexp_escape("a.b*(c)"), r"a\.b\*\(c\)");
        assert_eq!(js_regexp_escape("\"/"), r"\u0022\/");
        assert_eq!(js_regexp_escape(""), "(?:)");
    }

    #[test]
    fn test_css_value_filter() {
        assert_eq!(css_value_filter("red"), "red");
        assert_eq!(css_value_filter("12px"), "12px");
        assert_eq!(css_value_filter("expression(alert(1))"), FILTER_FAILSAFE);
        assert_eq!(css_value_filter("a;b"), FILTER_FAILSAFE);
        assert_eq!(css_value_filter("<!--"), FILTER_FAILSAFE);
    }

    #[test]
    fn test_css_escape_separates_hex_digits() {
        assert_eq!(css_escape("a\"b"), r"a\22 b");
        assert_eq!(css_escape("x<y"), r"x\3cy");
        assert_eq!(css_escape("q:z"), r"q\3az");
    }

    #[test]
    fn test_chain_applies_in_order() {
        let chain = [Escaper::UrlFilter, Escaper::UrlNormalizer, Escaper::Attr];
        assert_eq!(
            escape_chain(&chain, &json!("https://x.test/a b?q=\"1\"")),
            "https://x.test/a%20b?q=%221%22"
        );
        assert_eq!(escape_chain(&[Escaper::Elide], &json!("secret")), "");
        assert_eq!(escape_chain(&[], &json!(null)), "");
    }
}
