//! Built-in template functions

use std::cmp::Ordering;

use serde_json::Value;

use super::escape::html_escape;
use super::helpers::{is_true, kind_name, sprint, sprint_into, sprintf};
use crate::config::MissingKeyPolicy;
use crate::template::error::TemplateError;

/// Every function name a template may call
pub(crate) const BUILTINS: &[&str] = &[
    "and", "or", "not", "len", "index", "slice", "eq", "ne", "lt", "le", "gt", "ge", "print",
    "println", "printf", "html", "js", "urlquery",
];

pub(crate) fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

fn arg_count(func: &str, expected: &str, got: usize, line: usize) -> TemplateError {
    TemplateError::WrongArgCount {
        func: func.to_string(),
        expected: expected.to_string(),
        got,
        line,
    }
}

fn exactly(func: &str, args: &[Value], n: usize, line: usize) -> Result<(), TemplateError> {
    if args.len() != n {
        return Err(arg_count(func, &n.to_string(), args.len(), line));
    }
    Ok(())
}

/// Call a builtin with fully evaluated arguments.
///
/// `and` and `or` are evaluated lazily by the executor and never reach here.
pub(crate) fn call(
    name: &str,
    args: Vec<Value>,
    policy: MissingKeyPolicy,
    line: usize,
) -> Result<Value, TemplateError> {
    match name {
        "not" => {
            exactly(name, &args, 1, line)?;
            Ok(Value::Bool(!is_true(&args[0])))
        }
        "len" => {
            exactly(name, &args, 1, line)?;
            length(&args[0], line).map(Value::from)
        }
        "index" => {
            let Some((item, indices)) = args.split_first() else {
                return Err(arg_count(name, "at least 1", 0, line));
            };
            index(item, indices, policy, line)
        }
        "slice" => {
            let Some((item, indices)) = args.split_first() else {
                return Err(arg_count(name, "at least 1", 0, line));
            };
            slice(item, indices, line)
        }
        "eq" => {
            if args.len() < 2 {
                return Err(arg_count(name, "at least 2", args.len(), line));
            }
            let (first, rest) = (&args[0], &args[1..]);
            for other in rest {
                if equal(first, other, line)? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        "ne" => {
            exactly(name, &args, 2, line)?;
            Ok(Value::Bool(!equal(&args[0], &args[1], line)?))
        }
        "lt" | "le" | "gt" | "ge" => {
            exactly(name, &args, 2, line)?;
            let ordering = compare(&args[0], &args[1], line)?;
            Ok(Value::Bool(match name {
                "lt" => ordering == Ordering::Less,
                "le" => ordering != Ordering::Greater,
                "gt" => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        "print" => Ok(Value::String(sprint_args(&args))),
        "println" => Ok(Value::String(sprintln_args(&args))),
        "printf" => {
            let Some((format, rest)) = args.split_first() else {
                return Err(arg_count(name, "at least 1", 0, line));
            };
            let Value::String(format) = format else {
                return Err(TemplateError::type_mismatch(
                    format!("printf format must be a string, not {}", kind_name(format)),
                    line,
                ));
            };
            Ok(Value::String(sprintf(format, rest)))
        }
        "html" => Ok(Value::String(html_escape_builtin(&eval_args(&args)))),
        "js" => Ok(Value::String(js_escape_builtin(&eval_args(&args)))),
        "urlquery" => Ok(Value::String(query_escape(&eval_args(&args)))),
        other => Err(TemplateError::UndefinedFunction {
            name: other.to_string(),
            line,
        }),
    }
}

fn length(value: &Value, line: usize) -> Result<usize, TemplateError> {
    match value {
        Value::String(s) => Ok(s.len()),
        Value::Array(items) => Ok(items.len()),
        Value::Object(map) => Ok(map.len()),
        other => Err(TemplateError::type_mismatch(
            format!("len of type {}", kind_name(other)),
            line,
        )),
    }
}

fn integer_index(value: &Value, line: usize) -> Result<i64, TemplateError> {
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| {
            TemplateError::type_mismatch(format!("cannot index with non-integer {}", n), line)
        }),
        other => Err(TemplateError::type_mismatch(
            format!("cannot index with {}", kind_name(other)),
            line,
        )),
    }
}

fn checked_position(index: i64, len: usize, line: usize) -> Result<usize, TemplateError> {
    usize::try_from(index)
        .ok()
        .filter(|i| *i < len)
        .ok_or(TemplateError::IndexOutOfRange { index, len, line })
}

fn index(
    item: &Value,
    indices: &[Value],
    policy: MissingKeyPolicy,
    line: usize,
) -> Result<Value, TemplateError> {
    let mut current = item.clone();
    for key in indices {
        current = match &current {
            Value::Array(items) => {
                let i = checked_position(integer_index(key, line)?, items.len(), line)?;
                items[i].clone()
            }
            Value::String(s) => {
                let i = checked_position(integer_index(key, line)?, s.len(), line)?;
                Value::from(s.as_bytes()[i])
            }
            Value::Object(map) => {
                let Value::String(k) = key else {
                    return Err(TemplateError::type_mismatch(
                        format!("cannot index object with {}", kind_name(key)),
                        line,
                    ));
                };
                // A missing key is the zero value under either policy
                map.get(k).cloned().unwrap_or(Value::Null)
            }
            Value::Null => match policy {
                MissingKeyPolicy::ZeroValue => Value::Null,
                MissingKeyPolicy::ErrorOnMissing => {
                    return Err(TemplateError::NilReceiver {
                        field: sprint(key),
                        path: "index".to_string(),
                        line,
                    })
                }
            },
            other => {
                return Err(TemplateError::type_mismatch(
                    format!("can't index item of type {}", kind_name(other)),
                    line,
                ))
            }
        };
    }
    Ok(current)
}

fn slice(item: &Value, indices: &[Value], line: usize) -> Result<Value, TemplateError> {
    let len = match item {
        Value::String(s) => s.len(),
        Value::Array(items) => items.len(),
        other => {
            return Err(TemplateError::type_mismatch(
                format!("can't slice item of type {}", kind_name(other)),
                line,
            ))
        }
    };
    let max_indices = if item.is_string() { 2 } else { 3 };
    if indices.len() > max_indices {
        return Err(arg_count("slice", &format!("at most {}", max_indices + 1), indices.len() + 1, line));
    }

    let mut bounds = [0usize, len, len];
    for (slot, index) in indices.iter().enumerate() {
        let i = integer_index(index, line)?;
        let i = usize::try_from(i)
            .ok()
            .filter(|i| *i <= len)
            .ok_or(TemplateError::IndexOutOfRange { index: i, len, line })?;
        bounds[slot] = i;
    }
    let [low, high, cap] = bounds;
    if low > high || high > cap {
        return Err(TemplateError::type_mismatch(
            format!("invalid slice index: {} > {}", low.max(high), high.min(cap)),
            line,
        ));
    }

    Ok(match item {
        Value::String(s) => Value::String(String::from_utf8_lossy(&s.as_bytes()[low..high]).into_owned()),
        Value::Array(items) => Value::Array(items[low..high].to_vec()),
        _ => Value::Null,
    })
}

/// Basic-kind equality; composites cannot be compared
fn equal(a: &Value, b: &Value, line: usize) -> Result<bool, TemplateError> {
    match (a, b) {
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => {
            Err(TemplateError::type_mismatch(
                format!(
                    "non-comparable types {} and {}",
                    kind_name(a),
                    kind_name(b)
                ),
                line,
            ))
        }
        (Value::Null, Value::Null) => Ok(true),
        (Value::Null, _) | (_, Value::Null) => Ok(false),
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        (Value::String(x), Value::String(y)) => Ok(x == y),
        (Value::Number(_), Value::Number(_)) => Ok(compare_numbers(a, b) == Ordering::Equal),
        _ => Err(incompatible(a, b, line)),
    }
}

fn incompatible(a: &Value, b: &Value, line: usize) -> TemplateError {
    TemplateError::type_mismatch(
        format!(
            "incompatible types for comparison: {} and {}",
            kind_name(a),
            kind_name(b)
        ),
        line,
    )
}

fn compare(a: &Value, b: &Value, line: usize) -> Result<Ordering, TemplateError> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => Ok(compare_numbers(a, b)),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            Err(incompatible(a, b, line))
        }
        _ => Err(TemplateError::type_mismatch(
            format!(
                "invalid type for comparison: {} and {}",
                kind_name(a),
                kind_name(b)
            ),
            line,
        )),
    }
}

/// Integers compare exactly; anything involving a float compares as f64
fn compare_numbers(a: &Value, b: &Value) -> Ordering {
    let as_int = |v: &Value| {
        v.as_i64()
            .map(i128::from)
            .or_else(|| v.as_u64().map(i128::from))
    };
    if let (Some(x), Some(y)) = (as_int(a), as_int(b)) {
        return x.cmp(&y);
    }
    let x = a.as_f64().unwrap_or(0.0);
    let y = b.as_f64().unwrap_or(0.0);
    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
}

/// Spaces go between operands when neither side is a string
fn sprint_args(args: &[Value]) -> String {
    let mut out = String::new();
    let mut prev_string = false;
    for (i, arg) in args.iter().enumerate() {
        let is_string = arg.is_string();
        if i > 0 && !is_string && !prev_string {
            out.push(' ');
        }
        sprint_into(&mut out, arg);
        prev_string = is_string;
    }
    out
}

fn sprintln_args(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        sprint_into(&mut out, arg);
    }
    out.push('\n');
    out
}

/// A lone string argument is used as is; anything else is printed
fn eval_args(args: &[Value]) -> String {
    match args {
        [Value::String(s)] => s.clone(),
        _ => sprint_args(args),
    }
}

fn html_escape_builtin(s: &str) -> String {
    // Same table as the contextual escaper, minus `+`
    html_escape(s).replace("&#43;", "+")
}

fn js_escape_builtin(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '<' => out.push_str("\\u003C"),
            '>' => out.push_str("\\u003E"),
            '&' => out.push_str("\\u0026"),
            '=' => out.push_str("\\u003D"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04X}", c as u32)),
            other => out.push(other),
        }
    }
    out
}

fn query_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b' ' => out.push('+'),
            b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            b if b.is_ascii_alphanumeric() => out.push(b as char),
            b => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ZERO: MissingKeyPolicy = MissingKeyPolicy::ZeroValue;
    const STRICT: MissingKeyPolicy = MissingKeyPolicy::ErrorOnMissing;

    fn call_ok(name: &str, args: Vec<Value>) -> Value {
        call(name, args, STRICT, 1).unwrap()
    }

    #[test]
    fn test_builtin_names() {
        assert!(is_builtin("printf"));
        assert!(is_builtin("urlquery"));
        assert!(!is_builtin("upper"));
    }

    #[test]
    fn test_len_counts_bytes_and_items() {
        assert_eq!(call_ok("len", vec![json!("héllo")]), json!(6));
        assert_eq!(call_ok("len", vec![json!([1, 2, 3])]), json!(3));
        assert_eq!(call_ok("len", vec![json!({"a": 1})]), json!(1));
        assert!(matches!(
            call("len", vec![json!(3)], STRICT, 4),
            Err(TemplateError::TypeMismatch { line: 4, .. })
        ));
    }

    #[test]
    fn test_index_nested() {
        let data = json!({"rows": [[1, 2], [3, 4]]});
        assert_eq!(
            call_ok("index", vec![data, json!("rows"), json!(1), json!(0)]),
            json!(3)
        );
    }

    #[test]
    fn test_index_out_of_range() {
        let err = call("index", vec![json!([1]), json!(5)], STRICT, 2).unwrap_err();
        assert_eq!(
            err,
            TemplateError::IndexOutOfRange {
                index: 5,
                len: 1,
                line: 2
            }
        );
    }

    #[test]
    fn test_index_missing_key_is_null() {
        let data = json!({"a": 1});
        assert_eq!(
            call("index", vec![data.clone(), json!("b")], ZERO, 1).unwrap(),
            Value::Null
        );
        assert_eq!(call("index", vec![data, json!("b")], STRICT, 1).unwrap(), Value::Null);
    }

    #[test]
    fn test_index_through_null_follows_policy() {
        let data = json!({"a": null});
        assert_eq!(
            call("index", vec![data.clone(), json!("a"), json!("b")], ZERO, 1).unwrap(),
            Value::Null
        );
        assert!(matches!(
            call("index", vec![data, json!("a"), json!("b")], STRICT, 1),
            Err(TemplateError::NilReceiver { .. })
        ));
    }

    #[test]
    fn test_slice_strings_and_arrays() {
        assert_eq!(call_ok("slice", vec![json!("abcdef"), json!(1), json!(3)]), json!("bc"));
        assert_eq!(call_ok("slice", vec![json!([1, 2, 3]), json!(1)]), json!([2, 3]));
        assert!(call("slice", vec![json!("ab"), json!(2), json!(1)], STRICT, 1).is_err());
        assert!(call("slice", vec![json!("ab"), json!(3)], STRICT, 1).is_err());
    }

    #[test]
    fn test_eq_matches_any_of_rest() {
        assert_eq!(call_ok("eq", vec![json!(2), json!(1), json!(2)]), json!(true));
        assert_eq!(call_ok("eq", vec![json!("a"), json!("b")]), json!(false));
        assert_eq!(call_ok("eq", vec![json!(1), json!(1.0)]), json!(true));
        assert_eq!(call_ok("eq", vec![json!(null), json!(null)]), json!(true));
        assert_eq!(call_ok("eq", vec![json!(null), json!(0)]), json!(false));
    }

    #[test]
    fn test_comparison_type_errors() {
        assert!(call("eq", vec![json!("1"), json!(1)], STRICT, 1).is_err());
        assert!(call("eq", vec![json!([1]), json!([1])], STRICT, 1).is_err());
        assert!(call("lt", vec![json!(true), json!(false)], STRICT, 1).is_err());
        assert!(call("eq", vec![json!(1)], STRICT, 1).is_err());
    }

    #[test]
    fn test_ordering() {
        assert_eq!(call_ok("lt", vec![json!(1), json!(2.5)]), json!(true));
        assert_eq!(call_ok("ge", vec![json!("b"), json!("a")]), json!(true));
        assert_eq!(call_ok("le", vec![json!(3), json!(3)]), json!(true));
        assert_eq!(call_ok("gt", vec![json!(-1), json!(0)]), json!(false));
    }

    #[test]
    fn test_print_spacing() {
        assert_eq!(call_ok("print", vec![json!(1), json!(2)]), json!("1 2"));
        assert_eq!(call_ok("print", vec![json!("a"), json!(1), json!("b")]), json!("a1b"));
        assert_eq!(call_ok("println", vec![json!("a"), json!(1)]), json!("a 1\n"));
    }

    #[test]
    fn test_escaping_builtins() {
        assert_eq!(
            call_ok("html", vec![json!("<a href='x'>1+1</a>")]),
            json!("&lt;a href=&#39;x&#39;&gt;1+1&lt;/a&gt;")
        );
        assert_eq!(
            call_ok("js", vec![json!("it's <b>=")]),
            json!("it\\'s \\u003Cb\\u003E\\u003D")
        );
        assert_eq!(call_ok("urlquery", vec![json!("a b&c=d")]), json!("a+b%26c%3Dd"));
    }

    #[test]
    fn test_wrong_arg_count() {
        let err = call("not", vec![], STRICT, 7).unwrap_err();
        assert_eq!(
            err.to_string(),
            "line 7: wrong number of args for not: want 1 got 0"
        );
    }
}
