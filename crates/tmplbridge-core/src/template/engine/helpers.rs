//! Helper functions for value inspection and text formatting

use serde_json::{Number, Value};

/// Short kind name used in error messages
pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Type name shown in printf error markers
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "<nil>",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float64",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "[]interface {}",
        Value::Object(_) => "map[string]interface {}",
    }
}

/// Template truthiness: false, zero, null and empty values are false
pub(crate) fn is_true(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Text of a value printed by an action (`null` prints nothing)
pub(crate) fn print_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => {
            let mut out = String::new();
            sprint_into(&mut out, other);
            out
        }
    }
}

/// Default formatting of a value, as `print` and `%v` render it
pub(crate) fn sprint_into(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("<nil>"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&format_number(n)),
        Value::String(s) => out.push_str(s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                sprint_into(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push_str("map[");
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(key);
                out.push(':');
                if let Some(item) = map.get(key) {
                    sprint_into(out, item);
                }
            }
            out.push(']');
        }
    }
}

pub(crate) fn sprint(value: &Value) -> String {
    let mut out = String::new();
    sprint_into(&mut out, value);
    out
}

pub(crate) fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    format_float(n.as_f64().unwrap_or(0.0))
}

/// Shortest round-trip form, switching to exponent form outside [1e-4, 1e21)
pub(crate) fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    let abs = f.abs();
    if abs != 0.0 && !(1e-4..1e21).contains(&abs) {
        return fix_exponent(&format!("{:e}", f));
    }
    format!("{}", f)
}

/// Rewrite Rust's `1.5e21` / `1e-5` into `1.5e+21` / `1e-05`
fn fix_exponent(formatted: &str) -> String {
    let Some((mantissa, exp)) = formatted.split_once(|c| c == 'e' || c == 'E') else {
        return formatted.to_string();
    };
    let upper = formatted.contains('E');
    let (sign, digits) = match exp.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exp.trim_start_matches('+')),
    };
    format!(
        "{}{}{}{:0>2}",
        mantissa,
        if upper { 'E' } else { 'e' },
        sign,
        digits
    )
}

/// Parsed `%` directive
#[derive(Debug, Default, Clone, Copy)]
struct Spec {
    minus: bool,
    plus: bool,
    space: bool,
    zero: bool,
    sharp: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

impl Spec {
    /// Pad to width; zero padding goes after any sign
    fn pad(&self, body: String, numeric: bool) -> String {
        let Some(width) = self.width else {
            return body;
        };
        let len = body.chars().count();
        if len >= width {
            return body;
        }
        let fill = width - len;
        if self.minus {
            return format!("{}{}", body, " ".repeat(fill));
        }
        if self.zero && numeric {
            let (sign, digits) = match body.chars().next() {
                Some(c @ ('+' | '-' | ' ')) => (c.to_string(), &body[1..]),
                _ => (String::new(), body.as_str()),
            };
            return format!("{}{}{}", sign, "0".repeat(fill), digits);
        }
        format!("{}{}", " ".repeat(fill), body)
    }

    fn sign(&self, negative: bool) -> &'static str {
        if negative {
            "-"
        } else if self.plus {
            "+"
        } else if self.space {
            " "
        } else {
            ""
        }
    }
}

fn bad_verb(verb: char, value: &Value) -> String {
    match value {
        Value::Null => format!("%!{}(<nil>)", verb),
        other => format!("%!{}({}={})", verb, type_name(other), sprint(other)),
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn as_integer(value: &Value) -> Option<i128> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from)),
        _ => None,
    }
}

/// `%e` with a two-digit minimum exponent
fn format_exp(f: f64, precision: usize, upper: bool) -> String {
    let formatted = format!("{:.*e}", precision, f);
    let fixed = fix_exponent(&formatted);
    if upper {
        fixed.to_uppercase()
    } else {
        fixed
    }
}

/// `%g` with an explicit precision (significant digits)
fn format_general(f: f64, precision: usize, upper: bool) -> String {
    let precision = precision.max(1);
    if f == 0.0 {
        return "0".to_string();
    }
    let rounded = format!("{:.*e}", precision - 1, f);
    let exp: i32 = rounded
        .split_once('e')
        .and_then(|(_, exp)| exp.parse().ok())
        .unwrap_or(0);
    let body = if exp < -4 || exp >= precision as i32 {
        let (mantissa, _) = rounded.split_once('e').unwrap_or((&rounded, ""));
        let mantissa = trim_fraction(mantissa);
        fix_exponent(&format!("{}e{}", mantissa, exp))
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, f)).to_string()
    };
    if upper {
        body.to_uppercase()
    } else {
        body
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

fn format_arg(verb: char, spec: &Spec, value: &Value) -> String {
    match verb {
        'v' => {
            let numeric = matches!(value, Value::Number(_));
            let mut body = sprint(value);
            if numeric && !body.starts_with('-') {
                body = format!("{}{}", spec.sign(false), body);
            }
            spec.pad(body, numeric)
        }
        's' => match value {
            Value::String(s) => {
                let body = match spec.precision {
                    Some(p) => s.chars().take(p).collect(),
                    None => s.clone(),
                };
                spec.pad(body, false)
            }
            Value::Array(_) | Value::Object(_) => spec.pad(sprint(value), false),
            other => bad_verb(verb, other),
        },
        'd' => match as_integer(value) {
            Some(i) => spec.pad(format!("{}{}", spec.sign(i < 0), i.abs()), true),
            None => bad_verb(verb, value),
        },
        'f' | 'F' | 'e' | 'E' | 'g' | 'G' => match as_float(value) {
            Some(f) => {
                let sign = spec.sign(f.is_sign_negative() && f != 0.0);
                let abs = f.abs();
                let body = match verb {
                    'f' | 'F' => format!("{:.*}", spec.precision.unwrap_or(6), abs),
                    'e' | 'E' => format_exp(abs, spec.precision.unwrap_or(6), verb == 'E'),
                    _ => match spec.precision {
                        Some(p) => format_general(abs, p, verb == 'G'),
                        None => format_float(abs),
                    },
                };
                spec.pad(format!("{}{}", sign, body), true)
            }
            None => bad_verb(verb, value),
        },
        't' => match value {
            Value::Bool(b) => spec.pad(b.to_string(), false),
            other => bad_verb(verb, other),
        },
        'q' => match value {
            Value::String(s) => spec.pad(format!("{:?}", s), false),
            Value::Number(_) => match as_integer(value)
                .and_then(|i| u32::try_from(i).ok())
                .and_then(char::from_u32)
            {
                Some(c) => spec.pad(format!("{:?}", c), false),
                None => bad_verb(verb, value),
            },
            other => bad_verb(verb, other),
        },
        'x' | 'X' => {
            let body = match value {
                Value::String(s) => Some(
                    s.bytes()
                        .map(|b| format!("{:02x}", b))
                        .collect::<String>(),
                ),
                _ => as_integer(value).map(|i| {
                    let prefix = if spec.sharp { "0x" } else { "" };
                    format!("{}{}{:x}", spec.sign(i < 0), prefix, i.abs())
                }),
            };
            match body {
                Some(body) if verb == 'X' => spec.pad(body.to_uppercase(), true),
                Some(body) => spec.pad(body, true),
                None => bad_verb(verb, value),
            }
        }
        'o' | 'O' | 'b' => match as_integer(value) {
            Some(i) => {
                let digits = if verb == 'b' {
                    format!("{:b}", i.unsigned_abs())
                } else {
                    format!("{:o}", i.unsigned_abs())
                };
                let prefix = match (verb, spec.sharp) {
                    ('O', _) => "0o",
                    ('o', true) => "0",
                    ('b', true) => "0b",
                    _ => "",
                };
                spec.pad(format!("{}{}{}", spec.sign(i < 0), prefix, digits), true)
            }
            None => bad_verb(verb, value),
        },
        'c' => match as_integer(value)
            .and_then(|i| u32::try_from(i).ok())
            .and_then(char::from_u32)
        {
            Some(c) => spec.pad(c.to_string(), false),
            None => bad_verb(verb, value),
        },
        _ => bad_verb(verb, value),
    }
}

/// printf-style formatting over template values
pub(crate) fn sprintf(format: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();
    let mut next_arg = 0usize;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut spec = Spec::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.minus = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '0' => spec.zero = true,
                '#' => spec.sharp = true,
                _ => break,
            }
            chars.next();
        }
        spec.width = take_digits(&mut chars);
        if chars.peek() == Some(&'.') {
            chars.next();
            spec.precision = Some(take_digits(&mut chars).unwrap_or(0));
        }

        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        match args.get(next_arg) {
            Some(value) => out.push_str(&format_arg(verb, &spec, value)),
            None => out.push_str(&format!("%!{}(MISSING)", verb)),
        }
        next_arg += 1;
    }

    if next_arg < args.len() {
        let extra: Vec<String> = args[next_arg..]
            .iter()
            .map(|value| match value {
                Value::Null => "<nil>".to_string(),
                other => format!("{}={}", type_name(other), sprint(other)),
            })
            .collect();
        out.push_str(&format!("%!(EXTRA {})", extra.join(", ")));
    }
    out
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<usize> {
    let mut digits = String::new();
    while let Some(&c) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        for value in [json!(null), json!(false), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(!is_true(&value), "{value}");
        }
        for value in [json!(true), json!(-1), json!(0.5), json!(" "), json!([0]), json!({"a": null})] {
            assert!(is_true(&value), "{value}");
        }
    }

    #[test]
    fn test_format_float_forms() {
        assert_eq!(format_float(2.0), "2");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(1e21), "1e+21");
        assert_eq!(format_float(1.5e-5), "1.5e-05");
        assert_eq!(format_float(f64::INFINITY), "+Inf");
    }

    #[test]
    fn test_print_null_top_level_and_nested() {
        assert_eq!(print_value(&json!(null)), "");
        assert_eq!(sprint(&json!(null)), "<nil>");
        assert_eq!(print_value(&json!({"b": [1, null], "a": "x"})), "map[a:x b:[1 <nil>]]");
    }

    #[test]
    fn test_sprintf_padding_and_bad_verb() {
        assert_eq!(sprintf("%-4s|%04d|%.2f", &[json!("ab"), json!(7), json!(3.14159)]), "ab  |0007|3.14");
        assert_eq!(sprintf("%d", &[json!("x")]), "%!d(string=x)");
        assert_eq!(sprintf("100%%", &[]), "100%");
    }

    #[test]
    fn test_sprintf_octal_and_binary() {
        assert_eq!(sprintf("%o %b", &[json!(255), json!(255)]), "377 11111111");
        assert_eq!(sprintf("%#o %O %#b", &[json!(8), json!(8), json!(5)]), "010 0o10 0b101");
        assert_eq!(sprintf("%o|%06b", &[json!(-8), json!(5)]), "-10|000101");
        assert_eq!(sprintf("%b", &[json!("x")]), "%!b(string=x)");
    }
}
