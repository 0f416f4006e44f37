//! HTML parsing context and its transitions over literal text

use crate::template::error::TemplateError;

/// Parser state at a point in the output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub(crate) enum State {
    /// HTML text outside tags
    #[default]
    Text,
    /// Inside a tag, before an attribute name
    Tag,
    /// Inside an attribute name
    AttrName,
    /// After an attribute name, before `=`
    AfterName,
    /// After `=`, before the value
    BeforeValue,
    /// Inside a plain attribute value
    Attr,
    /// Inside a URL-valued attribute
    Url,
    /// JavaScript outside literals
    Js,
    JsDqStr,
    JsSqStr,
    /// Template literal text, outside any `${` interpolation
    JsBqStr,
    /// Regular expression literal
    JsRegexp,
    JsLineCmt,
    JsBlockCmt,
    /// CSS outside strings
    Css,
    CssDqStr,
    CssSqStr,
    /// `<textarea>` or `<title>` content
    Rcdata,
    /// Inside `<!-- ... -->`
    HtmlCmt,
    /// Unreachable, after `{{break}}` or `{{continue}}`
    Dead,
}

/// How the current attribute value ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub(crate) enum Delim {
    #[default]
    None,
    DoubleQuote,
    SingleQuote,
    /// Unquoted value, ended by whitespace or `>`
    SpaceOrTagEnd,
}

/// Position within a URL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub(crate) enum UrlPart {
    /// Nothing of the URL written yet
    #[default]
    None,
    /// Scheme seen, no `?` or `#` yet
    PreQuery,
    QueryOrFrag,
    /// Branches disagree about where in the URL we are
    Unknown,
}

/// What a `/` would start at the current point of a script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub(crate) enum JsCtx {
    /// A regular expression literal
    #[default]
    Regexp,
    /// A division operator
    DivOp,
    /// Branches disagree
    Unknown,
}

/// Deepest nesting of template literals inside `${` interpolations
const MAX_TMPL_NEST: usize = 4;

/// Open `${` interpolations of enclosing JS template literals, each with
/// its count of unclosed `{`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub(crate) struct TmplNest {
    depth: u8,
    braces: [u8; MAX_TMPL_NEST],
}

impl TmplNest {
    fn open(&self) -> &[u8] {
        &self.braces[..usize::from(self.depth)]
    }

    /// Enter a `${` interpolation
    fn push(mut self) -> Option<Self> {
        let depth = usize::from(self.depth);
        if depth == MAX_TMPL_NEST {
            return None;
        }
        self.braces[depth] = 0;
        self.depth += 1;
        Some(self)
    }

    /// Leave the innermost interpolation
    fn pop(mut self) -> Self {
        if let Some(open) = self.top_mut() {
            // Closed slots stay zeroed so equal stacks compare equal
            *open = 0;
        }
        self.depth = self.depth.saturating_sub(1);
        self
    }

    fn top_mut(&mut self) -> Option<&mut u8> {
        let depth = usize::from(self.depth);
        depth.checked_sub(1).map(|top| &mut self.braces[top])
    }
}

/// Elements whose content is not parsed as HTML
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub(crate) enum Element {
    #[default]
    None,
    Script,
    Style,
    Textarea,
    Title,
}

impl Element {
    fn from_tag(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "script" => Element::Script,
            "style" => Element::Style,
            "textarea" => Element::Textarea,
            "title" => Element::Title,
            _ => Element::None,
        }
    }

    fn tag_name(self) -> &'static str {
        match self {
            Element::None => "",
            Element::Script => "script",
            Element::Style => "style",
            Element::Textarea => "textarea",
            Element::Title => "title",
        }
    }

    /// State entered after the start tag's `>`
    fn content_state(self) -> State {
        match self {
            Element::None => State::Text,
            Element::Script => State::Js,
            Element::Style => State::Css,
            Element::Textarea | Element::Title => State::Rcdata,
        }
    }
}

/// Content type of the attribute being written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub(crate) enum AttrKind {
    #[default]
    None,
    Script,
    Style,
    Url,
}

impl AttrKind {
    /// Classify an attribute by (lowercased) name
    pub(crate) fn from_name(name: &str) -> Self {
        let mut name = name.strip_prefix("data-").unwrap_or(name);
        if let Some((prefix, local)) = name.split_once(':') {
            if prefix == "xmlns" {
                return AttrKind::Url;
            }
            name = local;
        }
        match name {
            "action" | "archive" | "background" | "cite" | "classid" | "codebase" | "data"
            | "formaction" | "href" | "icon" | "longdesc" | "manifest" | "poster" | "profile"
            | "src" | "usemap" | "xmlns" => AttrKind::Url,
            "style" => AttrKind::Style,
            _ if name.starts_with("on") => AttrKind::Script,
            _ if name.contains("src") || name.contains("uri") || name.contains("url") => {
                AttrKind::Url
            }
            _ => AttrKind::None,
        }
    }

    fn value_state(self) -> State {
        match self {
            AttrKind::None => State::Attr,
            AttrKind::Script => State::Js,
            AttrKind::Style => State::Css,
            AttrKind::Url => State::Url,
        }
    }
}

/// Everything the escaper needs to know about a point in the output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub(crate) struct Context {
    pub state: State,
    pub delim: Delim,
    pub url_part: UrlPart,
    pub element: Element,
    pub attr: AttrKind,
    pub js_ctx: JsCtx,
    pub tmpl: TmplNest,
}

impl Context {
    /// Move out of in-between tag states the way a value written here would
    pub(crate) fn nudge(self) -> Self {
        match self.state {
            State::Tag | State::AfterName => Context {
                state: State::AttrName,
                ..self
            },
            State::BeforeValue => Context {
                state: self.attr.value_state(),
                delim: Delim::SpaceOrTagEnd,
                element: self.element,
                attr: self.attr,
                ..Context::default()
            },
            _ => self,
        }
    }

    fn in_tag(element: Element) -> Self {
        Context {
            state: State::Tag,
            element,
            ..Context::default()
        }
    }

    /// Inside the content of a script, style or RCDATA element
    fn in_raw_text(&self) -> bool {
        self.element != Element::None
            && !matches!(
                self.state,
                State::Tag | State::AttrName | State::AfterName | State::BeforeValue
            )
    }

    /// Name of a template copy specialised to this context
    pub(crate) fn mangle(&self, name: &str) -> String {
        if *self == Context::default() {
            return name.to_string();
        }
        format!(
            "{}$ctx_{:?}_{:?}_{:?}_{:?}_{:?}_{:?}_{:?}",
            name,
            self.state,
            self.delim,
            self.url_part,
            self.element,
            self.attr,
            self.js_ctx,
            self.tmpl.open()
        )
    }

    pub(crate) fn describe(&self) -> String {
        format!(
            "{{{:?} {:?} {:?} {:?} {:?} {:?}}}",
            self.state, self.delim, self.url_part, self.element, self.attr, self.js_ctx
        )
    }
}

/// Least context compatible with both branches, if any
pub(crate) fn join(a: Context, b: Context) -> Option<Context> {
    if a.state == State::Dead {
        return Some(b);
    }
    if b.state == State::Dead {
        return Some(a);
    }
    if a == b {
        return Some(a);
    }
    if (Context {
        url_part: b.url_part,
        ..a
    }) == b
    {
        return Some(Context {
            url_part: UrlPart::Unknown,
            ..a
        });
    }
    if (Context {
        js_ctx: b.js_ctx,
        ..a
    }) == b
    {
        return Some(Context {
            js_ctx: JsCtx::Unknown,
            ..a
        });
    }
    let (na, nb) = (a.nudge(), b.nudge());
    if na != a || nb != b {
        return join(na, nb);
    }
    None
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0C')
}

fn eat_space(s: &[u8], mut i: usize) -> usize {
    while i < s.len() && is_space(s[i]) {
        i += 1;
    }
    i
}

/// End of an attribute name starting at `i`
fn eat_attr_name(s: &[u8], mut i: usize, line: usize) -> Result<usize, TemplateError> {
    while i < s.len() {
        match s[i] {
            b'=' | b'>' => return Ok(i),
            b'\'' | b'"' | b'<' => {
                return Err(TemplateError::EscapeContext {
                    message: format!("{:?} in attribute name", s[i] as char),
                    line,
                })
            }
            b if is_space(b) => return Ok(i),
            _ => i += 1,
        }
    }
    Ok(i)
}

fn eat_tag_name(s: &[u8], mut i: usize) -> usize {
    while i < s.len() && (s[i].is_ascii_alphanumeric() || s[i] == b':' || s[i] == b'-') {
        i += 1;
    }
    i
}

/// Index of `</tag` (case-insensitive, followed by space, `/`, `>` or the end)
fn index_tag_end(s: &str, tag: &str) -> Option<usize> {
    let lower = s.to_ascii_lowercase();
    let needle = format!("</{}", tag);
    let bytes = lower.as_bytes();
    let mut from = 0;
    while let Some(found) = lower[from..].find(&needle) {
        let at = from + found;
        let after = at + needle.len();
        if after == bytes.len() || is_space(bytes[after]) || matches!(bytes[after], b'>' | b'/') {
            return Some(at);
        }
        from = at + 1;
    }
    None
}

/// Position just past the closing quote, honouring backslash escapes
fn find_unescaped(s: &[u8], quote: u8) -> Option<usize> {
    let mut i = 0;
    while i < s.len() {
        match s[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// Keywords after which a `/` starts a regular expression
const REGEXP_PRECEDERS: &[&str] = &[
    "break",
    "case",
    "continue",
    "delete",
    "do",
    "else",
    "finally",
    "in",
    "instanceof",
    "return",
    "throw",
    "try",
    "typeof",
    "void",
];

fn is_js_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

/// What a `/` following the script text `s` would start
fn next_js_ctx(s: &str, preceding: JsCtx) -> JsCtx {
    let s = s.trim_end_matches(['\t', '\n', '\x0C', '\r', ' ', '\u{2028}', '\u{2029}']);
    let b = s.as_bytes();
    let Some(&last) = b.last() else {
        return preceding;
    };
    match last {
        // `++` and `--` end an operand; a lone `+` or `-` is an operator
        b'+' | b'-' => {
            let run = b.iter().rev().take_while(|&&x| x == last).count();
            if run % 2 == 1 {
                JsCtx::Regexp
            } else {
                JsCtx::DivOp
            }
        }
        // `42.` is a number
        b'.' if b.len() > 1 && b[b.len() - 2].is_ascii_digit() => JsCtx::DivOp,
        b'.' | b',' | b'<' | b'>' | b'=' | b'*' | b'%' | b'&' | b'|' | b'^' | b'?' | b'!'
        | b'~' | b'(' | b'[' | b':' | b';' | b'{' | b'}' => JsCtx::Regexp,
        _ => {
            let start = b
                .iter()
                .rposition(|&x| !is_js_ident_byte(x))
                .map_or(0, |p| p + 1);
            if REGEXP_PRECEDERS.contains(&&s[start..]) {
                JsCtx::Regexp
            } else {
                JsCtx::DivOp
            }
        }
    }
}

/// How template literal text stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TemplateLiteralEnd {
    /// The closing backquote
    Close,
    /// A `${`
    Interpolation,
}

/// Position just past the backquote or `${` that ends literal text
fn find_template_literal_end(s: &[u8]) -> Option<(usize, TemplateLiteralEnd)> {
    let mut i = 0;
    while i < s.len() {
        match s[i] {
            b'\\' => i += 2,
            b'`' => return Some((i + 1, TemplateLiteralEnd::Close)),
            b'$' if s.get(i + 1) == Some(&b'{') => {
                return Some((i + 2, TemplateLiteralEnd::Interpolation))
            }
            _ => i += 1,
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegexpEnd {
    /// Position just past the closing `/`
    Closed(usize),
    Open,
    /// Input ended inside a `[...]` class
    OpenCharset,
}

/// Find the `/` closing a regular expression literal, skipping escapes
/// and slashes inside character classes
fn find_regexp_end(s: &[u8]) -> RegexpEnd {
    let mut in_charset = false;
    let mut i = 0;
    while i < s.len() {
        match s[i] {
            b'\\' => i += 1,
            b'[' => in_charset = true,
            b']' => in_charset = false,
            b'/' if !in_charset => return RegexpEnd::Closed(i + 1),
            _ => {}
        }
        i += 1;
    }
    if in_charset {
        RegexpEnd::OpenCharset
    } else {
        RegexpEnd::Open
    }
}

/// Consume a prefix of `s` in context `c`, returning the new context and
/// the number of bytes consumed
fn step(c: Context, s: &str, line: usize) -> Result<(Context, usize), TemplateError> {
    let b = s.as_bytes();
    let len = b.len();
    Ok(match c.state {
        State::Text => {
            let mut from = 0;
            loop {
                let Some(found) = s[from..].find('<') else {
                    break (c, len);
                };
                let i = from + found;
                if s[i..].starts_with("<!--") {
                    break (
                        Context {
                            state: State::HtmlCmt,
                            ..Context::default()
                        },
                        i + 4,
                    );
                }
                let mut j = i + 1;
                let end_tag = b.get(j) == Some(&b'/');
                if end_tag {
                    j += 1;
                }
                if j < len && b[j].is_ascii_alphabetic() {
                    let k = eat_tag_name(b, j);
                    let element = if end_tag {
                        Element::None
                    } else {
                        Element::from_tag(&s[j..k])
                    };
                    break (Context::in_tag(element), k);
                }
                from = i + 1;
            }
        }
        State::Tag => {
            let i = eat_space(b, 0);
            if i == len {
                return Ok((c, len));
            }
            if b[i] == b'>' {
                let next = Context {
                    state: c.element.content_state(),
                    element: c.element,
                    ..Context::default()
                };
                return Ok((next, i + 1));
            }
            let j = eat_attr_name(b, i, line)?;
            if i == j {
                return Err(TemplateError::EscapeContext {
                    message: format!(
                        "expected space, attr name, or end of tag, but got {:?}",
                        &s[i..]
                    ),
                    line,
                });
            }
            let attr = AttrKind::from_name(&s[i..j].to_ascii_lowercase());
            let state = if j == len {
                State::AttrName
            } else {
                State::AfterName
            };
            (
                Context {
                    state,
                    attr,
                    ..Context::in_tag(c.element)
                },
                j,
            )
        }
        State::AttrName => {
            let i = eat_attr_name(b, 0, line)?;
            if i == len {
                (c, len)
            } else {
                (
                    Context {
                        state: State::AfterName,
                        ..c
                    },
                    i,
                )
            }
        }
        State::AfterName => {
            let i = eat_space(b, 0);
            if i == len {
                (c, len)
            } else if b[i] != b'=' {
                // Valueless attribute; back to the tag body
                (Context::in_tag(c.element), i)
            } else {
                (
                    Context {
                        state: State::BeforeValue,
                        ..c
                    },
                    i + 1,
                )
            }
        }
        State::BeforeValue => {
            let mut i = eat_space(b, 0);
            if i == len {
                return Ok((c, len));
            }
            let delim = match b[i] {
                b'"' => {
                    i += 1;
                    Delim::DoubleQuote
                }
                b'\'' => {
                    i += 1;
                    Delim::SingleQuote
                }
                _ => Delim::SpaceOrTagEnd,
            };
            (
                Context {
                    state: c.attr.value_state(),
                    delim,
                    element: c.element,
                    attr: c.attr,
                    ..Context::default()
                },
                i,
            )
        }
        State::Attr | State::Rcdata | State::Dead => (c, len),
        State::Url => {
            let url_part = if s.contains(['#', '?']) {
                UrlPart::QueryOrFrag
            } else if eat_space(b, 0) != len && c.url_part == UrlPart::None {
                UrlPart::PreQuery
            } else {
                c.url_part
            };
            (Context { url_part, ..c }, len)
        }
        State::Js => {
            let Some(i) = s.find(['"', '\'', '`', '/', '{', '}']) else {
                let js_ctx = next_js_ctx(s, c.js_ctx);
                return Ok((Context { js_ctx, ..c }, len));
            };
            let c = Context {
                js_ctx: next_js_ctx(&s[..i], c.js_ctx),
                ..c
            };
            let to = |state| Context {
                state,
                js_ctx: JsCtx::Regexp,
                ..c
            };
            match b[i] {
                b'"' => (to(State::JsDqStr), i + 1),
                b'\'' => (to(State::JsSqStr), i + 1),
                b'`' => (to(State::JsBqStr), i + 1),
                b'{' => {
                    let mut tmpl = c.tmpl;
                    if let Some(open) = tmpl.top_mut() {
                        *open = open.checked_add(1).ok_or_else(|| TemplateError::EscapeContext {
                            message: "too many open braces in a template literal interpolation"
                                .to_string(),
                            line,
                        })?;
                    }
                    (Context { tmpl, ..to(State::Js) }, i + 1)
                }
                b'}' => match c.tmpl.open().last() {
                    // Closes the innermost `${`
                    Some(0) => (
                        Context {
                            tmpl: c.tmpl.pop(),
                            ..to(State::JsBqStr)
                        },
                        i + 1,
                    ),
                    Some(_) => {
                        let mut tmpl = c.tmpl;
                        if let Some(open) = tmpl.top_mut() {
                            *open -= 1;
                        }
                        (Context { tmpl, ..to(State::Js) }, i + 1)
                    }
                    None => (to(State::Js), i + 1),
                },
                _ => match b.get(i + 1) {
                    Some(b'/') => (Context { state: State::JsLineCmt, ..c }, i + 2),
                    Some(b'*') => (Context { state: State::JsBlockCmt, ..c }, i + 2),
                    _ => match c.js_ctx {
                        JsCtx::Regexp => (Context { state: State::JsRegexp, ..c }, i + 1),
                        JsCtx::DivOp => (to(State::Js), i + 1),
                        JsCtx::Unknown => {
                            return Err(TemplateError::EscapeContext {
                                message: format!(
                                    "'/' could start a division or regular expression: {:?}",
                                    s[i..].chars().take(32).collect::<String>()
                                ),
                                line,
                            })
                        }
                    },
                },
            }
        }
        State::JsDqStr | State::JsSqStr => {
            let quote = if c.state == State::JsDqStr { b'"' } else { b'\'' };
            match find_unescaped(b, quote) {
                Some(i) => (
                    Context {
                        state: State::Js,
                        js_ctx: JsCtx::DivOp,
                        ..c
                    },
                    i,
                ),
                None => (c, len),
            }
        }
        State::JsBqStr => match find_template_literal_end(b) {
            Some((i, TemplateLiteralEnd::Close)) => (
                Context {
                    state: State::Js,
                    js_ctx: JsCtx::DivOp,
                    ..c
                },
                i,
            ),
            Some((i, TemplateLiteralEnd::Interpolation)) => {
                let tmpl = c.tmpl.push().ok_or_else(|| TemplateError::EscapeContext {
                    message: "template literals nested too deeply".to_string(),
                    line,
                })?;
                (
                    Context {
                        state: State::Js,
                        js_ctx: JsCtx::Regexp,
                        tmpl,
                        ..c
                    },
                    i,
                )
            }
            None => (c, len),
        },
        State::JsRegexp => match find_regexp_end(b) {
            RegexpEnd::Closed(i) => (
                Context {
                    state: State::Js,
                    js_ctx: JsCtx::DivOp,
                    ..c
                },
                i,
            ),
            RegexpEnd::Open => (c, len),
            RegexpEnd::OpenCharset => {
                return Err(TemplateError::EscapeContext {
                    message: format!("unfinished JS regexp charset: {:?}", s),
                    line,
                })
            }
        },
        State::JsLineCmt => match s.find(['\n', '\r', '\u{2028}', '\u{2029}']) {
            Some(i) => (
                Context {
                    state: State::Js,
                    ..c
                },
                i,
            ),
            None => (c, len),
        },
        State::JsBlockCmt => match s.find("*/") {
            Some(i) => (
                Context {
                    state: State::Js,
                    ..c
                },
                i + 2,
            ),
            None => (c, len),
        },
        State::Css => match s.find(['"', '\'']) {
            Some(i) => {
                let state = if b[i] == b'"' {
                    State::CssDqStr
                } else {
                    State::CssSqStr
                };
                (Context { state, ..c }, i + 1)
            }
            None => (c, len),
        },
        State::CssDqStr | State::CssSqStr => {
            let quote = if c.state == State::CssDqStr { b'"' } else { b'\'' };
            match find_unescaped(b, quote) {
                Some(i) => (
                    Context {
                        state: State::Css,
                        ..c
                    },
                    i,
                ),
                None => (c, len),
            }
        }
        State::HtmlCmt => match s.find("-->") {
            Some(i) => (Context::default(), i + 3),
            None => (c, len),
        },
    })
}

/// Append the part of `chunk` that survives comment stripping
fn emit(before: Context, after: Context, chunk: &str, out: &mut String) {
    if before.state == State::HtmlCmt {
        // comment body and `-->` are dropped
    } else if after.state == State::HtmlCmt {
        out.push_str(&chunk[..chunk.len() - "<!--".len()]);
    } else {
        out.push_str(chunk);
    }
}

/// One step over the front of `s`, never consuming nothing without a
/// state change
fn advance(c: Context, s: &str, line: usize) -> Result<(Context, usize), TemplateError> {
    let (next, consumed) = step(c, s, line)?;
    if consumed == 0 && next == c {
        return Ok((next, s.len()));
    }
    Ok((next, consumed))
}

/// Run steps over an attribute value, which never leaves its delimiter
fn run_value(
    mut c: Context,
    s: &str,
    line: usize,
    out: &mut String,
) -> Result<Context, TemplateError> {
    let mut pos = 0;
    while pos < s.len() {
        let (next, consumed) = advance(c, &s[pos..], line)?;
        out.push_str(&s[pos..pos + consumed]);
        c = next;
        pos += consumed;
    }
    Ok(c)
}

/// Advance the context over literal template text.
///
/// Returns the new context and the text to emit (HTML comments removed).
pub(crate) fn transition_text(
    mut c: Context,
    text: &str,
    line: usize,
) -> Result<(Context, String), TemplateError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while !rest.is_empty() {
        if c.delim != Delim::None {
            let end = match c.delim {
                Delim::DoubleQuote => rest.find('"'),
                Delim::SingleQuote => rest.find('\''),
                _ => rest.find(|ch: char| ch.is_ascii_whitespace() || ch == '>'),
            };
            let Some(i) = end else {
                c = run_value(c, rest, line, &mut out)?;
                break;
            };
            run_value(c, &rest[..i], line, &mut out)?;
            let consumed = if c.delim == Delim::SpaceOrTagEnd { i } else { i + 1 };
            out.push_str(&rest[i..consumed]);
            c = Context::in_tag(c.element);
            rest = &rest[consumed..];
            continue;
        }

        // Content of script, style and RCDATA elements ends at the end tag
        let mut scope = rest;
        if c.in_raw_text() {
            if let Some(i) = index_tag_end(rest, c.element.tag_name()) {
                if i == 0 {
                    c = Context::default();
                    continue;
                }
                scope = &rest[..i];
            }
        }
        let (next, consumed) = advance(c, scope, line)?;
        emit(c, next, &scope[..consumed], &mut out);
        c = next;
        rest = &rest[consumed..];
    }

    Ok((c, out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn after(text: &str) -> Context {
        transition_text(Context::default(), text, 1).unwrap().0
    }

    #[test]
    fn test_attr_kind_from_name() {
        assert_eq!(AttrKind::from_name("href"), AttrKind::Url);
        assert_eq!(AttrKind::from_name("data-src"), AttrKind::Url);
        assert_eq!(AttrKind::from_name("xlink:href"), AttrKind::Url);
        assert_eq!(AttrKind::from_name("onclick"), AttrKind::Script);
        assert_eq!(AttrKind::from_name("style"), AttrKind::Style);
        assert_eq!(AttrKind::from_name("imageurl"), AttrKind::Url);
        assert_eq!(AttrKind::from_name("title"), AttrKind::None);
    }

    #[test]
    fn test_transition_into_quoted_attr() {
        let c = after(r#"<a href=""#);
        assert_eq!(c.state, State::Url);
        assert_eq!(c.delim, Delim::DoubleQuote);
        assert_eq!(c.url_part, UrlPart::None);
    }

    #[test]
    fn test_transition_through_closed_attr() {
        assert_eq!(after(r#"<a title="x" href='/y?z'>done"#), Context::default());
    }

    #[test]
    fn test_transition_script_body() {
        let c = after("<script>var s = '");
        assert_eq!(c.state, State::JsSqStr);
        assert_eq!(c.element, Element::Script);
        assert_eq!(after("<script>var s = '</script>';</script>"), Context::default());
    }

    #[test]
    fn test_next_js_ctx() {
        assert_eq!(next_js_ctx("x = ", JsCtx::DivOp), JsCtx::Regexp);
        assert_eq!(next_js_ctx("return ", JsCtx::DivOp), JsCtx::Regexp);
        assert_eq!(next_js_ctx("x ", JsCtx::Regexp), JsCtx::DivOp);
        assert_eq!(next_js_ctx("f(a) ", JsCtx::Regexp), JsCtx::DivOp);
        assert_eq!(next_js_ctx("x++", JsCtx::Regexp), JsCtx::DivOp);
        assert_eq!(next_js_ctx("x+", JsCtx::DivOp), JsCtx::Regexp);
        assert_eq!(next_js_ctx("42.", JsCtx::Regexp), JsCtx::DivOp);
        assert_eq!(next_js_ctx("obj.", JsCtx::DivOp), JsCtx::Regexp);
        assert_eq!(next_js_ctx("  ", JsCtx::Unknown), JsCtx::Unknown);
        assert_eq!(next_js_ctx("returned ", JsCtx::Regexp), JsCtx::DivOp);
    }

    #[test]
    fn test_transition_js_regexp() {
        let c = after("<script>var r = /a");
        assert_eq!(c.state, State::JsRegexp);
        let c = after(r#"<script>var r = /"[/]/; var s = "#);
        assert_eq!(c.state, State::Js);
        assert_eq!(c.js_ctx, JsCtx::Regexp);
        let c = after("<script>var x = a / 2 / ");
        assert_eq!(c.state, State::Js);
        assert_eq!(c.js_ctx, JsCtx::Regexp);
    }

    #[test]
    fn test_transition_template_literal() {
        let c = after("<script>var s = `a");
        assert_eq!(c.state, State::JsBqStr);
        let c = after("<script>var s = `a${ {b: 1}[");
        assert_eq!(c.state, State::Js);
        assert_eq!(c.tmpl.open(), &[0]);
        let c = after("<script>var s = `a${ {b: 1}.b }");
        assert_eq!(c.state, State::JsBqStr);
        assert!(c.tmpl.open().is_empty());
        assert_eq!(after("<script>var s = `${`${1}`}`;</script>"), Context::default());
    }

    #[test]
    fn test_template_literal_nesting_limit() {
        let deep = format!("<script>{}", "`${".repeat(MAX_TMPL_NEST + 1));
        let err = transition_text(Context::default(), &deep, 1).unwrap_err();
        assert!(err.to_string().contains("template literals nested too deeply"));
    }

    #[test]
    fn test_transition_rcdata() {
        let c = after("<textarea><b>");
        assert_eq!(c.state, State::Rcdata);
        assert_eq!(after("<textarea><b></textarea>"), Context::default());
    }

    #[test]
    fn test_html_comments_removed() {
        let (c, out) = transition_text(Context::default(), "a<!-- x -->b<!--c", 1).unwrap();
        assert_eq!(out, "ab");
        assert_eq!(c.state, State::HtmlCmt);
    }

    #[test]
    fn test_join_url_parts() {
        let a = Context {
            state: State::Url,
            url_part: UrlPart::PreQuery,
            ..Context::default()
        };
        let b = Context {
            url_part: UrlPart::QueryOrFrag,
            ..a
        };
        assert_eq!(join(a, b).unwrap().url_part, UrlPart::Unknown);
        assert!(join(a, Context::default()).is_none());
    }

    #[test]
    fn test_join_js_ctx() {
        let regexp = after("<script>x = ");
        let div = after("<script>x");
        assert_eq!(join(regexp, div).unwrap().js_ctx, JsCtx::Unknown);
        assert_eq!(join(div, div), Some(div));
    }

    #[test]
    fn test_quote_in_attr_name_rejected() {
        let err = transition_text(Context::default(), "<a x\"y=1>", 1).unwrap_err();
        assert!(matches!(err, TemplateError::EscapeContext { .. }));
    }
}
