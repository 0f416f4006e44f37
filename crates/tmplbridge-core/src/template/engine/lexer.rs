//! Lexing for the template engine
//!
//! Splits template source into text runs and action items with a single
//! forward-only scan. Trim markers and comments are resolved here so the
//! parser never sees them.

use crate::template::error::TemplateError;

/// Control keywords recognised inside actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Keyword {
    If,
    Else,
    End,
    Range,
    With,
    Define,
    Template,
    Block,
    Break,
    Continue,
}

impl Keyword {
    fn from_ident(ident: &str) -> Option<Self> {
        Some(match ident {
            "if" => Keyword::If,
            "else" => Keyword::Else,
            "end" => Keyword::End,
            "range" => Keyword::Range,
            "with" => Keyword::With,
            "define" => Keyword::Define,
            "template" => Keyword::Template,
            "block" => Keyword::Block,
            "break" => Keyword::Break,
            "continue" => Keyword::Continue,
            _ => return None,
        })
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::End => "end",
            Keyword::Range => "range",
            Keyword::With => "with",
            Keyword::Define => "define",
            Keyword::Template => "template",
            Keyword::Block => "block",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
        }
    }
}

/// Item classification
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ItemKind {
    /// Literal text outside actions (already trimmed)
    Text(String),
    /// `{{`
    LeftDelim,
    /// `}}`
    RightDelim,
    /// Run of whitespace inside an action
    Space,
    /// `.name` (stored without the dot)
    Field(String),
    /// `$` or `$name` (stored with the dollar)
    Variable(String),
    /// Function name
    Identifier(String),
    Keyword(Keyword),
    /// Decoded string literal (quoted or raw)
    Str(String),
    /// Character literal
    Char(char),
    /// Numeric literal, unparsed
    Number(String),
    Bool(bool),
    Nil,
    /// Bare `.`
    Dot,
    LeftParen,
    RightParen,
    Pipe,
    /// `:=`
    Declare,
    /// `=`
    Assign,
    Comma,
}

/// A lexed item with its source line (for error messages)
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Item {
    pub kind: ItemKind,
    pub line: usize,
}

/// Scanner position between text and actions
#[derive(Debug, Clone, Copy, PartialEq)]
enum ScanState {
    /// Scanning literal text up to the next `{{`
    Text,
    /// Inside an action, tracking parenthesis depth
    Action { start_line: usize, paren_depth: usize },
    /// At the `/*` of a comment action
    Comment { start_line: usize },
}

/// Lex a whole template
pub(crate) fn lex(source: &str) -> Result<Vec<Item>, TemplateError> {
    let mut lexer = Lexer::new(source);
    lexer.run()?;
    Ok(lexer.items)
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    state: ScanState,
    items: Vec<Item>,
    /// Set by ` -}}`: strip leading whitespace from the next text run
    trim_next_text: bool,
}

const LEFT_DELIM: &str = "{{";
const RIGHT_DELIM: &str = "}}";
const LEFT_COMMENT: &str = "/*";
const RIGHT_COMMENT: &str = "*/";

fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n')
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

fn count_newlines(text: &str) -> usize {
    text.bytes().filter(|&b| b == b'\n').count()
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            state: ScanState::Text,
            items: Vec::new(),
            trim_next_text: false,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek_byte(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    fn emit(&mut self, kind: ItemKind, line: usize) {
        self.items.push(Item { kind, line });
    }

    fn run(&mut self) -> Result<(), TemplateError> {
        while self.pos < self.src.len() {
            match self.state {
                ScanState::Text => self.lex_text(),
                ScanState::Action {
                    start_line,
                    paren_depth,
                } => self.lex_inside_action(start_line, paren_depth)?,
                ScanState::Comment { start_line } => self.lex_comment(start_line)?,
            }
        }
        match self.state {
            ScanState::Text => {}
            ScanState::Action { start_line, .. } => {
                return Err(TemplateError::syntax("unclosed action", start_line))
            }
            ScanState::Comment { start_line } => {
                return Err(TemplateError::syntax("unclosed comment", start_line))
            }
        }
        Ok(())
    }

    /// Whether the `{{` at `pos` opens with a left trim marker (`{{- `)
    fn has_left_trim(&self, delim_pos: usize) -> bool {
        let bytes = self.src.as_bytes();
        let after = delim_pos + LEFT_DELIM.len();
        bytes.get(after) == Some(&b'-') && bytes.get(after + 1).is_some_and(|b| is_space(*b))
    }

    fn lex_text(&mut self) {
        let rest = self.rest();
        let (raw, delim_at) = match rest.find(LEFT_DELIM) {
            Some(idx) => (&rest[..idx], Some(self.pos + idx)),
            None => (rest, None),
        };

        let mut text = raw;
        if self.trim_next_text {
            text = text.trim_start_matches(|c: char| c.is_ascii_whitespace());
            self.trim_next_text = false;
        }
        if let Some(at) = delim_at {
            if self.has_left_trim(at) {
                text = text.trim_end_matches(|c: char| c.is_ascii_whitespace());
            }
        }
        if !text.is_empty() {
            self.emit(ItemKind::Text(text.to_string()), self.line);
        }
        self.line += count_newlines(raw);
        self.pos += raw.len();

        if delim_at.is_some() {
            self.open_action();
        }
    }

    /// Consume `{{` (plus trim marker) and either a whole comment or the
    /// start of an action
    fn open_action(&mut self) {
        let start_line = self.line;
        let trimmed = self.has_left_trim(self.pos);
        self.pos += LEFT_DELIM.len();
        if trimmed {
            // "-" and the mandatory whitespace byte
            if self.peek_byte(1) == Some(b'\n') {
                self.line += 1;
            }
            self.pos += 2;
        }

        if self.rest().starts_with(LEFT_COMMENT) {
            self.state = ScanState::Comment { start_line };
            return;
        }

        self.emit(ItemKind::LeftDelim, start_line);
        self.state = ScanState::Action {
            start_line,
            paren_depth: 0,
        };
    }

    fn lex_comment(&mut self, start_line: usize) -> Result<(), TemplateError> {
        let body_start = self.pos + LEFT_COMMENT.len();
        let close = self.src[body_start..]
            .find(RIGHT_COMMENT)
            .ok_or_else(|| TemplateError::syntax("unclosed comment", start_line))?;
        let body = &self.src[body_start..body_start + close];
        self.line += count_newlines(body);
        self.pos = body_start + close + RIGHT_COMMENT.len();

        if self.at_right_trim() {
            self.pos += 1 + 1 + RIGHT_DELIM.len();
            self.trim_next_text = true;
        } else if self.rest().starts_with(RIGHT_DELIM) {
            self.pos += RIGHT_DELIM.len();
        } else {
            return Err(TemplateError::syntax(
                "comment ends before closing delimiter",
                start_line,
            ));
        }
        self.state = ScanState::Text;
        Ok(())
    }

    /// ` -}}`: one whitespace byte followed by `-}}`
    fn at_right_trim(&self) -> bool {
        self.peek_byte(0).is_some_and(is_space) && self.src[self.pos + 1..].starts_with("-}}")
    }

    fn lex_inside_action(
        &mut self,
        start_line: usize,
        paren_depth: usize,
    ) -> Result<(), TemplateError> {
        if self.at_right_trim() || self.rest().starts_with(RIGHT_DELIM) {
            if paren_depth > 0 {
                return Err(TemplateError::syntax("unclosed left paren", self.line));
            }
            if self.at_right_trim() {
                if self.peek_byte(0) == Some(b'\n') {
                    self.line += 1;
                }
                self.pos += 1 + 1 + RIGHT_DELIM.len();
                self.trim_next_text = true;
            } else {
                self.pos += RIGHT_DELIM.len();
            }
            self.emit(ItemKind::RightDelim, self.line);
            self.state = ScanState::Text;
            return Ok(());
        }

        let line = self.line;
        let Some(byte) = self.peek_byte(0) else {
            return Err(TemplateError::syntax("unclosed action", start_line));
        };

        let mut depth = paren_depth;
        match byte {
            b if is_space(b) => {
                let len = self
                    .rest()
                    .bytes()
                    .take_while(|b| is_space(*b))
                    .count();
                // Stop before a right trim marker so it is still seen as one
                let len = if self.src[self.pos + len..].starts_with("-}}") {
                    len - 1
                } else {
                    len
                };
                if len == 0 {
                    // Single space immediately before "-}}" is handled above
                    return Err(TemplateError::syntax("unclosed action", start_line));
                }
                self.line += count_newlines(&self.src[self.pos..self.pos + len]);
                self.pos += len;
                self.emit(ItemKind::Space, line);
            }
            b'.' => {
                if self.peek_byte(1).is_some_and(|b| b.is_ascii_digit()) {
                    self.lex_number()?;
                } else if self.peek_byte(1).is_some_and(is_ident_byte) {
                    self.pos += 1;
                    let name = self.take_ident();
                    self.emit(ItemKind::Field(name), line);
                } else {
                    self.pos += 1;
                    self.emit(ItemKind::Dot, line);
                }
            }
            b'$' => {
                self.pos += 1;
                let name = format!("${}", self.take_ident());
                self.emit(ItemKind::Variable(name), line);
            }
            b'"' => self.lex_quote()?,
            b'`' => self.lex_raw_quote()?,
            b'\'' => self.lex_char()?,
            b'0'..=b'9' => self.lex_number()?,
            b'+' | b'-'
                if self
                    .peek_byte(1)
                    .is_some_and(|b| b.is_ascii_digit() || b == b'.') =>
            {
                self.lex_number()?
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let ident = self.take_ident();
                let kind = match ident.as_str() {
                    "true" => ItemKind::Bool(true),
                    "false" => ItemKind::Bool(false),
                    "nil" => ItemKind::Nil,
                    other => match Keyword::from_ident(other) {
                        Some(keyword) => ItemKind::Keyword(keyword),
                        None => ItemKind::Identifier(ident),
                    },
                };
                self.emit(kind, line);
            }
            b'(' => {
                self.pos += 1;
                depth += 1;
                self.emit(ItemKind::LeftParen, line);
            }
            b')' => {
                if depth == 0 {
                    return Err(TemplateError::syntax("unexpected right paren", line));
                }
                self.pos += 1;
                depth -= 1;
                self.emit(ItemKind::RightParen, line);
            }
            b'|' => {
                self.pos += 1;
                self.emit(ItemKind::Pipe, line);
            }
            b':' => {
                if self.peek_byte(1) != Some(b'=') {
                    return Err(TemplateError::syntax("expected :=", line));
                }
                self.pos += 2;
                self.emit(ItemKind::Declare, line);
            }
            b'=' => {
                self.pos += 1;
                self.emit(ItemKind::Assign, line);
            }
            b',' => {
                self.pos += 1;
                self.emit(ItemKind::Comma, line);
            }
            _ => {
                let c = self.rest().chars().next().unwrap_or('\u{FFFD}');
                return Err(TemplateError::syntax(
                    format!("unrecognized character in action: {:?}", c),
                    line,
                ));
            }
        }

        self.state = ScanState::Action {
            start_line,
            paren_depth: depth,
        };
        Ok(())
    }

    fn take_ident(&mut self) -> String {
        let len = self.rest().bytes().take_while(|b| is_ident_byte(*b)).count();
        let ident = self.src[self.pos..self.pos + len].to_string();
        self.pos += len;
        ident
    }

    fn lex_number(&mut self) -> Result<(), TemplateError> {
        let line = self.line;
        let bytes = self.src.as_bytes();
        let start = self.pos;
        let mut end = start;
        if matches!(bytes.get(end), Some(b'+') | Some(b'-')) {
            end += 1;
        }
        let mut prev = 0u8;
        while let Some(&b) = bytes.get(end) {
            let exponent_sign = (b == b'+' || b == b'-') && matches!(prev, b'e' | b'E' | b'p' | b'P');
            if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || exponent_sign {
                prev = b;
                end += 1;
            } else {
                break;
            }
        }
        let text = &self.src[start..end];
        if !looks_numeric(text) {
            return Err(TemplateError::syntax(
                format!("bad number syntax: {:?}", text),
                line,
            ));
        }
        self.pos = end;
        self.emit(ItemKind::Number(text.to_string()), line);
        Ok(())
    }

    fn lex_quote(&mut self) -> Result<(), TemplateError> {
        let line = self.line;
        let body_start = self.pos + 1;
        let bytes = self.src.as_bytes();
        let mut i = body_start;
        loop {
            match bytes.get(i) {
                None | Some(b'\n') => {
                    return Err(TemplateError::syntax("unterminated quoted string", line))
                }
                Some(b'\\') => i += 2,
                Some(b'"') => break,
                Some(_) => i += 1,
            }
        }
        let decoded = unquote(&self.src[body_start..i], line)?;
        self.pos = i + 1;
        self.emit(ItemKind::Str(decoded), line);
        Ok(())
    }

    fn lex_raw_quote(&mut self) -> Result<(), TemplateError> {
        let line = self.line;
        let body_start = self.pos + 1;
        let close = self.src[body_start..]
            .find('`')
            .ok_or_else(|| TemplateError::syntax("unterminated raw quoted string", line))?;
        let body = &self.src[body_start..body_start + close];
        self.line += count_newlines(body);
        self.pos = body_start + close + 1;
        self.emit(ItemKind::Str(body.to_string()), line);
        Ok(())
    }

    fn lex_char(&mut self) -> Result<(), TemplateError> {
        let line = self.line;
        let body_start = self.pos + 1;
        let bytes = self.src.as_bytes();
        let mut i = body_start;
        loop {
            match bytes.get(i) {
                None | Some(b'\n') => {
                    return Err(TemplateError::syntax("unterminated character constant", line))
                }
                Some(b'\\') => i += 2,
                Some(b'\'') => break,
                Some(_) => i += 1,
            }
        }
        let decoded = unquote(&self.src[body_start..i], line)?;
        let mut chars = decoded.chars();
        let c = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => {
                return Err(TemplateError::syntax(
                    format!("malformed character constant: '{}'", &self.src[body_start..i]),
                    line,
                ))
            }
        };
        self.pos = i + 1;
        self.emit(ItemKind::Char(c), line);
        Ok(())
    }
}

/// Cheap shape check; the parser does the real conversion
fn looks_numeric(text: &str) -> bool {
    let unsigned = text.trim_start_matches(|c| c == '+' || c == '-');
    let Some(first) = unsigned.bytes().next() else {
        return false;
    };
    if !(first.is_ascii_digit() || first == b'.') {
        return false;
    }
    let lower = unsigned.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        return !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit() || b == b'_');
    }
    if let Some(oct) = lower.strip_prefix("0o") {
        return !oct.is_empty() && oct.bytes().all(|b| (b'0'..=b'7').contains(&b) || b == b'_');
    }
    if let Some(bin) = lower.strip_prefix("0b") {
        return !bin.is_empty() && bin.bytes().all(|b| b == b'0' || b == b'1' || b == b'_');
    }
    lower.replace('_', "").parse::<f64>().is_ok()
}

/// Decode backslash escapes of a quoted literal body
fn unquote(body: &str, line: usize) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = chars
            .next()
            .ok_or_else(|| TemplateError::syntax("unterminated escape sequence", line))?;
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0C}'),
            'v' => out.push('\u{0B}'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            'x' => out.push(hex_escape(&mut chars, 2, line)?),
            'u' => out.push(hex_escape(&mut chars, 4, line)?),
            'U' => out.push(hex_escape(&mut chars, 8, line)?),
            other => {
                return Err(TemplateError::syntax(
                    format!("unknown escape sequence: \\{}", other),
                    line,
                ))
            }
        }
    }
    Ok(out)
}

fn hex_escape(
    chars: &mut std::str::Chars<'_>,
    digits: usize,
    line: usize,
) -> Result<char, TemplateError> {
    let hex: String = chars.by_ref().take(digits).collect();
    if hex.len() != digits {
        return Err(TemplateError::syntax("short hex escape sequence", line));
    }
    u32::from_str_radix(&hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| TemplateError::syntax(format!("invalid escape value \\{}", hex), line))
}
