//! Recursive-descent parser from lexed items to a parse tree

use std::collections::HashMap;

use serde_json::{Number, Value};

use super::ast::{
    ActionNode, BranchNode, Command, Node, NodeList, Operand, Pipeline, TemplateCall,
};
use super::funcs::is_builtin;
use super::lexer::{lex, Item, ItemKind, Keyword};
use crate::config::consts::limits::MAX_NESTING_DEPTH;
use crate::template::error::TemplateError;

/// A parsed template: the entry body plus every named definition
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Tree {
    pub root: NodeList,
    pub defines: HashMap<String, NodeList>,
}

pub(crate) fn parse(source: &str) -> Result<Tree, TemplateError> {
    let items = lex(source)?;
    let mut parser = Parser {
        items,
        pos: 0,
        vars: vec!["$".to_string()],
        range_depth: 0,
        depth: 0,
        defines: HashMap::new(),
    };
    let (root, end) = parser.parse_list(true)?;
    match end {
        ListEnd::Eof => Ok(Tree {
            root,
            defines: parser.defines,
        }),
        ListEnd::End { line } => Err(TemplateError::syntax("unexpected {{end}}", line)),
        ListEnd::Else { line } => Err(TemplateError::syntax("unexpected {{else}}", line)),
    }
}

/// Why a node list stopped
#[derive(Debug, Clone, Copy)]
enum ListEnd {
    Eof,
    /// `{{end}}`, fully consumed
    End { line: usize },
    /// `{{else`, consumed up to and including the keyword
    Else { line: usize },
}

/// Which token closes the pipeline being parsed
#[derive(Debug, Clone, Copy, PartialEq)]
enum PipeEnd {
    Delim,
    Paren,
}

impl PipeEnd {
    fn matches(self, kind: &ItemKind) -> bool {
        match self {
            PipeEnd::Delim => *kind == ItemKind::RightDelim,
            PipeEnd::Paren => *kind == ItemKind::RightParen,
        }
    }
}

struct Parser {
    items: Vec<Item>,
    pos: usize,
    /// Variables in scope, innermost last
    vars: Vec<String>,
    range_depth: usize,
    /// Open blocks and parentheses
    depth: usize,
    defines: HashMap<String, NodeList>,
}

fn describe(kind: &ItemKind) -> String {
    match kind {
        ItemKind::Text(_) => "text".to_string(),
        ItemKind::LeftDelim => "\"{{\"".to_string(),
        ItemKind::RightDelim => "\"}}\"".to_string(),
        ItemKind::Space => "space".to_string(),
        ItemKind::Field(name) => format!("field .{}", name),
        ItemKind::Variable(name) => format!("variable {}", name),
        ItemKind::Identifier(name) => format!("identifier {}", name),
        ItemKind::Keyword(k) => format!("<{}>", k.as_str()),
        ItemKind::Str(s) => format!("string {:?}", s),
        ItemKind::Char(c) => format!("character {:?}", c),
        ItemKind::Number(n) => format!("number {}", n),
        ItemKind::Bool(b) => format!("bool {}", b),
        ItemKind::Nil => "nil".to_string(),
        ItemKind::Dot => "\".\"".to_string(),
        ItemKind::LeftParen => "\"(\"".to_string(),
        ItemKind::RightParen => "\")\"".to_string(),
        ItemKind::Pipe => "\"|\"".to_string(),
        ItemKind::Declare => "\":=\"".to_string(),
        ItemKind::Assign => "\"=\"".to_string(),
        ItemKind::Comma => "\",\"".to_string(),
    }
}

/// A body that is nothing but whitespace text counts as empty
fn is_empty_list(list: &NodeList) -> bool {
    list.iter().all(|node| match node {
        Node::Text { text, .. } => text.trim().is_empty(),
        _ => false,
    })
}

impl Parser {
    fn peek(&self) -> Option<&Item> {
        self.items.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&ItemKind> {
        self.peek().map(|item| &item.kind)
    }

    fn next(&mut self) -> Option<Item> {
        let item = self.items.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    /// Line of the current item, or of the last one at end of input
    fn line(&self) -> usize {
        self.peek()
            .or_else(|| self.items.last())
            .map(|item| item.line)
            .unwrap_or(1)
    }

    fn skip_space(&mut self) {
        while self.peek_kind() == Some(&ItemKind::Space) {
            self.pos += 1;
        }
    }

    fn next_non_space(&mut self) -> Option<Item> {
        self.skip_space();
        self.next()
    }

    fn unexpected(&self, item: Option<&Item>, context: &str) -> TemplateError {
        match item {
            Some(item) => TemplateError::syntax(
                format!("unexpected {} in {}", describe(&item.kind), context),
                item.line,
            ),
            None => TemplateError::syntax(format!("unexpected EOF in {}", context), self.line()),
        }
    }

    fn expect_close(&mut self, context: &str) -> Result<(), TemplateError> {
        let item = self.next_non_space();
        match item {
            Some(Item {
                kind: ItemKind::RightDelim,
                ..
            }) => Ok(()),
            other => Err(self.unexpected(other.as_ref(), context)),
        }
    }

    fn parse_list(&mut self, top_level: bool) -> Result<(NodeList, ListEnd), TemplateError> {
        let scope = self.vars.len();
        let mut list = Vec::new();
        let end = loop {
            let Some(item) = self.next() else {
                if top_level {
                    break ListEnd::Eof;
                }
                return Err(TemplateError::syntax("unexpected EOF", self.line()));
            };
            match item.kind {
                ItemKind::Text(text) => list.push(Node::Text {
                    line: item.line,
                    text,
                }),
                ItemKind::LeftDelim => {
                    if let Some(end) = self.parse_action_start(top_level, &mut list)? {
                        break end;
                    }
                }
                other => {
                    return Err(TemplateError::syntax(
                        format!("unexpected {}", describe(&other)),
                        item.line,
                    ))
                }
            }
        };
        self.vars.truncate(scope);
        Ok((list, end))
    }

    /// Dispatch on the first item after `{{`
    fn parse_action_start(
        &mut self,
        top_level: bool,
        list: &mut NodeList,
    ) -> Result<Option<ListEnd>, TemplateError> {
        self.skip_space();
        let line = self.line();
        let keyword = match self.peek_kind() {
            Some(ItemKind::Keyword(keyword)) => Some(*keyword),
            _ => None,
        };
        let Some(keyword) = keyword else {
            let pipe = self.parse_pipeline("command", PipeEnd::Delim)?;
            list.push(Node::Action(ActionNode {
                line,
                pipe,
                escapers: Vec::new(),
            }));
            return Ok(None);
        };
        self.pos += 1;

        match keyword {
            Keyword::End => {
                self.expect_close("end")?;
                return Ok(Some(ListEnd::End { line }));
            }
            Keyword::Else => return Ok(Some(ListEnd::Else { line })),
            Keyword::If => list.push(Node::If(self.parse_branch("if", line)?)),
            Keyword::With => list.push(Node::With(self.parse_branch("with", line)?)),
            Keyword::Range => list.push(Node::Range(self.parse_branch("range", line)?)),
            Keyword::Define => {
                if !top_level {
                    return Err(TemplateError::syntax(
                        "unexpected <define> inside control structure",
                        line,
                    ));
                }
                self.parse_define(line)?;
            }
            Keyword::Template => list.push(Node::Template(self.parse_template(line)?)),
            Keyword::Block => list.push(Node::Template(self.parse_block(line)?)),
            Keyword::Break | Keyword::Continue => {
                if self.range_depth == 0 {
                    return Err(TemplateError::syntax(
                        format!("{{{{{}}}}} outside {{{{range}}}}", keyword.as_str()),
                        line,
                    ));
                }
                self.expect_close(keyword.as_str())?;
                list.push(if keyword == Keyword::Break {
                    Node::Break { line }
                } else {
                    Node::Continue { line }
                });
            }
        }
        Ok(None)
    }

    /// Enter a block or parenthesis, refusing to nest without bound
    fn descend(&mut self, line: usize) -> Result<(), TemplateError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(TemplateError::syntax(
                format!("max nesting depth ({}) exceeded", MAX_NESTING_DEPTH),
                line,
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_branch(&mut self, context: &str, line: usize) -> Result<BranchNode, TemplateError> {
        self.descend(line)?;
        let branch = self.parse_branch_body(context, line);
        self.depth -= 1;
        branch
    }

    fn parse_branch_body(&mut self, context: &str, line: usize) -> Result<BranchNode, TemplateError> {
        let scope = self.vars.len();
        let pipe = self.parse_pipeline(context, PipeEnd::Delim)?;

        if context == "range" {
            self.range_depth += 1;
        }
        let body = self.parse_list(false);
        if context == "range" {
            self.range_depth -= 1;
        }
        let (list, end) = body?;

        let else_list = match end {
            ListEnd::End { .. } => None,
            ListEnd::Eof => return Err(TemplateError::syntax("unexpected EOF", self.line())),
            ListEnd::Else { line: else_line } => {
                self.skip_space();
                let chained = match (context, self.peek_kind()) {
                    ("if", Some(ItemKind::Keyword(Keyword::If))) => true,
                    ("with", Some(ItemKind::Keyword(Keyword::With))) => true,
                    _ => false,
                };
                if chained {
                    // `{{else if ...}}` shares the outer `{{end}}`
                    self.pos += 1;
                    let nested = self.parse_branch(context, else_line)?;
                    let node = if context == "if" {
                        Node::If(nested)
                    } else {
                        Node::With(nested)
                    };
                    Some(vec![node])
                } else {
                    self.expect_close("else")?;
                    let (else_list, end) = self.parse_list(false)?;
                    match end {
                        ListEnd::End { .. } => {}
                        ListEnd::Else { line } => {
                            return Err(TemplateError::syntax("expected end; found {{else}}", line))
                        }
                        ListEnd::Eof => {
                            return Err(TemplateError::syntax("unexpected EOF", self.line()))
                        }
                    }
                    Some(else_list)
                }
            }
        };

        self.vars.truncate(scope);
        Ok(BranchNode {
            line,
            pipe,
            list,
            else_list,
        })
    }

    fn parse_template_name(&mut self, context: &str) -> Result<String, TemplateError> {
        let item = self.next_non_space();
        match item {
            Some(Item {
                kind: ItemKind::Str(name),
                ..
            }) => Ok(name),
            other => Err(self.unexpected(other.as_ref(), &format!("{} clause", context))),
        }
    }

    /// Optional pipeline after a template name, through the closing `}}`
    fn parse_optional_pipe(&mut self, context: &str) -> Result<Option<Pipeline>, TemplateError> {
        self.skip_space();
        if self.peek_kind() == Some(&ItemKind::RightDelim) {
            self.pos += 1;
            return Ok(None);
        }
        self.parse_pipeline(context, PipeEnd::Delim).map(Some)
    }

    fn parse_template(&mut self, line: usize) -> Result<TemplateCall, TemplateError> {
        let name = self.parse_template_name("template")?;
        let pipe = self.parse_optional_pipe("template")?;
        Ok(TemplateCall { line, name, pipe })
    }

    /// Parse a definition body with a fresh scope
    fn parse_body(&mut self) -> Result<NodeList, TemplateError> {
        self.descend(self.line())?;
        let outer_vars = std::mem::replace(&mut self.vars, vec!["$".to_string()]);
        let outer_range = std::mem::replace(&mut self.range_depth, 0);
        let body = self.parse_list(false);
        self.vars = outer_vars;
        self.range_depth = outer_range;
        self.depth -= 1;

        let (list, end) = body?;
        match end {
            ListEnd::End { .. } => Ok(list),
            ListEnd::Else { line } => Err(TemplateError::syntax("unexpected {{else}}", line)),
            ListEnd::Eof => Err(TemplateError::syntax("unexpected EOF", self.line())),
        }
    }

    fn add_define(&mut self, name: String, body: NodeList, line: usize) -> Result<(), TemplateError> {
        match self.defines.get(&name) {
            Some(existing) if !is_empty_list(existing) && !is_empty_list(&body) => {
                Err(TemplateError::syntax(
                    format!("multiple definition of template {:?}", name),
                    line,
                ))
            }
            // An empty body never replaces an existing definition
            Some(_) if is_empty_list(&body) => Ok(()),
            _ => {
                self.defines.insert(name, body);
                Ok(())
            }
        }
    }

    fn parse_define(&mut self, line: usize) -> Result<(), TemplateError> {
        let name = self.parse_template_name("define")?;
        self.expect_close("define clause")?;
        let body = self.parse_body()?;
        self.add_define(name, body, line)
    }

    /// `{{block "name" pipe}}body{{end}}` defines `name` and calls it in place
    fn parse_block(&mut self, line: usize) -> Result<TemplateCall, TemplateError> {
        let name = self.parse_template_name("block")?;
        let pipe = self.parse_optional_pipe("block")?;
        let body = self.parse_body()?;
        self.add_define(name.clone(), body, line)?;
        Ok(TemplateCall { line, name, pipe })
    }

    /// Leading `$x :=`, `$x =` or `$i, $e :=`
    fn parse_declarations(&mut self, context: &str, pipe: &mut Pipeline) -> Result<(), TemplateError> {
        loop {
            self.skip_space();
            let start = self.pos;
            let Some(Item {
                kind: ItemKind::Variable(name),
                line,
            }) = self.peek().cloned()
            else {
                return Ok(());
            };
            self.pos += 1;
            self.skip_space();
            match self.peek_kind() {
                Some(ItemKind::Declare) | Some(ItemKind::Assign) => {
                    let is_assign = self.peek_kind() == Some(&ItemKind::Assign);
                    self.pos += 1;
                    pipe.is_assign = is_assign;
                    if is_assign && !self.vars.contains(&name) {
                        return Err(TemplateError::UndefinedVariable { name, line });
                    }
                    pipe.decl.push(name);
                    break;
                }
                Some(ItemKind::Comma) => {
                    self.pos += 1;
                    pipe.decl.push(name);
                    if context != "range" || pipe.decl.len() >= 2 {
                        return Err(TemplateError::syntax(
                            format!("too many declarations in {}", context),
                            line,
                        ));
                    }
                    self.skip_space();
                    if !matches!(self.peek_kind(), Some(ItemKind::Variable(_))) {
                        return Err(TemplateError::syntax(
                            "range can only initialize variables",
                            line,
                        ));
                    }
                }
                _ => {
                    if !pipe.decl.is_empty() {
                        return Err(TemplateError::syntax(
                            format!("expected := after variables in {}", context),
                            line,
                        ));
                    }
                    // Not a declaration; the variable is an operand
                    self.pos = start;
                    return Ok(());
                }
            }
        }
        if !pipe.is_assign {
            for name in &pipe.decl {
                self.vars.push(name.clone());
            }
        }
        Ok(())
    }

    fn parse_pipeline(&mut self, context: &str, end: PipeEnd) -> Result<Pipeline, TemplateError> {
        let mut pipe = Pipeline {
            line: self.line(),
            is_assign: false,
            decl: Vec::new(),
            cmds: Vec::new(),
        };
        self.parse_declarations(context, &mut pipe)?;

        let mut after_pipe = false;
        loop {
            self.skip_space();
            let Some(item) = self.peek().cloned() else {
                return Err(self.unexpected(None, context));
            };
            if end.matches(&item.kind) {
                self.pos += 1;
                if pipe.cmds.is_empty() || after_pipe {
                    return Err(TemplateError::syntax(
                        format!("missing value for {}", context),
                        item.line,
                    ));
                }
                break;
            }
            let (cmd, piped) = self.parse_command(end)?;
            pipe.cmds.push(cmd);
            after_pipe = piped;
        }

        check_pipeline(&pipe)?;
        Ok(pipe)
    }

    /// One pipeline stage; returns whether it was followed by `|`
    fn parse_command(&mut self, end: PipeEnd) -> Result<(Command, bool), TemplateError> {
        let line = self.line();
        let mut args = Vec::new();
        loop {
            self.skip_space();
            let operand = self.parse_operand()?;
            let Some(operand) = operand else {
                let item = self.peek().cloned();
                return Err(match item {
                    Some(Item {
                        kind: ItemKind::Pipe,
                        line,
                    }) => TemplateError::syntax("missing command before \"|\"", line),
                    other => self.unexpected(other.as_ref(), "operand"),
                });
            };
            args.push(operand);

            match self.peek_kind() {
                Some(ItemKind::Space) => {
                    self.skip_space();
                    match self.peek_kind() {
                        Some(ItemKind::Pipe) => {
                            self.pos += 1;
                            return Ok((Command { line, args }, true));
                        }
                        Some(kind) if end.matches(kind) => {
                            return Ok((Command { line, args }, false))
                        }
                        _ => {}
                    }
                }
                Some(ItemKind::Pipe) => {
                    self.pos += 1;
                    return Ok((Command { line, args }, true));
                }
                Some(kind) if end.matches(kind) => return Ok((Command { line, args }, false)),
                other => {
                    let message = match other {
                        Some(kind) => format!("missing space? unexpected {}", describe(kind)),
                        None => "unexpected EOF".to_string(),
                    };
                    return Err(TemplateError::syntax(message, self.line()));
                }
            }
        }
    }

    fn parse_operand(&mut self) -> Result<Option<Operand>, TemplateError> {
        let Some(item) = self.peek().cloned() else {
            return Ok(None);
        };
        let line = item.line;
        let term = match item.kind {
            ItemKind::Identifier(name) => {
                if !is_builtin(&name) {
                    return Err(TemplateError::UndefinedFunction { name, line });
                }
                Operand::Function(name)
            }
            ItemKind::Dot => Operand::Dot,
            ItemKind::Nil => Operand::Nil,
            ItemKind::Variable(name) => {
                if !self.vars.contains(&name) {
                    return Err(TemplateError::UndefinedVariable { name, line });
                }
                Operand::Variable {
                    name,
                    fields: Vec::new(),
                }
            }
            ItemKind::Field(name) => Operand::Field(vec![name]),
            ItemKind::Bool(b) => Operand::Literal(Value::Bool(b)),
            ItemKind::Str(s) => Operand::Literal(Value::String(s)),
            ItemKind::Char(c) => Operand::Literal(Value::from(u32::from(c))),
            ItemKind::Number(text) => Operand::Literal(parse_number(&text, line)?),
            ItemKind::LeftParen => {
                self.pos += 1;
                self.descend(line)?;
                let pipe = self.parse_pipeline("parenthesized pipeline", PipeEnd::Paren);
                self.depth -= 1;
                let pipe = pipe?;
                return self.parse_chain(Operand::Pipe(Box::new(pipe)), line).map(Some);
            }
            _ => return Ok(None),
        };
        self.pos += 1;
        self.parse_chain(term, line).map(Some)
    }

    /// Trailing `.field` accesses directly after a term
    fn parse_chain(&mut self, term: Operand, line: usize) -> Result<Operand, TemplateError> {
        let mut fields = Vec::new();
        while let Some(ItemKind::Field(name)) = self.peek_kind() {
            fields.push(name.clone());
            self.pos += 1;
        }
        if fields.is_empty() {
            return Ok(term);
        }

        Ok(match term {
            Operand::Field(mut path) => {
                path.extend(fields);
                Operand::Field(path)
            }
            Operand::Variable { name, .. } => Operand::Variable { name, fields },
            Operand::Pipe(_) => Operand::Chain {
                base: Box::new(term),
                fields,
            },
            other => {
                return Err(TemplateError::syntax(
                    format!("unexpected . after term {:?}", other.describe()),
                    line,
                ))
            }
        })
    }
}

/// Reject pipelines that can never execute
fn check_pipeline(pipe: &Pipeline) -> Result<(), TemplateError> {
    for (stage, cmd) in pipe.cmds.iter().enumerate() {
        match cmd.args.first() {
            Some(Operand::Nil) if stage == 0 => {
                return Err(TemplateError::syntax("nil is not a command", cmd.line))
            }
            Some(Operand::Nil) | Some(Operand::Dot) | Some(Operand::Literal(_)) if stage > 0 => {
                return Err(TemplateError::syntax(
                    format!("non executable command in pipeline stage {}", stage + 1),
                    cmd.line,
                ))
            }
            _ => {}
        }
    }
    Ok(())
}

/// Convert a numeric literal, preferring integers
fn parse_number(text: &str, line: usize) -> Result<Value, TemplateError> {
    let bad = || TemplateError::syntax(format!("bad number syntax: {:?}", text), line);
    let cleaned = text.replace('_', "");
    let (negative, unsigned) = match cleaned.as_bytes().first() {
        Some(b'-') => (true, &cleaned[1..]),
        Some(b'+') => (false, &cleaned[1..]),
        _ => (false, cleaned.as_str()),
    };
    let lower = unsigned.to_ascii_lowercase();

    let radix = if lower.starts_with("0x") {
        Some((16, &lower[2..]))
    } else if lower.starts_with("0o") {
        Some((8, &lower[2..]))
    } else if lower.starts_with("0b") {
        Some((2, &lower[2..]))
    } else if lower.len() > 1 && lower.starts_with('0') && lower.bytes().all(|b| b.is_ascii_digit()) {
        Some((8, &lower[1..]))
    } else {
        None
    };

    if let Some((radix, digits)) = radix {
        let magnitude = u64::from_str_radix(digits, radix).map_err(|_| bad())?;
        return signed_integer(negative, magnitude).ok_or_else(bad);
    }

    if let Ok(magnitude) = lower.parse::<u64>() {
        return signed_integer(negative, magnitude).ok_or_else(bad);
    }

    let float: f64 = lower.parse().map_err(|_| bad())?;
    let float = if negative { -float } else { float };
    if float.fract() == 0.0 && float.abs() < 9.007_199_254_740_992e15 {
        // Integral float constants behave as integers
        return Ok(Value::from(float as i64));
    }
    Number::from_f64(float).map(Value::Number).ok_or_else(bad)
}

fn signed_integer(negative: bool, magnitude: u64) -> Option<Value> {
    if !negative {
        return Some(Value::from(magnitude));
    }
    if magnitude <= i64::MAX as u64 {
        Some(Value::from(-(magnitude as i64)))
    } else if magnitude == i64::MAX as u64 + 1 {
        Some(Value::from(i64::MIN))
    } else {
        None
    }
}
