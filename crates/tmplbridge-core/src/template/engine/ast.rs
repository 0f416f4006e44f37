//! Parse tree for compiled templates

use serde_json::Value;

use super::escape::Escaper;

/// Sequence of nodes executed in order
pub(crate) type NodeList = Vec<Node>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    /// Literal text copied to the output
    Text { line: usize, text: String },
    /// `{{pipeline}}`
    Action(ActionNode),
    If(BranchNode),
    With(BranchNode),
    Range(BranchNode),
    /// `{{template "name" pipeline}}` (also the call half of `block`)
    Template(TemplateCall),
    Break { line: usize },
    Continue { line: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ActionNode {
    pub line: usize,
    pub pipe: Pipeline,
    /// Escapers applied to the printed value, innermost first
    pub escapers: Vec<Escaper>,
}

/// Shared shape of `if`, `with` and `range`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BranchNode {
    pub line: usize,
    pub pipe: Pipeline,
    pub list: NodeList,
    pub else_list: Option<NodeList>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TemplateCall {
    pub line: usize,
    pub name: String,
    pub pipe: Option<Pipeline>,
}

/// `[$x :=] cmd | cmd | ...`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pipeline {
    pub line: usize,
    /// `=` rather than `:=`
    pub is_assign: bool,
    /// Declared or assigned variable names, with `$`
    pub decl: Vec<String>,
    pub cmds: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Command {
    pub line: usize,
    pub args: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    /// `.`
    Dot,
    /// `.a.b.c`
    Field(Vec<String>),
    /// `$x.a.b`
    Variable { name: String, fields: Vec<String> },
    /// Builtin function name
    Function(String),
    /// `(pipeline).a.b`
    Chain { base: Box<Operand>, fields: Vec<String> },
    /// Parenthesised pipeline
    Pipe(Box<Pipeline>),
    /// String, number, bool or char constant
    Literal(Value),
    Nil,
}

impl Operand {
    /// Source-like rendering for error messages
    pub(crate) fn describe(&self) -> String {
        match self {
            Operand::Dot => ".".to_string(),
            Operand::Field(path) => format!(".{}", path.join(".")),
            Operand::Variable { name, fields } => {
                let mut out = name.clone();
                for field in fields {
                    out.push('.');
                    out.push_str(field);
                }
                out
            }
            Operand::Function(name) => name.clone(),
            Operand::Chain { base, fields } => {
                format!("{}.{}", base.describe(), fields.join("."))
            }
            Operand::Pipe(_) => "(pipeline)".to_string(),
            Operand::Literal(value) => value.to_string(),
            Operand::Nil => "nil".to_string(),
        }
    }
}
