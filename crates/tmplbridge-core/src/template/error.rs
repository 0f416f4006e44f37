//! Template error types

use std::fmt;

/// Which phase of a render produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Compile,
    Execute,
}

/// Template compile and execution errors
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateError {
    /// Malformed template syntax
    MalformedSyntax {
        /// Error message
        message: String,
        /// Line number where the error occurred
        line: usize,
    },

    /// Call to a function that is not a builtin
    UndefinedFunction { name: String, line: usize },

    /// Use of a variable that was never declared
    UndefinedVariable { name: String, line: usize },

    /// Escaped mode could not assign a safe context to an action
    EscapeContext { message: String, line: usize },

    /// Key not found in a mapping under the error-on-missing policy
    MissingKey {
        /// The key that was not found
        key: String,
        /// Full lookup path, e.g. `.user.name`
        path: String,
        line: usize,
    },

    /// Field lookup on a null value under the error-on-missing policy
    NilReceiver {
        field: String,
        path: String,
        line: usize,
    },

    /// Field lookup on a value that is not a mapping
    FieldOnNonMap {
        field: String,
        kind: &'static str,
        line: usize,
    },

    /// Operand of the wrong type for an operation
    TypeMismatch { message: String, line: usize },

    /// Builtin called with the wrong number of arguments
    WrongArgCount {
        func: String,
        expected: String,
        got: usize,
        line: usize,
    },

    /// Array or string index outside its bounds
    IndexOutOfRange { index: i64, len: usize, line: usize },

    /// `range` over a value that cannot be iterated
    NotIterable { kind: &'static str, line: usize },

    /// `{{template}}` naming a template that was never defined
    UndefinedTemplate { name: String, line: usize },

    /// Arguments given to something that is not a function
    NotAFunction { operand: String, line: usize },

    /// Nested blocks, pipelines and `{{template}}` calls exceeded the depth limit
    DepthExceeded { limit: usize, line: usize },
}

impl TemplateError {
    pub fn phase(&self) -> Phase {
        match self {
            TemplateError::MalformedSyntax { .. }
            | TemplateError::UndefinedFunction { .. }
            | TemplateError::UndefinedVariable { .. }
            | TemplateError::EscapeContext { .. } => Phase::Compile,
            _ => Phase::Execute,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            TemplateError::MalformedSyntax { line, .. }
            | TemplateError::UndefinedFunction { line, .. }
            | TemplateError::UndefinedVariable { line, .. }
            | TemplateError::EscapeContext { line, .. }
            | TemplateError::MissingKey { line, .. }
            | TemplateError::NilReceiver { line, .. }
            | TemplateError::FieldOnNonMap { line, .. }
            | TemplateError::TypeMismatch { line, .. }
            | TemplateError::WrongArgCount { line, .. }
            | TemplateError::IndexOutOfRange { line, .. }
            | TemplateError::NotIterable { line, .. }
            | TemplateError::UndefinedTemplate { line, .. }
            | TemplateError::NotAFunction { line, .. }
            | TemplateError::DepthExceeded { line, .. } => *line,
        }
    }

    pub(crate) fn syntax(message: impl Into<String>, line: usize) -> Self {
        TemplateError::MalformedSyntax {
            message: message.into(),
            line,
        }
    }

    pub(crate) fn type_mismatch(message: impl Into<String>, line: usize) -> Self {
        TemplateError::TypeMismatch {
            message: message.into(),
            line,
        }
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::MalformedSyntax { message, line } => {
                write!(f, "line {}: {}", line, message)
            }
            TemplateError::UndefinedFunction { name, line } => {
                write!(f, "line {}: function \"{}\" not defined", line, name)
            }
            TemplateError::UndefinedVariable { name, line } => {
                write!(f, "line {}: undefined variable \"{}\"", line, name)
            }
            TemplateError::EscapeContext { message, line } => {
                write!(f, "line {}: {}", line, message)
            }
            TemplateError::MissingKey { key, path, line } => {
                write!(
                    f,
                    "line {}: map has no entry for key \"{}\" (evaluating {})",
                    line, key, path
                )
            }
            TemplateError::NilReceiver { field, path, line } => {
                write!(
                    f,
                    "line {}: nil value has no field \"{}\" (evaluating {})",
                    line, field, path
                )
            }
            TemplateError::FieldOnNonMap { field, kind, line } => {
                write!(
                    f,
                    "line {}: can't evaluate field {} in type {}",
                    line, field, kind
                )
            }
            TemplateError::TypeMismatch { message, line } => {
                write!(f, "line {}: {}", line, message)
            }
            TemplateError::WrongArgCount {
                func,
                expected,
                got,
                line,
            } => {
                write!(
                    f,
                    "line {}: wrong number of args for {}: want {} got {}",
                    line, func, expected, got
                )
            }
            TemplateError::IndexOutOfRange { index, len, line } => {
                write!(
                    f,
                    "line {}: index out of range: {} (length {})",
                    line, index, len
                )
            }
            TemplateError::NotIterable { kind, line } => {
                write!(f, "line {}: range can't iterate over {}", line, kind)
            }
            TemplateError::UndefinedTemplate { name, line } => {
                write!(f, "line {}: no such template \"{}\"", line, name)
            }
            TemplateError::NotAFunction { operand, line } => {
                write!(
                    f,
                    "line {}: can't give argument to non-function {}",
                    line, operand
                )
            }
            TemplateError::DepthExceeded { limit, line } => {
                write!(
                    f,
                    "line {}: exceeded maximum execution depth ({})",
                    line, limit
                )
            }
        }
    }
}

impl std::error::Error for TemplateError {}
