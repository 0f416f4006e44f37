//! Template engine implementation

mod ast;
mod escape;
mod exec;
mod funcs;
mod helpers;
mod lexer;
mod parser;

use serde_json::Value;
use tracing::debug;

use crate::config::{EscapeMode, MissingKeyPolicy, RenderOptions};
use crate::error::RenderError;
use crate::template::error::TemplateError;
use parser::Tree;

/// A template compiled for one escape mode
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    tree: Tree,
    mode: EscapeMode,
}

impl CompiledTemplate {
    /// Parse `source` and, in escaped mode, run the escaping analysis
    pub fn compile(source: &str, mode: EscapeMode) -> Result<Self, TemplateError> {
        let tree = parser::parse(source)?;
        let tree = match mode {
            EscapeMode::Escaped => escape::escape_tree(tree)?,
            EscapeMode::Raw => tree,
        };
        Ok(Self { tree, mode })
    }

    pub fn mode(&self) -> EscapeMode {
        self.mode
    }

    /// Execute against decoded data. Output is all-or-nothing.
    pub fn execute(&self, data: &Value, policy: MissingKeyPolicy) -> Result<String, TemplateError> {
        exec::execute(&self.tree, data, policy)
    }
}

/// Template engine bound to one set of render options
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateEngine {
    options: RenderOptions,
}

impl TemplateEngine {
    /// Create a new template engine
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> RenderOptions {
        self.options
    }

    /// Compile then execute `source` against `data`
    pub fn render(&self, source: &str, data: &Value) -> Result<String, RenderError> {
        let mode = self.options.escape;
        let compiled = CompiledTemplate::compile(source, mode)
            .map_err(|e| RenderError::compile(mode, e))?;
        debug!(%mode, "template compiled");

        let output = compiled
            .execute(data, self.options.missing_key)
            .map_err(|e| RenderError::execute(mode, e))?;
        debug!(bytes = output.len(), "template executed");
        Ok(output)
    }
}

/// Convenience function to render a template
pub fn render(source: &str, data: &Value, options: RenderOptions) -> Result<String, RenderError> {
    TemplateEngine::new(options).render(source, data)
}

#[cfg(test)]
mod tests;
