//! Tree-walking execution of a compiled template

use std::collections::HashMap;

use serde_json::Value;

use super::ast::{BranchNode, Command, Node, NodeList, Operand, Pipeline, TemplateCall};
use super::escape::escape_chain;
use super::funcs;
use super::helpers::{is_true, kind_name};
use super::parser::Tree;
use crate::config::consts::limits::MAX_CALL_DEPTH;
use crate::config::MissingKeyPolicy;
use crate::template::error::TemplateError;

/// Run a parsed (and, in escaped mode, annotated) tree against `data`
pub(crate) fn execute(
    tree: &Tree,
    data: &Value,
    policy: MissingKeyPolicy,
) -> Result<String, TemplateError> {
    let mut executor = Executor {
        defines: &tree.defines,
        policy,
        vars: vec![("$".to_string(), data.clone())],
        depth: 0,
    };
    let mut out = String::new();
    executor.walk_list(&tree.root, data, &mut out)?;
    Ok(out)
}

/// How control leaves a node list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

struct Executor<'t> {
    defines: &'t HashMap<String, NodeList>,
    policy: MissingKeyPolicy,
    /// Variable stack, innermost last
    vars: Vec<(String, Value)>,
    /// Open blocks, parenthesized pipelines and template calls
    depth: usize,
}

impl<'t> Executor<'t> {
    fn descend(&mut self, line: usize) -> Result<(), TemplateError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(TemplateError::DepthExceeded {
                limit: MAX_CALL_DEPTH,
                line,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn walk_list(&mut self, list: &NodeList, dot: &Value, out: &mut String) -> Result<Flow, TemplateError> {
        let mark = self.vars.len();
        let mut flow = Flow::Normal;
        for node in list {
            flow = self.walk(node, dot, out)?;
            if flow != Flow::Normal {
                break;
            }
        }
        self.vars.truncate(mark);
        Ok(flow)
    }

    fn walk(&mut self, node: &Node, dot: &Value, out: &mut String) -> Result<Flow, TemplateError> {
        match node {
            Node::Text { text, .. } => out.push_str(text),
            Node::Action(action) => {
                let value = self.eval_pipeline(dot, &action.pipe)?;
                if action.pipe.decl.is_empty() {
                    out.push_str(&escape_chain(&action.escapers, &value));
                }
            }
            Node::If(branch) | Node::With(branch) | Node::Range(branch) => {
                self.descend(branch.line)?;
                let flow = match node {
                    Node::Range(_) => self.walk_range(branch, dot, out),
                    Node::With(_) => self.walk_if_or_with(branch, dot, out, true),
                    _ => self.walk_if_or_with(branch, dot, out, false),
                };
                self.depth -= 1;
                return flow;
            }
            Node::Template(call) => {
                self.descend(call.line)?;
                let result = self.walk_template(call, dot, out);
                self.depth -= 1;
                result?;
            }
            Node::Break { .. } => return Ok(Flow::Break),
            Node::Continue { .. } => return Ok(Flow::Continue),
        }
        Ok(Flow::Normal)
    }

    fn walk_if_or_with(
        &mut self,
        branch: &BranchNode,
        dot: &Value,
        out: &mut String,
        rebind_dot: bool,
    ) -> Result<Flow, TemplateError> {
        let mark = self.vars.len();
        let value = self.eval_pipeline(dot, &branch.pipe)?;
        let flow = if is_true(&value) {
            let inner = if rebind_dot { &value } else { dot };
            self.walk_list(&branch.list, inner, out)?
        } else if let Some(else_list) = &branch.else_list {
            self.walk_list(else_list, dot, out)?
        } else {
            Flow::Normal
        };
        self.vars.truncate(mark);
        Ok(flow)
    }

    /// Index/element pairs a range visits
    fn range_items(&self, value: Value, line: usize) -> Result<Vec<(Value, Value)>, TemplateError> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => Ok(items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (Value::from(i), item))
                .collect()),
            Value::Object(map) => {
                let mut entries: Vec<(String, Value)> = map.into_iter().collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                Ok(entries
                    .into_iter()
                    .map(|(key, item)| (Value::String(key), item))
                    .collect())
            }
            Value::Number(n) => match n.as_u64() {
                Some(count) => Ok((0..count).map(|i| (Value::from(i), Value::from(i))).collect()),
                None => Err(TemplateError::NotIterable {
                    kind: "negative or fractional number",
                    line,
                }),
            },
            other => Err(TemplateError::NotIterable {
                kind: kind_name(&other),
                line,
            }),
        }
    }

    fn walk_range(&mut self, branch: &BranchNode, dot: &Value, out: &mut String) -> Result<Flow, TemplateError> {
        let mark = self.vars.len();
        let value = self.eval_pipeline_raw(dot, &branch.pipe)?;
        let items = self.range_items(value, branch.line)?;

        if items.is_empty() {
            let flow = match &branch.else_list {
                Some(else_list) => self.walk_list(else_list, dot, out)?,
                None => Flow::Normal,
            };
            self.vars.truncate(mark);
            return Ok(flow);
        }

        let decl = &branch.pipe.decl;
        for (index, elem) in items {
            self.vars.truncate(mark);
            let bindings = match decl.len() {
                0 => Vec::new(),
                1 => vec![(decl[0].clone(), elem.clone())],
                _ => vec![(decl[0].clone(), index), (decl[1].clone(), elem.clone())],
            };
            for (name, value) in bindings {
                if branch.pipe.is_assign {
                    self.assign(&name, value);
                } else {
                    self.vars.push((name, value));
                }
            }
            if self.walk_list(&branch.list, &elem, out)? == Flow::Break {
                break;
            }
        }
        self.vars.truncate(mark);
        Ok(Flow::Normal)
    }

    fn walk_template(&mut self, call: &TemplateCall, dot: &Value, out: &mut String) -> Result<(), TemplateError> {
        let body = self
            .defines
            .get(&call.name)
            .ok_or_else(|| TemplateError::UndefinedTemplate {
                name: call.name.clone(),
                line: call.line,
            })?;
        let new_dot = match &call.pipe {
            Some(pipe) => self.eval_pipeline(dot, pipe)?,
            None => Value::Null,
        };

        // A template body sees only `$`, bound to its own dot
        let outer = std::mem::replace(&mut self.vars, vec![("$".to_string(), new_dot.clone())]);
        let result = self.walk_list(body, &new_dot, out);
        self.vars = outer;
        result.map(|_| ())
    }

    fn lookup_var(&self, name: &str, line: usize) -> Result<&Value, TemplateError> {
        self.vars
            .iter()
            .rev()
            .find(|(var, _)| var == name)
            .map(|(_, value)| value)
            .ok_or_else(|| TemplateError::UndefinedVariable {
                name: name.to_string(),
                line,
            })
    }

    fn assign(&mut self, name: &str, value: Value) {
        if let Some(slot) = self.vars.iter_mut().rev().find(|(var, _)| var == name) {
            slot.1 = value;
        }
    }

    /// Evaluate and bind any declared variables
    fn eval_pipeline(&mut self, dot: &Value, pipe: &Pipeline) -> Result<Value, TemplateError> {
        let value = self.eval_pipeline_raw(dot, pipe)?;
        for name in &pipe.decl {
            if pipe.is_assign {
                self.assign(name, value.clone());
            } else {
                self.vars.push((name.clone(), value.clone()));
            }
        }
        Ok(value)
    }

    fn eval_pipeline_raw(&mut self, dot: &Value, pipe: &Pipeline) -> Result<Value, TemplateError> {
        let mut last = None;
        for cmd in &pipe.cmds {
            last = Some(self.eval_command(dot, cmd, last)?);
        }
        Ok(last.unwrap_or(Value::Null))
    }

    fn eval_command(&mut self, dot: &Value, cmd: &Command, piped: Option<Value>) -> Result<Value, TemplateError> {
        let Some(first) = cmd.args.first() else {
            return Err(TemplateError::syntax("empty command", cmd.line));
        };
        if let Operand::Function(name) = first {
            return self.eval_function(dot, name, &cmd.args[1..], piped, cmd.line);
        }
        if cmd.args.len() > 1 || piped.is_some() {
            return Err(TemplateError::NotAFunction {
                operand: first.describe(),
                line: cmd.line,
            });
        }
        self.eval_arg(dot, first, cmd.line)
    }

    fn eval_function(
        &mut self,
        dot: &Value,
        name: &str,
        args: &[Operand],
        piped: Option<Value>,
        line: usize,
    ) -> Result<Value, TemplateError> {
        if name == "and" || name == "or" {
            if args.is_empty() && piped.is_none() {
                return Err(TemplateError::WrongArgCount {
                    func: name.to_string(),
                    expected: "at least 1".to_string(),
                    got: 0,
                    line,
                });
            }
            // Stop at the first operand that decides the result
            let stop_when = name == "or";
            let mut last = Value::Null;
            for arg in args {
                last = self.eval_arg(dot, arg, line)?;
                if is_true(&last) == stop_when {
                    return Ok(last);
                }
            }
            if let Some(value) = piped {
                last = value;
            }
            return Ok(last);
        }

        let mut values = Vec::with_capacity(args.len() + 1);
        for arg in args {
            values.push(self.eval_arg(dot, arg, line)?);
        }
        values.extend(piped);
        funcs::call(name, values, self.policy, line)
    }

    fn eval_arg(&mut self, dot: &Value, operand: &Operand, line: usize) -> Result<Value, TemplateError> {
        match operand {
            Operand::Dot => Ok(dot.clone()),
            Operand::Nil => Ok(Value::Null),
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Field(path) => self.eval_fields(dot, path, operand, line),
            Operand::Variable { name, fields } => {
                let base = self.lookup_var(name, line)?.clone();
                self.eval_fields(&base, fields, operand, line)
            }
            Operand::Function(name) => self.eval_function(dot, name, &[], None, line),
            Operand::Chain { base, fields } => {
                let base = self.eval_arg(dot, base, line)?;
                self.eval_fields(&base, fields, operand, line)
            }
            Operand::Pipe(pipe) => {
                self.descend(line)?;
                let value = self.eval_pipeline(dot, pipe);
                self.depth -= 1;
                value
            }
        }
    }

    /// Follow a field chain, applying the missing-key policy at each step
    fn eval_fields(
        &self,
        receiver: &Value,
        fields: &[String],
        operand: &Operand,
        line: usize,
    ) -> Result<Value, TemplateError> {
        let mut current = receiver;
        for field in fields {
            current = match current {
                Value::Object(map) => match map.get(field) {
                    Some(found) => found,
                    None => match self.policy {
                        MissingKeyPolicy::ZeroValue => return Ok(Value::Null),
                        MissingKeyPolicy::ErrorOnMissing => {
                            return Err(TemplateError::MissingKey {
                                key: field.clone(),
                                path: operand.describe(),
                                line,
                            })
                        }
                    },
                },
                Value::Null => match self.policy {
                    MissingKeyPolicy::ZeroValue => return Ok(Value::Null),
                    MissingKeyPolicy::ErrorOnMissing => {
                        return Err(TemplateError::NilReceiver {
                            field: field.clone(),
                            path: operand.describe(),
                            line,
                        })
                    }
                },
                other => {
                    return Err(TemplateError::FieldOnNonMap {
                        field: field.clone(),
                        kind: kind_name(other),
                        line,
                    })
                }
            };
        }
        Ok(current.clone())
    }
}
