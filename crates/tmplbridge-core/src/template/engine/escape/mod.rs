//! Contextual autoescaping
//!
//! Walks a parsed template tracking the HTML context through literal text,
//! and gives every output action the escaper chain its context needs.
//! Templates invoked with `{{template}}` are specialised per calling
//! context, so the same definition can be used from text and from an
//! attribute value.

mod context;
mod escapers;

use std::collections::{HashMap, HashSet};

use tracing::trace;

use super::ast::{ActionNode, BranchNode, Node, NodeList, TemplateCall};
use super::parser::Tree;
use crate::config::consts::limits::MAX_CALL_DEPTH;
use crate::template::error::TemplateError;
use context::{join, transition_text, Context, Delim, JsCtx, State, UrlPart};

pub(crate) use escapers::{escape_chain, html_escape, Escaper};

/// Annotate a parse tree for escaped-mode execution.
///
/// The returned tree holds only the definitions reachable from the entry
/// body, each keyed by its context-specialised name.
pub(crate) fn escape_tree(tree: Tree) -> Result<Tree, TemplateError> {
    let Tree { mut root, defines } = tree;
    let mut analyzer = Analyzer {
        source: defines,
        derived: HashMap::new(),
        output: HashMap::new(),
        in_progress: HashSet::new(),
        recursive: HashSet::new(),
        ranges: Vec::new(),
        last_line: 1,
        depth: 0,
    };

    let end = analyzer.escape_list(Context::default(), &mut root)?;
    if end.state != State::Text {
        return Err(TemplateError::EscapeContext {
            message: format!("template ends in a non-text context: {}", end.describe()),
            line: analyzer.last_line,
        });
    }
    Ok(Tree {
        root,
        defines: analyzer.derived,
    })
}

/// Contexts reaching `{{break}}` and `{{continue}}` in one range body
#[derive(Debug, Default)]
struct RangeExits {
    breaks: Vec<Context>,
    continues: Vec<Context>,
}

struct Analyzer {
    /// Definitions as parsed
    source: HashMap<String, NodeList>,
    /// Escaped copies, keyed by specialised name
    derived: HashMap<String, NodeList>,
    /// Output context of each specialised definition
    output: HashMap<String, Context>,
    in_progress: HashSet<String>,
    /// Specialised definitions reached again while being analysed
    recursive: HashSet<String>,
    ranges: Vec<RangeExits>,
    last_line: usize,
    /// Open blocks and template calls being analysed
    depth: usize,
}

fn dead() -> Context {
    Context {
        state: State::Dead,
        ..Context::default()
    }
}

impl Analyzer {
    fn descend(&mut self, line: usize) -> Result<(), TemplateError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(TemplateError::EscapeContext {
                message: format!("template nesting exceeds depth limit ({})", MAX_CALL_DEPTH),
                line,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn escape_list(&mut self, mut c: Context, list: &mut NodeList) -> Result<Context, TemplateError> {
        for node in list.iter_mut() {
            if c.state == State::Dead {
                break;
            }
            c = self.escape_node(c, node)?;
        }
        Ok(c)
    }

    fn escape_node(&mut self, c: Context, node: &mut Node) -> Result<Context, TemplateError> {
        match node {
            Node::Text { line, text } => {
                self.last_line = *line;
                let (next, rewritten) = transition_text(c, text, *line)?;
                *text = rewritten;
                Ok(next)
            }
            Node::Action(action) => {
                self.last_line = action.line;
                self.escape_action(c, action)
            }
            Node::If(branch) => {
                self.descend(branch.line)?;
                let end = self.escape_branch(c, branch, "if");
                self.depth -= 1;
                end
            }
            Node::With(branch) => {
                self.descend(branch.line)?;
                let end = self.escape_branch(c, branch, "with");
                self.depth -= 1;
                end
            }
            Node::Range(branch) => {
                self.descend(branch.line)?;
                let end = self.escape_range(c, branch);
                self.depth -= 1;
                end
            }
            Node::Template(call) => {
                self.last_line = call.line;
                self.descend(call.line)?;
                let end = self.escape_call(c, call);
                self.depth -= 1;
                end
            }
            Node::Break { .. } => {
                if let Some(exits) = self.ranges.last_mut() {
                    exits.breaks.push(c);
                }
                Ok(dead())
            }
            Node::Continue { .. } => {
                if let Some(exits) = self.ranges.last_mut() {
                    exits.continues.push(c);
                }
                Ok(dead())
            }
        }
    }

    fn escape_action(&mut self, c: Context, action: &mut ActionNode) -> Result<Context, TemplateError> {
        // Declarations print nothing
        if !action.pipe.decl.is_empty() {
            return Ok(c);
        }

        let mut c = c.nudge();
        let mut chain = Vec::with_capacity(3);
        match c.state {
            State::Url => match c.url_part {
                UrlPart::None => {
                    chain.push(Escaper::UrlFilter);
                    chain.push(Escaper::UrlNormalizer);
                }
                UrlPart::PreQuery => chain.push(Escaper::UrlNormalizer),
                UrlPart::QueryOrFrag => chain.push(Escaper::UrlEscaper),
                UrlPart::Unknown => {
                    return Err(TemplateError::EscapeContext {
                        message: "action appears in an ambiguous context within a URL"
                            .to_string(),
                        line: action.line,
                    })
                }
            },
            State::Js => {
                chain.push(Escaper::JsVal);
                c.js_ctx = JsCtx::DivOp;
            }
            State::JsDqStr | State::JsSqStr => chain.push(Escaper::JsStr),
            State::JsBqStr => chain.push(Escaper::JsTmplStr),
            State::JsRegexp => chain.push(Escaper::JsRegexp),
            State::Css => chain.push(Escaper::CssValueFilter),
            State::CssDqStr | State::CssSqStr => chain.push(Escaper::CssEscaper),
            State::Text | State::Rcdata => chain.push(Escaper::Html),
            State::Attr | State::Dead => {}
            State::Tag | State::AttrName | State::AfterName | State::BeforeValue => {
                c.state = State::AttrName;
                chain.push(Escaper::HtmlNameFilter);
            }
            State::HtmlCmt | State::JsLineCmt | State::JsBlockCmt => chain.push(Escaper::Elide),
        }
        match c.delim {
            Delim::None => {}
            Delim::SpaceOrTagEnd => chain.push(Escaper::HtmlNospace),
            Delim::DoubleQuote | Delim::SingleQuote => chain.push(Escaper::Attr),
        }
        trace!(line = action.line, ?chain, "escaper chain assigned");
        action.escapers = chain;

        if c.state == State::Url && c.url_part == UrlPart::None {
            c.url_part = UrlPart::PreQuery;
        }
        Ok(c)
    }

    fn escape_branch(
        &mut self,
        c: Context,
        branch: &mut BranchNode,
        keyword: &str,
    ) -> Result<Context, TemplateError> {
        let then_end = self.escape_list(c, &mut branch.list)?;
        let else_end = match branch.else_list.as_mut() {
            Some(list) => self.escape_list(c, list)?,
            None => c,
        };
        join(then_end, else_end).ok_or_else(|| TemplateError::EscapeContext {
            message: format!(
                "{{{{{}}}}} branches end in different contexts: {}, {}",
                keyword,
                then_end.describe(),
                else_end.describe()
            ),
            line: branch.line,
        })
    }

    /// Escape a range body from `start`, returning the context at loop
    /// re-entry and the break contexts
    fn escape_range_body(
        &mut self,
        start: Context,
        list: &mut NodeList,
        line: usize,
    ) -> Result<(Context, Vec<Context>), TemplateError> {
        self.ranges.push(RangeExits::default());
        let end = self.escape_list(start, list);
        let exits = self.ranges.pop().unwrap_or_default();
        let mut reentry = join(start, end?);
        for continued in exits.continues {
            reentry = reentry.and_then(|r| join(r, continued));
        }
        let reentry = reentry.ok_or_else(|| TemplateError::EscapeContext {
            message: "on range loop re-entry: {{range}} branches end in different contexts"
                .to_string(),
            line,
        })?;
        Ok((reentry, exits.breaks))
    }

    fn escape_range(&mut self, c: Context, branch: &mut BranchNode) -> Result<Context, TemplateError> {
        let (mut reentry, mut breaks) = self.escape_range_body(c, &mut branch.list, branch.line)?;
        if reentry != c {
            // Later iterations start from the joined context
            let start = reentry;
            let (again, again_breaks) =
                self.escape_range_body(start, &mut branch.list, branch.line)?;
            if join(start, again) != Some(start) {
                return Err(TemplateError::EscapeContext {
                    message: format!(
                        "on range loop re-entry: {{{{range}}}} body starts in {} and ends in {}",
                        start.describe(),
                        again.describe()
                    ),
                    line: branch.line,
                });
            }
            reentry = again;
            breaks = again_breaks;
        }

        let mut loop_end = Some(reentry);
        for exit in breaks {
            loop_end = loop_end.and_then(|end| join(end, exit));
        }
        let else_end = match branch.else_list.as_mut() {
            Some(list) => self.escape_list(c, list)?,
            None => c,
        };
        loop_end
            .and_then(|end| join(end, else_end))
            .ok_or_else(|| TemplateError::EscapeContext {
                message: "{{range}} branches end in different contexts".to_string(),
                line: branch.line,
            })
    }

    fn escape_call(&mut self, c: Context, call: &mut TemplateCall) -> Result<Context, TemplateError> {
        // A range body is escaped twice, so the name may already carry a context
        let name = match call.name.split_once("$ctx_") {
            Some((base, _)) => base.to_string(),
            None => call.name.clone(),
        };
        let specialised = c.mangle(&name);
        call.name = specialised.clone();

        if let Some(out) = self.output.get(&specialised) {
            if self.in_progress.contains(&specialised) {
                self.recursive.insert(specialised.clone());
            }
            return Ok(*out);
        }

        let mut body = self
            .source
            .get(&name)
            .cloned()
            .ok_or_else(|| TemplateError::EscapeContext {
                message: format!("no such template {:?}", name),
                line: call.line,
            })?;

        // Assume the body ends where it starts until analysed
        self.output.insert(specialised.clone(), c);
        self.in_progress.insert(specialised.clone());
        let outer_ranges = std::mem::take(&mut self.ranges);
        let end = self.escape_list(c, &mut body);
        self.ranges = outer_ranges;
        self.in_progress.remove(&specialised);
        let end = end?;

        if self.recursive.contains(&specialised) && end != c {
            return Err(TemplateError::EscapeContext {
                message: format!("cannot compute output context for template {:?}", name),
                line: call.line,
            });
        }
        self.output.insert(specialised.clone(), end);
        self.derived.insert(specialised, body);
        Ok(end)
    }
}
