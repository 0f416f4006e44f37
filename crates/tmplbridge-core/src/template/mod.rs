//! Template module - action-template rendering engine
//!
//! This module compiles template source into a node tree and executes it
//! against a decoded JSON value.
//!
//! ## Phases
//!
//! - **Compile**: lex, parse, and (escaped mode only) run the contextual
//!   escaping analysis that annotates every output action with its escapers
//! - **Execute**: walk the tree against the data, applying the missing-key
//!   policy at every lookup
//!
//! Nothing is cached: every call compiles its template from scratch.
//!
//! ## Syntax
//!
//! - Output: `{{.name}}`, `{{.user.email}}`, `{{$var.field}}`, `{{.}}`
//! - Pipelines: `{{.title | printf "%q"}}`, `{{len .items}}`
//! - Variables: `{{$x := .count}}`, `{{$x = 2}}`
//! - Control: `{{if}}`, `{{else if}}`, `{{else}}`, `{{range}}`, `{{with}}`, `{{end}}`
//! - Definitions: `{{define "name"}}`, `{{template "name" .}}`, `{{block "name" .}}`
//! - Whitespace trimming: `{{- .x -}}`
//! - Comments: `{{/* ignored */}}`

pub mod engine;
pub mod error;

pub use engine::{render, CompiledTemplate, TemplateEngine};
pub use error::{Phase, TemplateError};
