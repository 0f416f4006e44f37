//! Call configuration: escaping and missing-key policies

pub mod consts;
mod model;

pub use model::{EscapeMode, MissingKeyPolicy, RenderOptions, RenderRequest};
