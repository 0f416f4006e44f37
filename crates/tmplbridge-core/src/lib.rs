// Core modules
pub mod config;
pub mod error;
pub mod outcome;
pub mod payload;
pub mod template;

// Re-export commonly used types
pub use config::{EscapeMode, MissingKeyPolicy, RenderOptions, RenderRequest};
pub use error::{DecodeError, RenderError};
pub use outcome::{render, render_request, RenderOutcome};
pub use payload::{decode, DecodedValue};
