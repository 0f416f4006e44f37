use crate::config::EscapeMode;
use crate::template::TemplateError;
use thiserror::Error;

/// Payload text is not a single valid JSON value
#[derive(Error, Debug)]
#[error("{0}")]
pub struct DecodeError(#[from] pub serde_json::Error);

/// Every way a render call can fail.
///
/// All variants collapse into one failure string at the boundary, so each
/// message names its phase up front.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to decode JSON payload: {0}")]
    Decode(#[from] DecodeError),

    #[error("failed to compile {mode} template: {source}")]
    Compile {
        mode: EscapeMode,
        source: TemplateError,
    },

    #[error("failed to execute {mode} template: {source}")]
    Execute {
        mode: EscapeMode,
        source: TemplateError,
    },
}

impl RenderError {
    pub(crate) fn compile(mode: EscapeMode, source: TemplateError) -> Self {
        RenderError::Compile { mode, source }
    }

    pub(crate) fn execute(mode: EscapeMode, source: TemplateError) -> Self {
        RenderError::Execute { mode, source }
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;
