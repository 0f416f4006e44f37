use serde::{Deserialize, Serialize};
use std::fmt;

/// Output-safety mode applied at every interpolation point
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EscapeMode {
    /// Context-aware escaping of interpolated data (HTML, attribute, script, URL, CSS)
    #[default]
    Escaped,
    /// Interpolated values are inserted verbatim
    Raw,
}

impl fmt::Display for EscapeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscapeMode::Escaped => write!(f, "escaped"),
            EscapeMode::Raw => write!(f, "raw"),
        }
    }
}

/// Behavior when a lookup path does not exist in the data
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MissingKeyPolicy {
    /// Substitute the zero value and keep rendering
    ZeroValue,
    /// Abort rendering with an error naming the missing path
    #[default]
    ErrorOnMissing,
}

/// Per-call configuration record
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenderOptions {
    #[serde(default)]
    pub escape: EscapeMode,
    #[serde(default)]
    pub missing_key: MissingKeyPolicy,
}

impl RenderOptions {
    pub fn new(escape: EscapeMode, missing_key: MissingKeyPolicy) -> Self {
        Self {
            escape,
            missing_key,
        }
    }

    /// Map the two boundary booleans onto the option record
    pub fn from_flags(escape_html: bool, missing_key_zero: bool) -> Self {
        Self {
            escape: if escape_html {
                EscapeMode::Escaped
            } else {
                EscapeMode::Raw
            },
            missing_key: if missing_key_zero {
                MissingKeyPolicy::ZeroValue
            } else {
                MissingKeyPolicy::ErrorOnMissing
            },
        }
    }
}

/// One render call's inputs, borrowed for the duration of the call
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub template_source: &'a str,
    pub payload: &'a str,
    pub options: RenderOptions,
}

impl<'a> RenderRequest<'a> {
    pub fn new(template_source: &'a str, payload: &'a str, options: RenderOptions) -> Self {
        Self {
            template_source,
            payload,
            options,
        }
    }
}
