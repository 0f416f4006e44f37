//! The call-scoped render pipeline and its tagged outcome

use tracing::debug;

use crate::config::{RenderOptions, RenderRequest};
use crate::error::RenderError;
use crate::payload::decode;
use crate::template::TemplateEngine;

/// Result of one render call. Exactly one variant is populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Rendered text (may be empty)
    Success(String),
    /// Failure message naming the phase that failed
    Failure(String),
}

impl RenderOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RenderOutcome::Success(_))
    }

    pub fn output(&self) -> Option<&str> {
        match self {
            RenderOutcome::Success(output) => Some(output),
            RenderOutcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            RenderOutcome::Success(_) => None,
            RenderOutcome::Failure(message) => Some(message),
        }
    }

    pub fn into_result(self) -> Result<String, String> {
        match self {
            RenderOutcome::Success(output) => Ok(output),
            RenderOutcome::Failure(message) => Err(message),
        }
    }
}

impl From<Result<String, RenderError>> for RenderOutcome {
    fn from(result: Result<String, RenderError>) -> Self {
        match result {
            Ok(output) => RenderOutcome::Success(output),
            Err(e) => RenderOutcome::Failure(e.to_string()),
        }
    }
}

/// Decode `payload`, then compile and execute `template_source` against it.
///
/// Nothing is cached between calls.
pub fn render(template_source: &str, payload: &str, options: RenderOptions) -> RenderOutcome {
    try_render(template_source, payload, options).into()
}

pub fn render_request(request: &RenderRequest<'_>) -> RenderOutcome {
    render(request.template_source, request.payload, request.options)
}

fn try_render(
    template_source: &str,
    payload: &str,
    options: RenderOptions,
) -> Result<String, RenderError> {
    let data = decode(payload)?;
    debug!(payload_bytes = payload.len(), "payload decoded");
    TemplateEngine::new(options).render(template_source, &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EscapeMode, MissingKeyPolicy};

    fn options(escape: EscapeMode, missing_key: MissingKeyPolicy) -> RenderOptions {
        RenderOptions::new(escape, missing_key)
    }

    #[test]
    fn test_render_success() {
        let outcome = render(
            "Hello, {{.name}}! You have {{len .items}} items.",
            r#"{"name":"MoYan","items":["book","pen"]}"#,
            options(EscapeMode::Escaped, MissingKeyPolicy::ZeroValue),
        );
        assert_eq!(
            outcome,
            RenderOutcome::Success("Hello, MoYan! You have 2 items.".to_string())
        );
    }

    #[test]
    fn test_empty_output_is_success() {
        let outcome = render("", "{}", RenderOptions::default());
        assert!(outcome.is_success());
        assert_eq!(outcome.output(), Some(""));
        assert_eq!(outcome.error(), None);
    }

    #[test]
    fn test_decode_failure_short_circuits() {
        // The template is broken too; the payload is reported first
        let outcome = render("{{if}}", r#"{"a":"#, RenderOptions::default());
        let message = outcome.error().unwrap();
        assert!(message.starts_with("failed to decode JSON payload:"), "{message}");
    }

    #[test]
    fn test_failure_messages_name_phase() {
        let compile = render("{{if .a}}", "{}", RenderOptions::default());
        assert!(compile
            .error()
            .unwrap()
            .starts_with("failed to compile escaped template:"));

        let execute = render(
            "{{.Missing}}",
            "{}",
            options(EscapeMode::Raw, MissingKeyPolicy::ErrorOnMissing),
        );
        let message = execute.error().unwrap();
        assert!(message.starts_with("failed to execute raw template:"));
        assert!(message.contains("Missing"));
    }

    #[test]
    fn test_render_request() {
        let request = RenderRequest::new(
            "{{.}}",
            r#""<b>""#,
            options(EscapeMode::Raw, MissingKeyPolicy::ZeroValue),
        );
        assert_eq!(render_request(&request).into_result(), Ok("<b>".to_string()));
    }
}
