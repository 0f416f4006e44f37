//! Safe caller API over the exported functions

use std::ffi::{CString, NulError};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::abi::tmplbridge_render;
use crate::handle::{ContractViolation, TransferResult};

/// Failure of a [`TemplateRenderer`] call
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("input contains a NUL byte: {0}")]
    InvalidCString(#[from] NulError),

    #[error("failed to serialize template data: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    /// The render itself failed; carries the boundary's error string
    #[error("{0}")]
    Render(String),

    #[error("boundary contract violated: {0}")]
    Contract(#[from] ContractViolation),
}

/// Builder for one render call through the C boundary.
///
/// Escaping is on and missing keys are errors unless changed.
#[derive(Debug)]
pub struct TemplateRenderer<'a, T: Serialize + ?Sized> {
    template: &'a str,
    data: &'a T,
    escape_html: bool,
    missing_key_zero: bool,
}

impl<'a, T: Serialize + ?Sized> TemplateRenderer<'a, T> {
    pub fn new(template: &'a str, data: &'a T) -> Self {
        Self {
            template,
            data,
            escape_html: true,
            missing_key_zero: false,
        }
    }

    pub fn escape_html(mut self, escape_html: bool) -> Self {
        self.escape_html = escape_html;
        self
    }

    pub fn missing_key_zero(mut self, missing_key_zero: bool) -> Self {
        self.missing_key_zero = missing_key_zero;
        self
    }

    /// Serialize the data, render, copy the result out and release it
    pub fn render(&self) -> Result<String, BridgeError> {
        let template = CString::new(self.template)?;
        let payload = CString::new(serde_json::to_string(self.data)?)?;

        // SAFETY: both inputs are valid C strings that outlive the call
        let buffer = unsafe {
            tmplbridge_render(
                template.as_ptr(),
                payload.as_ptr(),
                self.escape_html,
                self.missing_key_zero,
            )
        };
        // SAFETY: the buffer came straight from `tmplbridge_render`
        let result = unsafe { TransferResult::from_raw(buffer) }?;
        debug!(success = result.is_output(), "boundary call returned");

        match result {
            TransferResult::Output(output) => {
                let text = output.to_string_lossy().into_owned();
                output.release()?;
                Ok(text)
            }
            TransferResult::Error(error) => {
                let message = error.to_string_lossy().into_owned();
                error.release()?;
                Err(BridgeError::Render(message))
            }
        }
    }
}
