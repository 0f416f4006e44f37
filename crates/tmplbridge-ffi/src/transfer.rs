//! The two-slot representation of a render outcome at the C boundary

use std::ffi::{c_char, CString};
use std::ptr;

use tmplbridge_core::RenderOutcome;
use tracing::debug;

use crate::handle::ContractViolation;
use crate::ledger;

/// Render result as seen by a C caller.
///
/// Exactly one of `output` and `error` is non-null. Each non-null pointer
/// must be passed to `tmplbridge_release_string` exactly once.
#[repr(C)]
#[derive(Debug)]
pub struct TransferBuffer {
    pub output: *mut c_char,
    pub error: *mut c_char,
}

impl TransferBuffer {
    /// Flatten an outcome, allocating only the populated slot
    pub fn package(outcome: RenderOutcome) -> Self {
        let buffer = match outcome {
            RenderOutcome::Success(output) => match CString::new(output) {
                Ok(output) => Self {
                    output: ledger::hand_out(output),
                    error: ptr::null_mut(),
                },
                Err(e) => Self::failure(&format!(
                    "rendered output contains a NUL byte at offset {}",
                    e.nul_position()
                )),
            },
            RenderOutcome::Failure(message) => Self::failure(&message),
        };
        debug_assert!(buffer.check().is_ok());
        debug!(success = buffer.is_success(), "outcome packaged");
        buffer
    }

    pub(crate) fn failure(message: &str) -> Self {
        let message = CString::new(message.replace('\0', "\u{FFFD}")).unwrap_or_default();
        Self {
            output: ptr::null_mut(),
            error: ledger::hand_out(message),
        }
    }

    /// Check the one-slot-populated invariant
    pub fn check(&self) -> Result<(), ContractViolation> {
        match (self.output.is_null(), self.error.is_null()) {
            (true, true) => Err(ContractViolation::BothNull),
            (false, false) => Err(ContractViolation::BothSet),
            _ => Ok(()),
        }
    }

    pub fn is_success(&self) -> bool {
        !self.output.is_null() && self.error.is_null()
    }
}
