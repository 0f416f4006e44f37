//! Caller-side owned handles for strings returned across the boundary
//!
//! A [`ForeignString`] can be read while held and released once. Release
//! consumes the handle, so use after release does not compile; dropping an
//! unreleased handle releases it.

use std::borrow::Cow;
use std::ffi::{c_char, CStr};
use std::fmt;
use std::mem;
use std::ptr::NonNull;
use std::str::Utf8Error;

use thiserror::Error;
use tracing::warn;

use crate::abi::{tmplbridge_release_string, ReleaseStatus};
use crate::transfer::TransferBuffer;

/// Misuse of the boundary's ownership contract
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("transfer buffer has neither output nor error")]
    BothNull,

    #[error("transfer buffer has both output and error")]
    BothSet,

    #[error("string at {0:#x} is not live (never handed out, or already released)")]
    UnknownHandle(usize),
}

/// One string owned by the caller until released
pub struct ForeignString {
    ptr: NonNull<c_char>,
}

impl ForeignString {
    /// Take ownership of a string returned by `tmplbridge_render`.
    ///
    /// Returns `None` for a null pointer.
    ///
    /// # Safety
    /// `ptr` must be null or a live string returned by `tmplbridge_render`
    /// that no other handle owns.
    pub unsafe fn from_raw(ptr: *mut c_char) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr })
    }

    pub fn as_c_str(&self) -> &CStr {
        // SAFETY: the string stays allocated until this handle releases it
        unsafe { CStr::from_ptr(self.ptr.as_ptr()) }
    }

    pub fn to_str(&self) -> Result<&str, Utf8Error> {
        self.as_c_str().to_str()
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        self.as_c_str().to_string_lossy()
    }

    /// Release the string. The handle is consumed either way.
    pub fn release(self) -> Result<(), ContractViolation> {
        let ptr = self.ptr.as_ptr();
        mem::forget(self);
        release_raw(ptr)
    }
}

fn release_raw(ptr: *mut c_char) -> Result<(), ContractViolation> {
    match tmplbridge_release_string(ptr) {
        ReleaseStatus::Released | ReleaseStatus::Null => Ok(()),
        ReleaseStatus::UnknownHandle => Err(ContractViolation::UnknownHandle(ptr as usize)),
    }
}

impl Drop for ForeignString {
    fn drop(&mut self) {
        if let Err(e) = release_raw(self.ptr.as_ptr()) {
            warn!(error = %e, "dropping foreign string failed to release it");
        }
    }
}

impl fmt::Debug for ForeignString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ForeignString")
            .field(&self.to_string_lossy())
            .finish()
    }
}

/// A [`TransferBuffer`] checked and split into its one populated slot
#[derive(Debug)]
pub enum TransferResult {
    Output(ForeignString),
    Error(ForeignString),
}

impl TransferResult {
    /// Take ownership of a buffer returned by `tmplbridge_render`.
    ///
    /// A buffer with both or neither slot set is a contract violation; any
    /// strings it does hold are released before the error is returned.
    ///
    /// # Safety
    /// Both pointers must be null or live strings returned by
    /// `tmplbridge_render` that no other handle owns.
    pub unsafe fn from_raw(buffer: TransferBuffer) -> Result<Self, ContractViolation> {
        let checked = buffer.check();
        // SAFETY: forwarded from the caller
        let output = unsafe { ForeignString::from_raw(buffer.output) };
        let error = unsafe { ForeignString::from_raw(buffer.error) };
        checked?;
        match (output, error) {
            (Some(output), None) => Ok(TransferResult::Output(output)),
            (None, Some(error)) => Ok(TransferResult::Error(error)),
            _ => Err(ContractViolation::BothSet),
        }
    }

    pub fn is_output(&self) -> bool {
        matches!(self, TransferResult::Output(_))
    }

    pub fn into_result(self) -> Result<ForeignString, ForeignString> {
        match self {
            TransferResult::Output(s) => Ok(s),
            TransferResult::Error(s) => Err(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::tmplbridge_live_strings;
    use tmplbridge_core::RenderOutcome;

    fn success(text: &str) -> TransferBuffer {
        TransferBuffer::package(RenderOutcome::Success(text.to_string()))
    }

    #[test]
    fn test_output_handle_reads_and_releases() {
        let _guard = tmplbridge_testkit::ledger_guard();
        let baseline = tmplbridge_live_strings();

        let result = unsafe { TransferResult::from_raw(success("héllo")) }.unwrap();
        assert!(result.is_output());
        let output = result.into_result().unwrap();
        assert_eq!(output.to_str(), Ok("héllo"));
        assert_eq!(format!("{output:?}"), "ForeignString(\"héllo\")");

        assert_eq!(output.release(), Ok(()));
        assert_eq!(tmplbridge_live_strings(), baseline);
    }

    #[test]
    fn test_error_handle_released_on_drop() {
        let _guard = tmplbridge_testkit::ledger_guard();
        let baseline = tmplbridge_live_strings();

        let buffer = TransferBuffer::package(RenderOutcome::Failure("bad".to_string()));
        let result = unsafe { TransferResult::from_raw(buffer) }.unwrap();
        let error = result.into_result().unwrap_err();
        assert_eq!(error.to_string_lossy(), "bad");
        assert_eq!(tmplbridge_live_strings(), baseline + 1);
        drop(error);
        assert_eq!(tmplbridge_live_strings(), baseline);
    }

    #[test]
    fn test_both_set_is_violation_and_releases() {
        let _guard = tmplbridge_testkit::ledger_guard();
        let baseline = tmplbridge_live_strings();

        let first = success("a");
        let second = success("b");
        let both = TransferBuffer {
            output: first.output,
            error: second.output,
        };
        let err = unsafe { TransferResult::from_raw(both) }.unwrap_err();
        assert_eq!(err, ContractViolation::BothSet);
        assert_eq!(tmplbridge_live_strings(), baseline);
    }

    #[test]
    fn test_both_null_is_violation() {
        let neither = TransferBuffer {
            output: std::ptr::null_mut(),
            error: std::ptr::null_mut(),
        };
        let err = unsafe { TransferResult::from_raw(neither) }.unwrap_err();
        assert_eq!(err, ContractViolation::BothNull);
    }

    #[test]
    fn test_release_of_foreign_pointer_is_unknown() {
        let _guard = tmplbridge_testkit::ledger_guard();
        let mut bytes = *b"x\0";
        let ptr: *mut c_char = bytes.as_mut_ptr().cast();
        let handle = unsafe { ForeignString::from_raw(ptr) }.unwrap();
        assert_eq!(
            handle.release(),
            Err(ContractViolation::UnknownHandle(ptr as usize))
        );
    }
}
