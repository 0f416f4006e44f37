//! Exported C functions

use std::any::Any;
use std::ffi::{c_char, CStr};
use std::panic::{self, AssertUnwindSafe};

use tmplbridge_core::{render, RenderOptions, RenderOutcome};
use tracing::{debug, error, warn};

use crate::ledger;
use crate::logging;
use crate::transfer::TransferBuffer;

/// Version of the exported C ABI
pub const TMPLBRIDGE_ABI_VERSION: u32 = 1;

/// Result of `tmplbridge_release_string`
#[repr(C)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReleaseStatus {
    Released = 0,
    /// Null pointer; nothing to do
    Null = 1,
    /// Not a live string from this library; nothing was freed
    UnknownHandle = 2,
}

/// Return the C ABI version supported by this library.
#[no_mangle]
pub extern "C" fn tmplbridge_abi_version() -> u32 {
    TMPLBRIDGE_ABI_VERSION
}

/// Read one NUL-terminated UTF-8 input
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
unsafe fn read_input<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, String> {
    if ptr.is_null() {
        return Err(format!("{} pointer is null", what));
    }
    // SAFETY: non-null and NUL-terminated per the caller's contract
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|e| format!("{} is not valid UTF-8: {}", what, e))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

/// Render a template against a JSON payload.
///
/// Exactly one field of the returned buffer is non-null. Pass each non-null
/// pointer to `tmplbridge_release_string` exactly once, after reading it.
///
/// # Safety
/// `template` and `payload` must each be null or a valid NUL-terminated
/// string that stays alive for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn tmplbridge_render(
    template: *const c_char,
    payload: *const c_char,
    escape_html: bool,
    missing_key_zero: bool,
) -> TransferBuffer {
    // SAFETY: forwarded from the caller
    let inputs = unsafe { (read_input(template, "template"), read_input(payload, "payload")) };
    let (template, payload) = match inputs {
        (Ok(template), Ok(payload)) => (template, payload),
        (Err(message), _) | (_, Err(message)) => {
            debug!(%message, "rejected boundary input");
            return TransferBuffer::package(RenderOutcome::Failure(message));
        }
    };

    let options = RenderOptions::from_flags(escape_html, missing_key_zero);
    debug!(
        escape = %options.escape,
        missing_key = ?options.missing_key,
        template_bytes = template.len(),
        "render requested"
    );

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| render(template, payload, options)))
        .unwrap_or_else(|cause| {
            let message = panic_message(cause.as_ref()).to_string();
            error!(%message, "render panicked");
            RenderOutcome::Failure(format!("render panicked: {}", message))
        });
    TransferBuffer::package(outcome)
}

/// Release a string returned by `tmplbridge_render`.
///
/// Null is a no-op. A pointer that was never returned is refused and nothing
/// is freed. A second release of the same pointer is refused while the string
/// is held in the release quarantine; after that it is refused only if the
/// address has not been reused, so callers must still release exactly once.
/// The pointer must not be read after this call.
#[no_mangle]
pub extern "C" fn tmplbridge_release_string(ptr: *mut c_char) -> ReleaseStatus {
    if ptr.is_null() {
        return ReleaseStatus::Null;
    }
    match ledger::release(ptr) {
        Some(bytes) => {
            debug!(bytes, "string released");
            ReleaseStatus::Released
        }
        None => {
            warn!(ptr = ptr as usize, "release of a string that is not live");
            ReleaseStatus::UnknownHandle
        }
    }
}

/// Number of strings handed out and not yet released
#[no_mangle]
pub extern "C" fn tmplbridge_live_strings() -> usize {
    ledger::live_count()
}

/// Install the fmt subscriber filtered by `TMPLBRIDGE_LOG`.
///
/// Returns false when a global subscriber was already installed.
#[no_mangle]
pub extern "C" fn tmplbridge_init_logging() -> bool {
    logging::init_logging()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::ptr;

    fn call(template: &str, payload: &str, escape: bool, zero: bool) -> (Option<String>, Option<String>) {
        let template = CString::new(template).unwrap();
        let payload = CString::new(payload).unwrap();
        let buffer = unsafe { tmplbridge_render(template.as_ptr(), payload.as_ptr(), escape, zero) };
        let read = |ptr: *mut c_char| {
            if ptr.is_null() {
                return None;
            }
            let text = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
            assert_eq!(tmplbridge_release_string(ptr), ReleaseStatus::Released);
            Some(text)
        };
        (read(buffer.output), read(buffer.error))
    }

    #[test]
    fn test_abi_version() {
        assert_eq!(tmplbridge_abi_version(), 1);
    }

    #[test]
    fn test_render_success_and_failure() {
        let _guard = tmplbridge_testkit::ledger_guard();
        let (output, error) = call("{{.a}}", r#"{"a":"<b>"}"#, true, false);
        assert_eq!(output.as_deref(), Some("&lt;b&gt;"));
        assert!(error.is_none());

        let (output, error) = call("{{.a}}", r#"{"a":"#, true, false);
        assert!(output.is_none());
        assert!(error.unwrap().starts_with("failed to decode JSON payload"));
    }

    #[test]
    fn test_null_inputs_are_failures() {
        let _guard = tmplbridge_testkit::ledger_guard();
        let payload = CString::new("{}").unwrap();
        let buffer = unsafe { tmplbridge_render(ptr::null(), payload.as_ptr(), true, true) };
        assert!(buffer.output.is_null());
        let message = unsafe { CStr::from_ptr(buffer.error) }.to_str().unwrap().to_string();
        assert_eq!(message, "template pointer is null");
        assert_eq!(tmplbridge_release_string(buffer.error), ReleaseStatus::Released);
    }

    #[test]
    fn test_invalid_utf8_input_is_failure() {
        let _guard = tmplbridge_testkit::ledger_guard();
        let template = CString::new("{{.}}").unwrap();
        let payload = CString::new(vec![b'"', 0xff, b'"']).unwrap();
        let buffer = unsafe { tmplbridge_render(template.as_ptr(), payload.as_ptr(), false, false) };
        let message = unsafe { CStr::from_ptr(buffer.error) }.to_str().unwrap().to_string();
        assert!(message.starts_with("payload is not valid UTF-8"));
        assert_eq!(tmplbridge_release_string(buffer.error), ReleaseStatus::Released);
    }

    #[test]
    fn test_release_null_and_twice() {
        let _guard = tmplbridge_testkit::ledger_guard();
        assert_eq!(tmplbridge_release_string(ptr::null_mut()), ReleaseStatus::Null);

        let template = CString::new("x").unwrap();
        let payload = CString::new("null").unwrap();
        let buffer = unsafe { tmplbridge_render(template.as_ptr(), payload.as_ptr(), true, false) };
        assert_eq!(tmplbridge_release_string(buffer.output), ReleaseStatus::Released);
        assert_eq!(
            tmplbridge_release_string(buffer.output),
            ReleaseStatus::UnknownHandle
        );
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(3);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
