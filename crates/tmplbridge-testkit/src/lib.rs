//! Test utilities for tmplbridge
//!
//! This crate provides shared testing utilities used across the tmplbridge workspace.

pub mod fixtures;
pub mod random;

use std::sync::{Mutex, MutexGuard};

pub use random::{CallGenerator, GeneratedCall};

/// Static mutex to serialize tests that observe the process-wide string ledger
///
/// The live-string count is global to the process, so tests asserting on it
/// must not interleave with other boundary calls in the same test binary.
pub static LEDGER_LOCK: Mutex<()> = Mutex::new(());

/// Acquire [`LEDGER_LOCK`], recovering from poison
///
/// A panicking test leaves the lock poisoned; the guarded data is `()`, so
/// there is nothing to repair and later tests proceed normally.
pub fn ledger_guard() -> MutexGuard<'static, ()> {
    LEDGER_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
