//! Process-wide record of strings handed across the boundary
//!
//! Every pointer returned to a caller is recorded here until it is released.
//! Release only frees pointers found in the ledger, so a foreign pointer is
//! refused instead of corrupting the allocator.
//!
//! The ledger only sees addresses, and the allocator is free to hand a freed
//! address to a later string. Released strings therefore sit in a bounded
//! quarantine before they are freed: while a string is quarantined its address
//! cannot belong to a newer string, and releasing it again is refused. Once a
//! string leaves the quarantine a stale release of its address is detected
//! only if the address has not been reused, so detection past that window is
//! best-effort.

use std::collections::{HashSet, VecDeque};
use std::ffi::{c_char, CString};
use std::sync::{Mutex, MutexGuard, OnceLock};

/// Released strings kept allocated before being freed
const QUARANTINE_SLOTS: usize = 256;
/// Bytes the quarantine may hold before freeing its oldest strings
const QUARANTINE_BYTES: usize = 4 * 1024 * 1024;

#[derive(Default)]
struct Ledger {
    live: HashSet<usize>,
    quarantine: VecDeque<CString>,
    quarantined_bytes: usize,
}

impl Ledger {
    fn quarantine(&mut self, s: CString) {
        self.quarantined_bytes += s.as_bytes_with_nul().len();
        self.quarantine.push_back(s);
        // The newest entry always stays, however large
        while self.quarantine.len() > QUARANTINE_SLOTS
            || (self.quarantined_bytes > QUARANTINE_BYTES && self.quarantine.len() > 1)
        {
            match self.quarantine.pop_front() {
                Some(oldest) => self.quarantined_bytes -= oldest.as_bytes_with_nul().len(),
                None => break,
            }
        }
    }
}

static LEDGER: OnceLock<Mutex<Ledger>> = OnceLock::new();

fn ledger() -> MutexGuard<'static, Ledger> {
    LEDGER
        .get_or_init(|| Mutex::new(Ledger::default()))
        .lock()
        .unwrap_or_else(|err| err.into_inner())
}

/// Give up ownership of `s` to the caller, recording the pointer
pub(crate) fn hand_out(s: CString) -> *mut c_char {
    let ptr = s.into_raw();
    ledger().live.insert(ptr as usize);
    ptr
}

/// Take back a pointer previously returned by [`hand_out`].
///
/// Returns the length of the released string, or `None` for pointers that
/// are not live.
pub(crate) fn release(ptr: *mut c_char) -> Option<usize> {
    let mut ledger = ledger();
    if !ledger.live.remove(&(ptr as usize)) {
        return None;
    }
    // SAFETY: the pointer came from `CString::into_raw` in `hand_out` and was
    // live until the removal above, so this is its only reclamation.
    let s = unsafe { CString::from_raw(ptr) };
    let len = s.as_bytes().len();
    ledger.quarantine(s);
    Some(len)
}

pub(crate) fn live_count() -> usize {
    ledger().live.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_once() {
        let _guard = tmplbridge_testkit::ledger_guard();
        let ptr = hand_out(CString::new("xyz").unwrap());
        assert_eq!(release(ptr), Some(3));
        assert_eq!(release(ptr), None);
    }

    #[test]
    fn test_release_unknown_pointer() {
        let _guard = tmplbridge_testkit::ledger_guard();
        let mut local = *b"stack\0";
        assert_eq!(release(local.as_mut_ptr().cast()), None);
    }

    #[test]
    fn test_released_address_not_reused_while_quarantined() {
        let _guard = tmplbridge_testkit::ledger_guard();
        let stale = hand_out(CString::new("first").unwrap());
        assert!(release(stale).is_some());

        // Same size class as the released string
        let fresh: Vec<_> = (0..64)
            .map(|_| hand_out(CString::new("again").unwrap()))
            .collect();
        assert!(fresh.iter().all(|&ptr| ptr != stale));

        assert_eq!(release(stale), None);
        for ptr in fresh {
            assert_eq!(release(ptr), Some(5));
        }
    }

    #[test]
    fn test_quarantine_is_bounded() {
        let mut ledger = Ledger::default();
        for _ in 0..QUARANTINE_SLOTS + 10 {
            ledger.quarantine(CString::new("abc").unwrap());
        }
        assert_eq!(ledger.quarantine.len(), QUARANTINE_SLOTS);
        assert_eq!(ledger.quarantined_bytes, QUARANTINE_SLOTS * 4);

        let big = CString::new(vec![b'a'; QUARANTINE_BYTES + 1]).unwrap();
        ledger.quarantine(big);
        assert_eq!(ledger.quarantine.len(), 1);
        assert_eq!(ledger.quarantined_bytes, QUARANTINE_BYTES + 2);
    }
}
