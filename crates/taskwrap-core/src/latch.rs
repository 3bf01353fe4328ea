//! Single-use termination guard.

use std::sync::atomic::{AtomicBool, Ordering};

/// A latch that lets exactly one caller through.
///
/// Shared between the completion path and every signal path. Tripping is an
/// atomic compare-and-set, so concurrent callers race safely and all but the
/// first observe the latch already tripped.
#[derive(Debug, Default)]
pub struct TerminationLatch {
    tripped: AtomicBool,
}

impl TerminationLatch {
    /// Create an untripped latch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the latch. Returns true only for the caller that tripped it.
    pub fn try_trip(&self) -> bool {
        self.tripped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Returns true once any caller has tripped the latch.
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }
}
