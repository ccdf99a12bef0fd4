//! Single-slot guard preventing two cleanup runs from executing at once.
//!
//! The scheduler and the HTTP trigger are independent callers. A second caller arriving while a
//! run is active is turned away immediately: nothing is queued.
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide "a run is active" flag, owned by one engine instance.
#[derive(Debug, Default)]
pub struct AdmissionGuard {
    active: AtomicBool,
}

impl AdmissionGuard {
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
        }
    }

    /// Mark a run as active. Returns `false` if one already is.
    pub fn try_acquire(&self) -> bool {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Mark the slot idle. Calling it while idle is a no-op.
    pub fn release(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Acquire the slot for the lifetime of the returned permit.
    pub fn enter(&self) -> Option<AdmissionPermit<'_>> {
        self.try_acquire().then_some(AdmissionPermit { guard: self })
    }
}

/// Releases the guard when dropped, on every exit path of a run.
#[derive(Debug)]
pub struct AdmissionPermit<'a> {
    guard: &'a AdmissionGuard,
}

impl Drop for AdmissionPermit<'_> {
    fn drop(&mut self) {
        self.guard.release();
    }
}
