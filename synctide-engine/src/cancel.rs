//! Cooperative cancellation shared between the interrupt handler and the
//! subprocess executor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Cancellation state set by the operator interrupt handler and observed by
/// the run loop.
///
/// The executor registers the active child's pid so the handler can TERM it
/// directly; a child that produces no output would otherwise keep the
/// output reader blocked past the interrupt.
#[derive(Debug, Default)]
pub struct CancelFlag {
    cancelled: AtomicBool,
    active_child: Mutex<Option<u32>>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the operator has requested cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Record the interrupt and terminate the active child, if any.
    pub fn request(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Ok(guard) = self.active_child.lock() {
            if let Some(pid) = *guard {
                signal_term(pid);
            }
        }
    }

    pub(crate) fn register_child(&self, pid: u32) {
        if let Ok(mut guard) = self.active_child.lock() {
            *guard = Some(pid);
        }
    }

    pub(crate) fn clear_child(&self) {
        if let Ok(mut guard) = self.active_child.lock() {
            *guard = None;
        }
    }
}

#[cfg(unix)]
fn signal_term(pid: u32) {
    // SAFETY: kill(2) with SIGTERM touches no memory; delivery to an
    // already-reaped pid fails harmlessly with ESRCH.
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn signal_term(_pid: u32) {
    // No TERM equivalent the child could trap; the executor's kill
    // escalation performs the teardown.
}
