//! Per-session completion signal.
//!
//! Shared by the session, its position reporter and the end-of-stream hook.
//! `close` is a one-shot gate: whichever teardown path gets there first wins,
//! every later call is a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Wake {
    /// The interval elapsed.
    Tick,
    /// The stream ran out of data; the session still needs tearing down.
    Ended,
    /// The session was torn down.
    Closed,
}

#[derive(Debug, Default)]
pub(crate) struct SessionSignal {
    closed: AtomicBool,
    ended: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

impl SessionSignal {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Close the signal. Returns `true` only for the call that closed it.
    pub(crate) fn close(&self) -> bool {
        let first = self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.notify();
        }
        first
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Record that the stream reached end-of-data. Never blocks for long:
    /// this runs on the audio callback path.
    pub(crate) fn mark_ended(&self) {
        self.ended.store(true, Ordering::Release);
        self.notify();
    }

    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    fn notify(&self) {
        // Taking the lock orders the flag store before a waiter's re-check.
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.wake.notify_all();
    }

    /// Block for up to `timeout`, returning early when closed or ended.
    pub(crate) fn wait(&self, timeout: Duration) -> Wake {
        let guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .wake
            .wait_timeout_while(guard, timeout, |_| !self.is_closed() && !self.is_ended())
            .unwrap_or_else(PoisonError::into_inner);
        drop(guard);

        if self.is_closed() {
            Wake::Closed
        } else if self.is_ended() {
            Wake::Ended
        } else {
            Wake::Tick
        }
    }
}
