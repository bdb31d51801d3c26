//! Cooperative cancellation.
//!
//! A [`CancellationToken`] is a one-way flag shared between the signal
//! handler and the sync loop. The loop polls it before every network call
//! and sleeps on it between mutations, so a pause ends as soon as the flag
//! is raised.

use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::Result;

/// Conventional exit status for a run stopped by SIGINT.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

/// Shared, never-reset cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and wake any sleeper.
    ///
    /// Returns `true` only for the call that actually raised it.
    pub fn cancel(&self) -> bool {
        let first = !self.inner.cancelled.swap(true, Ordering::AcqRel);
        let _guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.wake.notify_all();
        first
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` if the full duration elapsed, `false` if the sleep was
    /// cut short (or never started) because of cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        let mut guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Past the end of Instant's range: only cancellation can end the wait.
        let Some(deadline) = Instant::now().checked_add(duration) else {
            let _guard = self
                .inner
                .wake
                .wait_while(guard, |_| !self.is_cancelled())
                .unwrap_or_else(PoisonError::into_inner);
            return false;
        };

        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            guard = self
                .inner
                .wake
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

/// Route SIGINT/SIGTERM into `token`.
///
/// The first signal asks the run to wind down after the request in flight.
/// A second one exits immediately with [`INTERRUPTED_EXIT_CODE`].
pub fn install_interrupt_handler(token: CancellationToken) -> Result<()> {
    ctrlc::set_handler(move || {
        let is_tty = std::io::stderr().is_terminal();
        if token.cancel() {
            if is_tty {
                eprintln!("\n\nStop requested, finishing the current request...");
                eprintln!("Press Ctrl+C again to abort immediately.");
            } else {
                tracing::warn!("stop requested, finishing the current request");
            }
        } else {
            if is_tty {
                eprintln!("Aborted.");
            }
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    })?;
    Ok(())
}
