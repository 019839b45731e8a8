//! Cooperative cancellation for a walk
//!
//! A [`CancelToken`] is a one-way flag shared by the driver, the workers and
//! the expander. It can be set explicitly (Ctrl-C, a caller giving up) or
//! implicitly when an armed deadline passes. Once set it stays set.
//!
//! Blocking primitives in this crate never hold their own lock while calling
//! [`CancelToken::is_cancelled`]; inside a lock they use
//! [`CancelToken::observed`], which only reads.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Why a token fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// `cancel()` was called (signal handler, caller)
    Requested,

    /// The wall-clock budget for the run elapsed
    DeadlineElapsed,

    /// The engine stopped itself after an invariant violation
    Aborted,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Requested => write!(f, "cancellation requested"),
            CancelReason::DeadlineElapsed => write!(f, "deadline elapsed"),
            CancelReason::Aborted => write!(f, "aborted"),
        }
    }
}

/// Returned by blocking operations that gave up because the token fired
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation cancelled")]
pub struct Cancelled;

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    reason: OnceLock<CancelReason>,
    deadline: OnceLock<Instant>,

    /// Only used to wake `sleep()` callers
    lock: Mutex<()>,
    wake: Condvar,
}

/// Shared, clonable cancellation signal
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// Create a token with no deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a token that fires `budget` from now
    pub fn with_timeout(budget: Duration) -> Self {
        let token = Self::new();
        token.set_deadline_in(budget);
        token
    }

    /// Arm a deadline `budget` from now
    ///
    /// Returns false if a deadline was already armed; the first one wins.
    pub fn set_deadline_in(&self, budget: Duration) -> bool {
        let at = Instant::now() + budget;
        self.inner.deadline.set(at).is_ok()
    }

    /// The armed deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline.get().copied()
    }

    /// Time left before the deadline (zero once passed, None if unarmed)
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline()
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancel_with(CancelReason::Requested);
    }

    /// Cancel with an explicit reason
    ///
    /// Returns true only for the call that actually flipped the token; later
    /// calls keep the original reason.
    pub fn cancel_with(&self, reason: CancelReason) -> bool {
        let first = self.inner.reason.set(reason).is_ok();
        self.inner.cancelled.store(true, Ordering::Release);

        let _guard = self.inner.lock.lock();
        self.inner.wake.notify_all();

        first
    }

    /// Check the token, latching it if the deadline has passed
    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return true;
        }

        if self.deadline_passed() {
            self.cancel_with(CancelReason::DeadlineElapsed);
            return true;
        }

        false
    }

    /// Lock-free read of the token state
    ///
    /// Same answer as [`is_cancelled`](Self::is_cancelled) but never latches
    /// the deadline, so it is safe to call while holding another lock.
    pub fn observed(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire) || self.deadline_passed()
    }

    /// Reason the token fired, if it has
    pub fn reason(&self) -> Option<CancelReason> {
        if self.is_cancelled() {
            self.inner.reason.get().copied()
        } else {
            None
        }
    }

    /// Sleep for `duration` or until the token fires
    ///
    /// Returns true if woken by cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        let until = Instant::now() + duration;
        let mut guard = self.inner.lock.lock();

        loop {
            if self.inner.cancelled.load(Ordering::Acquire) {
                return true;
            }
            if self.deadline_passed() {
                drop(guard);
                self.cancel_with(CancelReason::DeadlineElapsed);
                return true;
            }

            let now = Instant::now();
            if now >= until {
                return false;
            }

            let wake_at = match self.deadline() {
                Some(deadline) => until.min(deadline),
                None => until,
            };
            self.inner.wake.wait_until(&mut guard, wake_at);
        }
    }

    /// How long a blocked caller should wait before re-checking the token
    ///
    /// Never longer than `poll`, and never past the deadline.
    pub fn poll_wait(&self, poll: Duration) -> Duration {
        match self.remaining() {
            Some(left) => poll.min(left).max(Duration::from_micros(100)),
            None => poll,
        }
    }

    fn deadline_passed(&self) -> bool {
        self.inner
            .deadline
            .get()
            .is_some_and(|at| Instant::now() >= *at)
    }
}
