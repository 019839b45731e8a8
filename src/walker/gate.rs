//! Concurrency gate: admission control for expansions
//!
//! A counting semaphore with a fixed capacity. Slots are handed out as
//! [`GateSlot`] guards that release on drop, so a slot cannot leak on an
//! early return or a caught panic.
//!
//! The gate also records the peak number of slots ever issued at once,
//! which is what tests use to check the capacity bound.

use crate::error::InvariantViolation;
use crate::walker::cancel::{CancelToken, Cancelled};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::error;

/// Fixed-capacity admission gate
#[derive(Debug)]
pub struct ConcurrencyGate {
    capacity: usize,
    issued: Mutex<usize>,
    freed: Condvar,
    peak: AtomicUsize,
    poll_interval: Duration,
}

impl ConcurrencyGate {
    /// Create a gate with `capacity` slots
    ///
    /// `poll_interval` bounds how long a blocked `acquire` goes without
    /// re-checking the cancellation token.
    pub fn new(capacity: usize, poll_interval: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            issued: Mutex::new(0),
            freed: Condvar::new(),
            peak: AtomicUsize::new(0),
            poll_interval,
        }
    }

    /// Block until a slot is free or `cancel` fires
    pub fn acquire(&self, cancel: &CancelToken) -> Result<GateSlot<'_>, Cancelled> {
        loop {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }

            let mut issued = self.issued.lock();
            if cancel.observed() {
                return Err(Cancelled);
            }
            if *issued < self.capacity {
                return Ok(self.grant(&mut issued));
            }

            self.freed
                .wait_for(&mut issued, cancel.poll_wait(self.poll_interval));
        }
    }

    /// Return one slot
    ///
    /// [`GateSlot`] calls this on drop. Calling it directly without a
    /// matching acquire is a bug and is reported as a violation rather
    /// than clamped.
    pub fn release(&self) -> Result<(), InvariantViolation> {
        let mut issued = self.issued.lock();
        if *issued == 0 {
            return Err(InvariantViolation::GateOverRelease {
                capacity: self.capacity,
            });
        }
        *issued -= 1;
        drop(issued);

        self.freed.notify_one();
        Ok(())
    }

    /// Gate capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held
    pub fn issued(&self) -> usize {
        *self.issued.lock()
    }

    /// Highest number of slots held at the same time
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }

    fn grant(&self, issued: &mut usize) -> GateSlot<'_> {
        *issued += 1;
        self.peak.fetch_max(*issued, Ordering::Relaxed);
        GateSlot { gate: self }
    }
}

/// A held gate slot, released on drop
#[must_use = "dropping the slot releases it immediately"]
#[derive(Debug)]
pub struct GateSlot<'a> {
    gate: &'a ConcurrencyGate,
}

impl Drop for GateSlot<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.gate.release() {
            error!(error = %e, "Gate slot release failed");
        }
    }
}
