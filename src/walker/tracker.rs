//! Completion tracker: wait for all outstanding work, including work that
//! other work spawns
//!
//! The counter must be incremented before a unit of work is handed to
//! anyone else, and decremented exactly once when that unit is finished.
//! Going below zero poisons the tracker: the violation is kept, every
//! waiter is released with [`WaitOutcome::Violated`], and later calls keep
//! failing.
//!
//! [`WorkUnit`] packages one increment with its matching decrement so the
//! unit can travel through the task queue and still be accounted for if it
//! is dropped unprocessed.

use crate::error::InvariantViolation;
use crate::walker::cancel::CancelToken;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// How a wait ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Counter reached zero
    Completed,

    /// Cancellation token fired first
    Cancelled,

    /// Counter was driven negative
    Violated(InvariantViolation),
}

#[derive(Debug, Default)]
struct State {
    outstanding: i64,
    violation: Option<InvariantViolation>,
}

/// Counter of outstanding units of work
#[derive(Debug)]
pub struct CompletionTracker {
    state: Mutex<State>,
    changed: Condvar,
    poll_interval: Duration,
}

impl CompletionTracker {
    /// Create an idle tracker
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            changed: Condvar::new(),
            poll_interval,
        }
    }

    /// Adjust the counter by `delta`
    pub fn add(&self, delta: i64) -> Result<(), InvariantViolation> {
        let mut state = self.state.lock();
        if let Some(violation) = &state.violation {
            return Err(violation.clone());
        }

        let next = state.outstanding + delta;
        if next < 0 {
            let violation = InvariantViolation::TrackerUnderflow { counter: next };
            error!(counter = next, "Completion tracker underflow");
            state.violation = Some(violation.clone());
            drop(state);
            self.changed.notify_all();
            return Err(violation);
        }

        state.outstanding = next;
        if next == 0 {
            drop(state);
            self.changed.notify_all();
        }
        Ok(())
    }

    /// Finish one unit of work
    pub fn done(&self) -> Result<(), InvariantViolation> {
        self.add(-1)
    }

    /// Register one unit and return a guard that finishes it
    pub fn register(self: &Arc<Self>) -> Result<WorkUnit, InvariantViolation> {
        self.add(1)?;
        Ok(WorkUnit {
            tracker: Some(Arc::clone(self)),
        })
    }

    /// Block until the counter is zero, `cancel` fires, or the tracker is
    /// poisoned
    ///
    /// Returns immediately if the counter is already zero. A drained counter
    /// wins over a token that fired at the same moment.
    pub fn wait(&self, cancel: &CancelToken) -> WaitOutcome {
        loop {
            let cancelled = cancel.is_cancelled();
            let mut state = self.state.lock();

            if let Some(violation) = &state.violation {
                return WaitOutcome::Violated(violation.clone());
            }
            if state.outstanding == 0 {
                return WaitOutcome::Completed;
            }
            if cancelled || cancel.observed() {
                return WaitOutcome::Cancelled;
            }

            self.changed
                .wait_for(&mut state, cancel.poll_wait(self.poll_interval));
        }
    }

    /// Current counter value
    pub fn outstanding(&self) -> i64 {
        self.state.lock().outstanding
    }

    /// The violation that poisoned this tracker, if any
    pub fn violation(&self) -> Option<InvariantViolation> {
        self.state.lock().violation.clone()
    }
}

/// One registered unit of work
///
/// Finishing is explicit through [`finish`](Self::finish); a unit dropped
/// without finishing (e.g. discarded from the queue on shutdown) is
/// finished on drop.
#[derive(Debug)]
pub struct WorkUnit {
    tracker: Option<Arc<CompletionTracker>>,
}

impl WorkUnit {
    /// Report this unit as done
    pub fn finish(mut self) -> Result<(), InvariantViolation> {
        match self.tracker.take() {
            Some(tracker) => tracker.done(),
            None => Ok(()),
        }
    }
}

impl Drop for WorkUnit {
    fn drop(&mut self) {
        if let Some(tracker) = self.tracker.take() {
            // Violations are kept on the tracker and surface through wait()
            let _ = tracker.done();
        }
    }
}
