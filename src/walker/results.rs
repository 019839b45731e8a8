//! Shared accumulators for a walk
//!
//! - [`ResultAggregator`]: ids that expanded successfully
//! - [`ErrorCollector`]: per-task expansion failures
//! - [`WalkStats`]: relaxed atomic counters for progress and the summary
//!
//! Each is guarded independently; none of them calls into another
//! component while holding its lock.

use crate::error::TaskError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Append-only list of visited ids
#[derive(Debug, Default)]
pub struct ResultAggregator {
    visited: Mutex<Vec<String>>,
}

impl ResultAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an id
    pub fn record(&self, id: String) {
        self.visited.lock().push(id);
    }

    /// Copy of everything recorded so far
    pub fn snapshot(&self) -> Vec<String> {
        self.visited.lock().clone()
    }

    /// Number of recorded ids
    pub fn len(&self) -> usize {
        self.visited.lock().len()
    }

    /// Check if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-run collection of expansion failures
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Mutex<Vec<TaskError>>,
}

impl ErrorCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure
    pub fn record(&self, error: TaskError) {
        self.errors.lock().push(error);
    }

    /// Copy of all failures so far
    pub fn snapshot(&self) -> Vec<TaskError> {
        self.errors.lock().clone()
    }

    /// Number of failures
    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    /// Check if no failures were recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Counters collected while walking
#[derive(Debug, Default)]
pub struct WalkStats {
    /// Tasks expanded successfully
    pub expanded: AtomicU64,

    /// Tasks whose expansion failed
    pub failed: AtomicU64,

    /// Tasks rejected for exceeding the depth limit
    pub skipped_depth: AtomicU64,

    /// Tasks rejected by an exclude pattern
    pub excluded: AtomicU64,

    /// Tasks discarded because their id was already claimed
    pub duplicates: AtomicU64,

    /// Tasks dropped without expanding because the run was stopping
    pub cancelled: AtomicU64,
}

impl WalkStats {
    pub fn record_expanded(&self) {
        self.expanded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_too_deep(&self) {
        self.skipped_depth.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_excluded(&self) {
        self.excluded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }
}

/// Plain copy of the run's counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub expanded: u64,
    pub failed: u64,
    pub skipped_depth: u64,
    pub excluded: u64,
    pub duplicates: u64,
    pub cancelled: u64,

    /// Tasks sent to the worker pool
    pub dispatched: u64,
    pub backpressure_events: u64,

    /// Most expansions observed in flight at once
    pub peak_concurrency: usize,
}

impl StatsSnapshot {
    /// Read the walk counters; queue and gate figures are filled in by the
    /// caller
    pub fn from_stats(stats: &WalkStats) -> Self {
        Self {
            expanded: stats.expanded.load(Ordering::Relaxed),
            failed: stats.failed.load(Ordering::Relaxed),
            skipped_depth: stats.skipped_depth.load(Ordering::Relaxed),
            excluded: stats.excluded.load(Ordering::Relaxed),
            duplicates: stats.duplicates.load(Ordering::Relaxed),
            cancelled: stats.cancelled.load(Ordering::Relaxed),
            ..Self::default()
        }
    }
}
