//! Admission of discovered tasks
//!
//! Every task, seed or child, passes the same checks in the same order:
//!
//! 1. depth limit (no claim is spent on a task that is too deep)
//! 2. cancellation (nothing new is admitted once the token fires)
//! 3. exclude patterns
//! 4. dedup claim
//!
//! Admitted tasks are not dispatched right away. They are staged for the
//! next depth level, and the coordinator only dispatches that level once
//! the current one has fully drained. A node reachable along paths of
//! different lengths is therefore always claimed at its shortest depth,
//! whatever order the expansions finish in.
//!
//! Dispatch registers the task with the completion tracker before it is
//! sent, so the tracker never reads zero while a task is in transit.

use crate::config::WalkConfig;
use crate::error::Result;
use crate::walker::cancel::CancelToken;
use crate::walker::dedup::DedupStore;
use crate::walker::queue::{QueuedTask, Task, WorkQueueSender};
use crate::walker::results::WalkStats;
use crate::walker::tracker::CompletionTracker;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

/// What happened to a task offered for admission
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    /// Claimed; ready to be staged
    Admitted(Task),

    /// Depth exceeds the configured maximum
    TooDeep,

    /// Matched an exclude pattern
    Excluded,

    /// Already claimed earlier in this run
    Duplicate,

    /// The run is stopping
    Cancelled,
}

/// Gatekeeper between discovery and the task queue
pub struct Scheduler {
    config: Arc<WalkConfig>,
    dedup: DedupStore,
    tracker: Arc<CompletionTracker>,
    cancel: CancelToken,
    stats: Arc<WalkStats>,

    /// Admitted tasks waiting for the next level
    next_level: Mutex<Vec<Task>>,
}

impl Scheduler {
    pub fn new(
        config: Arc<WalkConfig>,
        tracker: Arc<CompletionTracker>,
        cancel: CancelToken,
        stats: Arc<WalkStats>,
    ) -> Self {
        let dedup = DedupStore::new(config.shard_count);
        debug!(shards = dedup.shard_count(), "Dedup store ready");

        Self {
            config,
            dedup,
            tracker,
            cancel,
            stats,
            next_level: Mutex::new(Vec::new()),
        }
    }

    /// Run the admission checks for `task`
    pub fn admit(&self, task: Task) -> Admission {
        if task.depth > self.config.max_depth {
            self.stats.record_too_deep();
            return Admission::TooDeep;
        }

        if self.cancel.is_cancelled() {
            self.stats.record_cancelled();
            return Admission::Cancelled;
        }

        if self.config.is_excluded(&task.id) {
            self.stats.record_excluded();
            return Admission::Excluded;
        }

        if !self.dedup.try_claim(&task.id) {
            self.stats.record_duplicate();
            return Admission::Duplicate;
        }

        Admission::Admitted(task)
    }

    /// Admit `task` and stage it for the next level
    ///
    /// Returns true if it was staged.
    pub fn offer(&self, task: Task) -> bool {
        match self.admit(task) {
            Admission::Admitted(task) => {
                trace!(id = %task.id, depth = task.depth, "Staged");
                self.next_level.lock().push(task);
                true
            }
            _ => false,
        }
    }

    /// Take everything staged so far; these make up the next level
    pub fn take_level(&self) -> Vec<Task> {
        std::mem::take(&mut *self.next_level.lock())
    }

    /// Register `task` with the tracker and send it to the workers
    ///
    /// Waits for queue room while the token has not fired. Returns false if
    /// the run stopped first; the task is then counted as cancelled.
    pub fn dispatch(&self, task: Task, sender: &WorkQueueSender) -> Result<bool> {
        let unit = self.tracker.register()?;
        let sent = sender.send_until_cancelled(
            QueuedTask { task, unit },
            &self.cancel,
            self.config.poll_interval,
        )?;
        if !sent {
            self.stats.record_cancelled();
        }
        Ok(sent)
    }

    /// Check whether `id` has been claimed
    pub fn is_claimed(&self, id: &str) -> bool {
        self.dedup.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::queue::WorkQueue;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn scheduler(config: WalkConfig) -> (Scheduler, Arc<CompletionTracker>, CancelToken) {
        let tracker = Arc::new(CompletionTracker::new(Duration::from_millis(5)));
        let cancel = CancelToken::new();
        let scheduler = Scheduler::new(
            Arc::new(config),
            Arc::clone(&tracker),
            cancel.clone(),
            Arc::new(WalkStats::default()),
        );
        (scheduler, tracker, cancel)
    }

    #[test]
    fn test_admit_claims_without_registering() {
        let (scheduler, tracker, _) = scheduler(WalkConfig::new(2, 1));
        assert_eq!(
            scheduler.admit(Task::root("A")),
            Admission::Admitted(Task::root("A"))
        );
        assert!(scheduler.is_claimed("A"));
        assert_eq!(tracker.outstanding(), 0);
    }

    #[test]
    fn test_too_deep_does_not_claim() {
        let (scheduler, tracker, _) = scheduler(WalkConfig::new(1, 1));
        assert_eq!(scheduler.admit(Task::new("deep", 2)), Admission::TooDeep);
        assert!(!scheduler.is_claimed("deep"));
        assert_eq!(tracker.outstanding(), 0);
        assert_eq!(scheduler.stats.skipped_depth.load(Ordering::Relaxed), 1);

        // Same id at a legal depth is still claimable
        assert!(matches!(
            scheduler.admit(Task::new("deep", 1)),
            Admission::Admitted(_)
        ));
    }

    #[test]
    fn test_duplicate_discarded() {
        let (scheduler, _, _) = scheduler(WalkConfig::new(3, 1));
        assert!(scheduler.offer(Task::root("A")));
        assert!(!scheduler.offer(Task::new("A", 1)));
        assert_eq!(scheduler.admit(Task::new("A", 2)), Admission::Duplicate);
        assert_eq!(scheduler.stats.duplicates.load(Ordering::Relaxed), 2);
        assert_eq!(scheduler.take_level().len(), 1);
    }

    #[test]
    fn test_excluded_not_claimed() {
        let config = WalkConfig::new(3, 1).with_excludes(["^skip"]).unwrap();
        let (scheduler, _, _) = scheduler(config);
        assert_eq!(scheduler.admit(Task::root("skip-me")), Admission::Excluded);
        assert!(!scheduler.is_claimed("skip-me"));
    }

    #[test]
    fn test_cancelled_admits_nothing() {
        let (scheduler, tracker, cancel) = scheduler(WalkConfig::new(3, 1));
        cancel.cancel();
        assert_eq!(scheduler.admit(Task::root("A")), Admission::Cancelled);
        assert!(!scheduler.is_claimed("A"));
        assert_eq!(tracker.outstanding(), 0);
        assert_eq!(scheduler.stats.cancelled.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_offer_stages_until_taken() {
        let (scheduler, tracker, _) = scheduler(WalkConfig::new(3, 1));
        let parent = Task::root("P");
        for id in ["a", "b", "a", "c"] {
            scheduler.offer(parent.child(id));
        }

        let mut level: Vec<_> = scheduler.take_level().into_iter().map(|t| t.id).collect();
        level.sort();
        assert_eq!(level, vec!["a", "b", "c"]);
        assert!(scheduler.take_level().is_empty());
        // Nothing is outstanding until dispatch
        assert_eq!(tracker.outstanding(), 0);
    }

    #[test]
    fn test_dispatch_registers_then_sends() {
        let (scheduler, tracker, _) = scheduler(WalkConfig::new(0, 1));
        let queue = WorkQueue::new(8);
        assert!(scheduler.dispatch(Task::root("S"), &queue.sender()).unwrap());
        assert_eq!(queue.len(), 1);
        assert_eq!(tracker.outstanding(), 1);
    }

    #[test]
    fn test_dispatch_after_cancel_drops_task() {
        let (scheduler, tracker, cancel) = scheduler(WalkConfig::new(0, 1));
        let queue = WorkQueue::new(8);
        cancel.cancel();

        assert!(!scheduler.dispatch(Task::root("S"), &queue.sender()).unwrap());
        assert!(queue.is_empty());
        assert_eq!(tracker.outstanding(), 0);
        assert_eq!(scheduler.stats.cancelled.load(Ordering::Relaxed), 1);
    }
}
