//! Walk coordinator - drives one bounded-concurrency walk
//!
//! The coordinator is responsible for:
//! - Building the per-run state (dedup store, gate, tracker, queue)
//! - Spawning workers and staging the seed
//! - Dispatching one depth level at a time, waiting for each to drain
//!   before the next, until nothing new is staged or the token fires
//! - Progress reporting
//! - Assembling the final, possibly partial, result
//!
//! On completion the workers are joined. On cancellation the coordinator
//! snapshots what has been recorded and returns at once; expansions already
//! running finish on detached workers and their results are not included.

use crate::config::WalkConfig;
use crate::error::{Result, TaskError, WalkerError};
use crate::expand::Expander;
use crate::walker::cancel::{CancelReason, CancelToken};
use crate::walker::queue::{Task, WorkQueue};
use crate::walker::results::{StatsSnapshot, WalkStats};
use crate::walker::tracker::{CompletionTracker, WaitOutcome};
use crate::walker::worker::{aggregate_stats, WalkContext, Worker};
use chrono::{DateTime, Utc};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How often the progress callback fires
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Result of a walk
#[derive(Debug)]
pub struct WalkResult {
    /// Ids expanded successfully, in completion order
    pub visited: Vec<String>,

    /// Per-task expansion failures
    pub errors: Vec<TaskError>,

    /// Whether the walk stopped before all work drained
    pub cancelled: bool,

    /// Why it stopped early
    pub cancel_reason: Option<CancelReason>,

    /// Counters at the time the result was assembled
    pub stats: StatsSnapshot,

    /// Time taken for the walk
    pub duration: Duration,

    /// Wall-clock start of the walk
    pub started_at: DateTime<Utc>,
}

impl WalkResult {
    /// Returns true if every reachable task within the depth limit was
    /// processed
    pub fn is_complete(&self) -> bool {
        !self.cancelled
    }
}

/// Progress information for display
#[derive(Debug, Clone)]
pub struct WalkProgress {
    /// Tasks expanded so far
    pub visited: u64,

    /// Tasks whose expansion failed
    pub failed: u64,

    /// Depth of the level being processed
    pub depth: u32,

    /// Tasks waiting in the shared queue
    pub queued: usize,

    /// Expansions currently holding a gate slot
    pub in_flight: usize,

    /// Gate capacity
    pub capacity: usize,

    /// Elapsed time
    pub elapsed: Duration,
}

impl WalkProgress {
    /// Calculate tasks per second
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.visited + self.failed) as f64 / secs
        } else {
            0.0
        }
    }
}

/// Coordinates one walk
pub struct WalkCoordinator {
    /// Configuration
    config: Arc<WalkConfig>,

    /// Child producer
    expander: Arc<dyn Expander>,

    /// Cancellation for this walk
    cancel: CancelToken,
}

impl WalkCoordinator {
    /// Create a new walk coordinator
    pub fn new<E: Expander>(config: WalkConfig, expander: E) -> Result<Self> {
        Self::with_shared_expander(config, Arc::new(expander))
    }

    /// Create a coordinator around an expander the caller keeps a handle to
    pub fn with_shared_expander(config: WalkConfig, expander: Arc<dyn Expander>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config: Arc::new(config),
            expander,
            cancel: CancelToken::new(),
        })
    }

    /// Get a clone of the cancellation token (for signal handlers)
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Get the validated configuration
    pub fn config(&self) -> &WalkConfig {
        &self.config
    }

    /// Run the walk from `start`
    pub fn run(self, start: impl Into<String>) -> Result<WalkResult> {
        self.execute(start.into(), None)
    }

    /// Run the walk, calling `callback` with a progress snapshot every
    /// 100ms until it ends
    pub fn run_with_progress<F>(self, start: impl Into<String>, mut callback: F) -> Result<WalkResult>
    where
        F: FnMut(&WalkProgress) + Send,
    {
        self.execute(start.into(), Some(&mut callback))
    }

    fn execute(
        self,
        start: String,
        progress: Option<&mut (dyn FnMut(&WalkProgress) + Send)>,
    ) -> Result<WalkResult> {
        if let Some(deadline) = self.config.deadline {
            if !self.cancel.set_deadline_in(deadline) {
                debug!("Deadline already armed, keeping the earlier one");
            }
        }

        info!(
            start = %start,
            max_depth = self.config.max_depth,
            max_concurrency = self.config.max_concurrency,
            workers = self.config.worker_count,
            deadline_ms = self.config.deadline.map(|d| d.as_millis() as u64),
            "Starting walk"
        );

        let tracker = Arc::new(CompletionTracker::new(self.config.poll_interval));
        let ctx = Arc::new(WalkContext::new(
            Arc::clone(&self.config),
            Arc::clone(&self.expander),
            tracker,
            self.cancel.clone(),
        ));

        self.walk(ctx, start, progress)
    }

    /// Drive a prepared context from `start` to a result
    fn walk(
        &self,
        ctx: Arc<WalkContext>,
        start: String,
        progress: Option<&mut (dyn FnMut(&WalkProgress) + Send)>,
    ) -> Result<WalkResult> {
        let start_time = Instant::now();
        let started_at: DateTime<Utc> = Utc::now();
        debug!(started_at = %started_at.to_rfc3339(), "Walk started");

        let queue = WorkQueue::new(self.config.queue_size);
        let workers = self.spawn_workers(&ctx, &queue)?;

        ctx.scheduler.offer(Task::root(start));

        let stop_progress = CancelToken::new();
        let outcome = thread::scope(|s| {
            if let Some(callback) = progress {
                let ctx = &ctx;
                let queue = &queue;
                let stop = &stop_progress;
                s.spawn(move || report_progress(callback, ctx, queue, start_time, stop));
            }

            let outcome = drive_levels(&ctx, &queue);
            stop_progress.cancel();
            outcome
        });

        // Snapshot before releasing workers so a cancelled result is exactly
        // what had been recorded when the wait returned
        let visited = ctx.results.snapshot();
        let errors = ctx.errors.snapshot();
        let mut stats = StatsSnapshot::from_stats(&ctx.stats);
        let queue_stats = queue.stats();
        stats.dispatched = queue_stats.enqueued_count();
        stats.backpressure_events = queue_stats.backpressure_count();
        stats.peak_concurrency = ctx.gate.peak();

        let cancelled = match outcome {
            WaitOutcome::Completed => {
                stop_workers(&ctx, workers, true);
                dropped_work(&ctx.cancel, &ctx.stats)
            }
            WaitOutcome::Cancelled => {
                stop_workers(&ctx, workers, false);
                true
            }
            WaitOutcome::Violated(violation) => {
                ctx.cancel.cancel_with(CancelReason::Aborted);
                stop_workers(&ctx, workers, false);
                return Err(violation.into());
            }
        };

        if let Some(e) = ctx.take_fatal() {
            return Err(e);
        }
        if let Some(violation) = ctx.tracker.violation() {
            return Err(violation.into());
        }

        let cancel_reason = if cancelled { self.cancel.reason() } else { None };
        let duration = start_time.elapsed();

        if cancelled {
            info!(
                visited = visited.len(),
                errors = errors.len(),
                reason = %cancel_reason.map_or_else(|| "unknown".to_string(), |r| r.to_string()),
                duration_ms = duration.as_millis() as u64,
                "Walk stopped early"
            );
        } else {
            info!(
                visited = visited.len(),
                errors = errors.len(),
                peak_concurrency = stats.peak_concurrency,
                duration_ms = duration.as_millis() as u64,
                "Walk completed"
            );
        }

        Ok(WalkResult {
            visited,
            errors,
            cancelled,
            cancel_reason,
            stats,
            duration,
            started_at,
        })
    }

    /// Spawn worker threads
    fn spawn_workers(&self, ctx: &Arc<WalkContext>, queue: &WorkQueue) -> Result<Vec<Worker>> {
        let mut workers = Vec::with_capacity(self.config.worker_count);

        for id in 0..self.config.worker_count {
            match Worker::spawn(id, Arc::clone(ctx), queue.receiver()) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    ctx.cancel.cancel_with(CancelReason::Aborted);
                    stop_workers(ctx, workers, false);
                    return Err(e.into());
                }
            }
        }

        debug!(count = workers.len(), "Workers spawned");
        Ok(workers)
    }
}

/// Dispatch staged levels until one stages nothing new
///
/// Level `d + 1` is only dispatched once every task of level `d` has
/// finished, so the first claim of any id is made at its shortest depth.
fn drive_levels(ctx: &WalkContext, queue: &WorkQueue) -> WaitOutcome {
    let sender = queue.sender();

    loop {
        let level = ctx.scheduler.take_level();
        let depth = match level.first() {
            Some(task) => task.depth,
            None => return WaitOutcome::Completed,
        };

        if ctx.cancel.is_cancelled() {
            for _ in &level {
                ctx.stats.record_cancelled();
            }
            return WaitOutcome::Cancelled;
        }

        ctx.level.store(depth, Ordering::Relaxed);
        debug!(depth = depth, tasks = level.len(), "Dispatching level");

        for task in level {
            if let Err(e) = ctx.scheduler.dispatch(task, &sender) {
                ctx.abort(e);
                break;
            }
        }

        match ctx.tracker.wait(&ctx.cancel) {
            WaitOutcome::Completed => {}
            other => return other,
        }
    }
}

/// Whether a drained walk lost any work to cancellation on the way
fn dropped_work(cancel: &CancelToken, stats: &WalkStats) -> bool {
    cancel.is_cancelled() && stats.cancelled.load(Ordering::Relaxed) > 0
}

/// Signal shutdown, then either join the workers or leave them to exit
fn stop_workers(ctx: &WalkContext, workers: Vec<Worker>, join: bool) {
    ctx.shutdown.store(true, Ordering::Release);

    let processed = aggregate_stats(&workers);
    debug!(processed = processed, join = join, "Stopping workers");

    for worker in workers {
        if join {
            let id = worker.id();
            if let Err(e) = worker.join() {
                warn!(worker = id, error = %e, "Worker failed to join cleanly");
            }
        } else {
            worker.detach();
        }
    }
}

fn report_progress(
    callback: &mut (dyn FnMut(&WalkProgress) + Send),
    ctx: &WalkContext,
    queue: &WorkQueue,
    start_time: Instant,
    stop: &CancelToken,
) {
    loop {
        callback(&WalkProgress {
            visited: ctx.stats.expanded.load(Ordering::Relaxed),
            failed: ctx.stats.failed.load(Ordering::Relaxed),
            depth: ctx.level.load(Ordering::Relaxed),
            queued: queue.len(),
            in_flight: ctx.gate.issued(),
            capacity: ctx.gate.capacity(),
            elapsed: start_time.elapsed(),
        });

        if stop.sleep(PROGRESS_INTERVAL) {
            break;
        }
    }
}

/// Visit everything reachable from `start` within `max_depth`, running at
/// most `max_concurrency` expansions at once
///
/// A `deadline` bounds the whole walk; when it passes the partial result is
/// returned with `cancelled` set.
pub fn run<E: Expander>(
    start: impl Into<String>,
    expander: E,
    max_depth: u32,
    max_concurrency: usize,
    deadline: Option<Duration>,
) -> Result<WalkResult> {
    let mut config = WalkConfig::new(max_depth, max_concurrency);
    config.deadline = deadline;
    WalkCoordinator::new(config, expander)?.run(start)
}
