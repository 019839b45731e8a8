//! Worker thread logic for the parallel walk
//!
//! Each worker:
//! - Pulls admitted tasks of the current level from the shared work queue
//! - Takes a concurrency gate slot, then calls the expander with no lock held
//! - Offers every child to the scheduler for the next level
//! - Records the task, releases its slot, and finishes its work unit
//!
//! Expansion errors and panics are recorded per task and never leave the
//! worker. Only an invariant violation stops a worker early; it aborts the
//! whole run through the cancellation token.

use crate::config::WalkConfig;
use crate::error::{ExpandError, ExpandResult, Result, TaskError, TaskOutcome, WalkerError, WorkerError};
use crate::expand::Expander;
use crate::walker::cancel::{CancelReason, CancelToken};
use crate::walker::gate::ConcurrencyGate;
use crate::walker::queue::{QueuedTask, Task, WorkQueueReceiver};
use crate::walker::results::{ErrorCollector, ResultAggregator, WalkStats};
use crate::walker::scheduler::Scheduler;
use crate::walker::tracker::CompletionTracker;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace, warn};

/// State shared by every worker of one run
pub struct WalkContext {
    pub config: Arc<WalkConfig>,
    pub expander: Arc<dyn Expander>,
    pub scheduler: Scheduler,
    pub tracker: Arc<CompletionTracker>,
    pub gate: ConcurrencyGate,
    pub results: ResultAggregator,
    pub errors: ErrorCollector,
    pub stats: Arc<WalkStats>,
    pub cancel: CancelToken,

    /// Depth of the level being processed
    pub level: AtomicU32,

    /// Set by the coordinator once workers should exit
    pub shutdown: AtomicBool,

    /// First error that aborted the run
    fatal: Mutex<Option<WalkerError>>,
}

impl WalkContext {
    pub fn new(
        config: Arc<WalkConfig>,
        expander: Arc<dyn Expander>,
        tracker: Arc<CompletionTracker>,
        cancel: CancelToken,
    ) -> Self {
        let stats = Arc::new(WalkStats::default());
        let scheduler = Scheduler::new(
            Arc::clone(&config),
            Arc::clone(&tracker),
            cancel.clone(),
            Arc::clone(&stats),
        );
        let gate = ConcurrencyGate::new(config.max_concurrency, config.poll_interval);

        Self {
            config,
            expander,
            scheduler,
            tracker,
            gate,
            results: ResultAggregator::new(),
            errors: ErrorCollector::new(),
            stats,
            cancel,
            level: AtomicU32::new(0),
            shutdown: AtomicBool::new(false),
            fatal: Mutex::new(None),
        }
    }

    /// Stop the run because of `err`; only the first error is kept
    pub fn abort(&self, err: WalkerError) {
        {
            let mut fatal = self.fatal.lock();
            if fatal.is_none() {
                *fatal = Some(err);
            }
        }
        self.cancel.cancel_with(CancelReason::Aborted);
    }

    /// Take the error that aborted the run, if any
    pub fn take_fatal(&self) -> Option<WalkerError> {
        self.fatal.lock().take()
    }
}

/// Statistics collected by a single worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Tasks taken from the shared queue
    pub processed: AtomicU64,
}

impl WorkerStats {
    fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }
}

/// A worker thread that processes walk tasks
pub struct Worker {
    /// Worker ID
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<()>>,

    /// Worker statistics
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Spawn a new worker thread
    pub fn spawn(
        id: usize,
        ctx: Arc<WalkContext>,
        queue_rx: WorkQueueReceiver,
    ) -> std::result::Result<Self, WorkerError> {
        let stats = Arc::new(WorkerStats::default());
        let stats_clone = Arc::clone(&stats);

        let handle = thread::Builder::new()
            .name(format!("walker-{}", id))
            .spawn(move || worker_loop(id, ctx, queue_rx, stats_clone))
            .map_err(|e| WorkerError::InitFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
            stats,
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Wait for the worker to finish
    pub fn join(mut self) -> std::result::Result<(), WorkerError> {
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|payload| WorkerError::Panicked {
                id: self.id,
                message: panic_message(payload.as_ref()),
            })
        } else {
            Ok(())
        }
    }

    /// Let the thread finish on its own without waiting for it
    pub fn detach(mut self) {
        self.handle.take();
    }
}

/// Main worker loop
fn worker_loop(
    id: usize,
    ctx: Arc<WalkContext>,
    queue_rx: WorkQueueReceiver,
    stats: Arc<WorkerStats>,
) {
    debug!(worker = id, "Worker starting");

    let poll = ctx.config.poll_interval;

    loop {
        if ctx.shutdown.load(Ordering::Acquire) {
            break;
        }
        let item = match queue_rx.recv_timeout(poll) {
            Some(item) => item,
            None => continue, // Timeout - check shutdown and retry
        };

        stats.record_processed();

        let outcome = match process_task(id, item, &ctx) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(worker = id, error = %e, "Aborting walk");
                ctx.abort(e);
                return;
            }
        };

        match &outcome {
            TaskOutcome::Expanded { id: task_id, children } => {
                trace!(worker = id, id = %task_id, children = children, "Task expanded");
            }
            TaskOutcome::Skipped { id: task_id, reason } => {
                trace!(worker = id, id = %task_id, reason = %reason, "Task skipped");
            }
            TaskOutcome::Failed { id: task_id, error } if error.is_recoverable() => {
                debug!(worker = id, id = %task_id, error = %error, "Task failed");
            }
            TaskOutcome::Failed { id: task_id, error } => {
                warn!(worker = id, id = %task_id, error = %error, "Task failed");
            }
        }
    }

    debug!(
        worker = id,
        processed = stats.processed.load(Ordering::Relaxed),
        "Worker shutting down"
    );
}

/// Process one admitted task and finish its work unit
fn process_task(worker_id: usize, item: QueuedTask, ctx: &WalkContext) -> Result<TaskOutcome> {
    let QueuedTask { task, unit } = item;
    let outcome = expand_task(worker_id, &task, ctx);
    unit.finish()?;
    Ok(outcome)
}

/// Gate, expand, and stage the children of a single task
fn expand_task(worker_id: usize, task: &Task, ctx: &WalkContext) -> TaskOutcome {
    // No new dispatch once the token fires
    if ctx.cancel.is_cancelled() {
        ctx.stats.record_cancelled();
        return TaskOutcome::Skipped {
            id: task.id.clone(),
            reason: "walk cancelled".into(),
        };
    }

    let slot = match ctx.gate.acquire(&ctx.cancel) {
        Ok(slot) => slot,
        Err(_) => {
            ctx.stats.record_cancelled();
            return TaskOutcome::Skipped {
                id: task.id.clone(),
                reason: "cancelled waiting for a slot".into(),
            };
        }
    };

    trace!(worker = worker_id, id = %task.id, depth = task.depth, "Expanding");
    let result = call_expander(ctx.expander.as_ref(), task, &ctx.cancel);

    let outcome = match result {
        Ok(children) => {
            let count = children.len();
            for child in children {
                ctx.scheduler.offer(task.child(child));
            }
            ctx.results.record(task.id.clone());
            ctx.stats.record_expanded();
            TaskOutcome::Expanded {
                id: task.id.clone(),
                children: count,
            }
        }
        Err(ExpandError::Cancelled) if ctx.cancel.observed() => {
            ctx.stats.record_cancelled();
            TaskOutcome::Skipped {
                id: task.id.clone(),
                reason: "expansion stopped by cancellation".into(),
            }
        }
        Err(error) => {
            ctx.stats.record_failed();
            ctx.errors.record(TaskError {
                id: task.id.clone(),
                depth: task.depth,
                error: error.clone(),
            });
            TaskOutcome::Failed {
                id: task.id.clone(),
                error,
            }
        }
    };

    drop(slot);
    outcome
}

/// Call the expander, turning a panic into an expansion error
fn call_expander(
    expander: &dyn Expander,
    task: &Task,
    cancel: &CancelToken,
) -> ExpandResult<Vec<String>> {
    panic::catch_unwind(AssertUnwindSafe(|| expander.expand(task, cancel))).unwrap_or_else(
        |payload| {
            Err(ExpandError::Panicked {
                message: panic_message(payload.as_ref()),
            })
        },
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Total tasks taken from the queue by `workers`
pub fn aggregate_stats(workers: &[Worker]) -> u64 {
    workers
        .iter()
        .map(|w| w.stats.processed.load(Ordering::Relaxed))
        .sum()
}
