//! Work queue with backpressure support
//!
//! This module provides the bounded queue that carries one depth level of
//! admitted tasks from the coordinator to the worker pool. Workers only
//! consume. The coordinator is the single producer: when the queue is full
//! it waits for room, re-checking the cancellation token between attempts,
//! so a large level is fed to the pool at the pace the pool drains it.

use crate::error::{Result, WalkerError};
use crate::walker::cancel::CancelToken;
use crate::walker::tracker::WorkUnit;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A unit of traversal: an opaque id plus its distance from the seed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Task {
    /// Identifier (URL, path, node name)
    pub id: String,

    /// Depth from the seed (0 = seed)
    pub depth: u32,
}

impl Task {
    /// Create a task
    pub fn new(id: impl Into<String>, depth: u32) -> Self {
        Self {
            id: id.into(),
            depth,
        }
    }

    /// Create the seed task
    pub fn root(id: impl Into<String>) -> Self {
        Self::new(id, 0)
    }

    /// Create a child one level deeper
    pub fn child(&self, id: impl Into<String>) -> Self {
        Self::new(id, self.depth + 1)
    }
}

/// A task that has been admitted and registered with the completion tracker
#[derive(Debug)]
pub struct QueuedTask {
    /// The task itself
    pub task: Task,

    /// Its outstanding-work registration
    pub unit: WorkUnit,
}

/// Result of a non-blocking send
#[derive(Debug)]
pub enum Enqueued {
    /// Task is in the shared queue
    Sent,

    /// Queue is full; the caller keeps the task
    Full(QueuedTask),
}

/// Statistics for the work queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total tasks enqueued
    pub enqueued: AtomicU64,

    /// Sends that found the queue full and had to wait
    pub backpressure_events: AtomicU64,
}

impl QueueStats {
    /// Get number of tasks enqueued
    pub fn enqueued_count(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Get backpressure event count
    pub fn backpressure_count(&self) -> u64 {
        self.backpressure_events.load(Ordering::Relaxed)
    }
}

/// Bounded task queue
pub struct WorkQueue {
    sender: Sender<QueuedTask>,
    receiver: Receiver<QueuedTask>,
    stats: Arc<QueueStats>,
}

impl WorkQueue {
    /// Create a new work queue with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);

        Self {
            sender,
            receiver,
            stats: Arc::new(QueueStats::default()),
        }
    }

    /// Get a sender for this queue
    pub fn sender(&self) -> WorkQueueSender {
        WorkQueueSender {
            sender: self.sender.clone(),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Get a receiver for this queue (clone for each worker)
    pub fn receiver(&self) -> WorkQueueReceiver {
        WorkQueueReceiver {
            receiver: self.receiver.clone(),
        }
    }

    /// Get queue statistics
    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Get current queue length
    pub fn len(&self) -> usize {
        self.receiver.len()
    }
}

/// Handle for sending tasks to the queue
#[derive(Clone)]
pub struct WorkQueueSender {
    sender: Sender<QueuedTask>,
    stats: Arc<QueueStats>,
}

impl WorkQueueSender {
    /// Try to send a task without blocking
    ///
    /// A full queue hands the task back as `Enqueued::Full`.
    pub fn try_send(&self, item: QueuedTask) -> Result<Enqueued> {
        match self.sender.try_send(item) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(Enqueued::Sent)
            }
            Err(TrySendError::Full(item)) => {
                self.stats.backpressure_events.fetch_add(1, Ordering::Relaxed);
                Ok(Enqueued::Full(item))
            }
            Err(TrySendError::Disconnected(_)) => Err(WalkerError::ChannelClosed),
        }
    }

    /// Send a task, waiting for room while `cancel` has not fired
    ///
    /// Returns `Ok(false)` if cancelled first; the task is dropped, which
    /// finishes its work unit.
    pub fn send_until_cancelled(
        &self,
        item: QueuedTask,
        cancel: &CancelToken,
        poll: Duration,
    ) -> Result<bool> {
        if cancel.is_cancelled() {
            return Ok(false);
        }

        let mut item = match self.try_send(item)? {
            Enqueued::Sent => return Ok(true),
            Enqueued::Full(item) => item,
        };

        loop {
            if cancel.is_cancelled() {
                return Ok(false);
            }
            match self.sender.send_timeout(item, cancel.poll_wait(poll)) {
                Ok(()) => {
                    self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                    return Ok(true);
                }
                Err(SendTimeoutError::Timeout(back)) => item = back,
                Err(SendTimeoutError::Disconnected(_)) => return Err(WalkerError::ChannelClosed),
            }
        }
    }
}

/// Handle for receiving tasks from the queue
#[derive(Clone)]
pub struct WorkQueueReceiver {
    receiver: Receiver<QueuedTask>,
}

impl WorkQueueReceiver {
    /// Try to receive a task without blocking
    pub fn try_recv(&self) -> Option<QueuedTask> {
        self.receiver.try_recv().ok()
    }

    /// Receive with timeout
    pub fn recv_timeout(&self, timeout: Duration) -> Option<QueuedTask> {
        self.receiver.recv_timeout(timeout).ok()
    }
}
