//! Error types for link-walker
//!
//! This module defines the error hierarchy for a walk:
//! - Invariant violations (programming errors that abort the run)
//! - Expansion errors (per-task failures that are collected, never propagated)
//! - Configuration and graph-loading errors
//! - Worker thread errors
//!
//! Cancellation is not a `WalkerError`: a cancelled or timed-out walk is a
//! normal outcome reported on `WalkResult`.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for link-walker
#[derive(Error, Debug)]
pub enum WalkerError {
    /// Internal invariant broken; the run was aborted
    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// Adjacency graph loading errors
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Task queue disconnected while the walk still needed it
    #[error("Task queue closed unexpectedly")]
    ChannelClosed,
}

/// Fatal violations of the engine's own bookkeeping
///
/// These indicate a bug (an unmatched `done()` or `release()`), not an
/// environmental failure, and stop the whole run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Completion tracker decremented below zero
    #[error("completion tracker counter driven negative ({counter}): unmatched done()")]
    TrackerUnderflow { counter: i64 },

    /// Concurrency gate released with no slot issued
    #[error("concurrency gate released without a matching acquire (capacity {capacity})")]
    GateOverRelease { capacity: usize },
}

/// Errors returned by an expander for a single task
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpandError {
    /// Task target does not exist
    #[error("Not found: '{id}'")]
    NotFound { id: String },

    /// Task target is not readable
    #[error("Permission denied: '{id}'")]
    PermissionDenied { id: String },

    /// Other I/O failure while expanding
    #[error("Failed to expand '{id}': {reason}")]
    Io { id: String, reason: String },

    /// Expander observed the cancellation token and stopped early
    #[error("Expansion cancelled")]
    Cancelled,

    /// Expander panicked; caught at the worker boundary
    #[error("Expander panicked: {message}")]
    Panicked { message: String },

    /// Free-form failure reported by a custom expander
    #[error("{0}")]
    Failed(String),
}

impl ExpandError {
    /// Map an I/O error for `id` onto the matching variant
    pub fn from_io(id: &str, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ExpandError::NotFound { id: id.to_string() },
            std::io::ErrorKind::PermissionDenied => ExpandError::PermissionDenied {
                id: id.to_string(),
            },
            _ => ExpandError::Io {
                id: id.to_string(),
                reason: err.to_string(),
            },
        }
    }

    /// Check if this error is expected churn (target vanished, unreadable,
    /// or the run is winding down) rather than something worth a warning
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExpandError::NotFound { .. }
                | ExpandError::PermissionDenied { .. }
                | ExpandError::Cancelled
        )
    }
}

/// An expansion failure recorded against the task that produced it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{id}' at depth {depth}: {error}")]
pub struct TaskError {
    /// Identifier of the failed task
    pub id: String,

    /// Depth the task was expanded at
    pub depth: u32,

    /// What went wrong
    pub error: ExpandError,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid concurrency limit
    #[error("Invalid concurrency {value}: must be between 1 and {max}")]
    InvalidConcurrency { value: usize, max: usize },

    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid queue size
    #[error("Invalid queue size {size}: must be at least {min}")]
    InvalidQueueSize { size: usize, min: usize },

    /// Invalid dedup shard count
    #[error("Invalid shard count {count}: must be a power of two between 1 and {max}")]
    InvalidShardCount { count: usize, max: usize },

    /// Invalid exclude pattern
    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidExcludePattern { pattern: String, reason: String },

    /// Zero-length deadline
    #[error("Invalid deadline: must be greater than zero")]
    InvalidDeadline,

    /// Zero-length poll interval
    #[error("Invalid poll interval: must be greater than zero")]
    InvalidPollInterval,
}

/// Errors loading an adjacency-list graph
#[derive(Error, Debug)]
pub enum GraphError {
    /// Failed to read the graph file
    #[error("Failed to read graph file '{path}': {reason}")]
    Read { path: PathBuf, reason: String },

    /// Malformed line
    #[error("Line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked outside of an expansion
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Worker thread could not be started
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },
}

/// Result type alias for WalkerError
pub type Result<T> = std::result::Result<T, WalkerError>;

/// Result type alias for ExpandError
pub type ExpandResult<T> = std::result::Result<T, ExpandError>;

/// Represents the outcome of processing a single task
#[derive(Debug)]
pub enum TaskOutcome {
    /// Expanded successfully
    Expanded { id: String, children: usize },

    /// Never reached the expander (run stopping, etc.)
    Skipped { id: String, reason: String },

    /// Expander returned an error
    Failed { id: String, error: ExpandError },
}
