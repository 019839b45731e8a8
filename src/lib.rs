//! link-walker - Bounded-Concurrency Graph Walker
//!
//! Given a seed task, a function that expands a task into child tasks, a
//! maximum parallelism, a maximum depth, and an optional deadline, visit
//! every reachable task exactly once with at most N expansions in flight,
//! and return what was visited (or a partial result and the reason the walk
//! stopped early).
//!
//! # Features
//!
//! - **Exactly-once expansion**: a sharded visited set with an atomic
//!   claim, so two paths to the same task never both expand it.
//!
//! - **Level by level**: depth `d + 1` is dispatched only after depth `d`
//!   drains, so each task is claimed at its shortest depth and the visited
//!   set does not depend on thread timing.
//!
//! - **Bounded parallelism**: a counting gate caps simultaneous expansions
//!   independently of the worker pool size.
//!
//! - **Cooperative cancellation**: Ctrl-C or a deadline stops new dispatch
//!   at once; the walk returns promptly with everything recorded so far.
//!
//! - **Memory bounded**: the coordinator feeds each level through a bounded
//!   work queue and waits for room when it is full.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Expander                                 │
//! │           (directory tree, adjacency list, closure)              │
//! └─────────────────────────────▲───────────────────────────────────┘
//!                               │ expand(task, cancel)
//!                               │ no locks held
//! ┌─────────────────────────────┴───────────────────────────────────┐
//! │                      Worker Threads                              │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐         ┌─────────┐     │
//! │  │Worker 1 │  │Worker 2 │  │Worker 3 │  ...    │Worker N │     │
//! │  └────┬────┘  └────┬────┘  └────┬────┘         └────┬────┘     │
//! │       └────────────┼────────────┼────────────────────┘          │
//! │                    ▼            ▼                               │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌──────────────────┐   │
//! │  │ Dedup Store  │  │ Concurrency Gate │  │ Completion       │   │
//! │  │ (dashmap)    │  │ (N slots)        │  │ Tracker          │   │
//! │  └──────────────┘  └──────────────────┘  └──────────────────┘   │
//! │                         │                                       │
//! │                         ▼                                       │
//! │            ┌──────────────────────────┐                         │
//! │            │     Work Queue           │                         │
//! │            │  (crossbeam bounded)     │                         │
//! │            │  - Backpressure support  │                         │
//! │            └──────────────────────────┘                         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Walk a directory tree four levels deep, 16 at a time
//! link-walker /srv/data -d 4 -c 16
//!
//! # Walk an adjacency list with a 2 second budget
//! link-walker A --graph links.txt -c 2 --timeout-ms 2000 --list
//! ```
//!
//! ```no_run
//! use link_walker::expand::from_fn;
//! use std::time::Duration;
//!
//! let result = link_walker::run(
//!     "A",
//!     from_fn(|task, _cancel| {
//!         Ok(match task.id.as_str() {
//!             "A" => vec!["B".into(), "C".into()],
//!             "B" | "C" => vec!["D".into()],
//!             _ => vec![],
//!         })
//!     }),
//!     3,
//!     2,
//!     Some(Duration::from_secs(5)),
//! )?;
//! assert_eq!(result.visited.len(), 4);
//! # Ok::<(), link_walker::WalkerError>(())
//! ```

pub mod config;
pub mod error;
pub mod expand;
pub mod progress;
pub mod walker;

pub use config::{CliArgs, WalkConfig};
pub use error::{ExpandError, Result, TaskError, WalkerError};
pub use expand::{DirExpander, Expander, GraphExpander};
pub use walker::{run, CancelReason, CancelToken, Task, WalkCoordinator, WalkProgress, WalkResult};
