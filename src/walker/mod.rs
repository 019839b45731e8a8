//! Bounded-concurrency graph walker
//!
//! Visits every task reachable from a seed exactly once, with at most N
//! expansions running at a time, stopping early on cancellation or a
//! deadline.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │     WalkCoordinator     │
//!                     │  - one level at a time  │
//!                     │  - cancel / deadline    │
//!                     └───────────┬─────────────┘
//!                                 │
//!                    ┌────────────▼────────────┐
//!                    │       Work Queue        │
//!                    │  (crossbeam bounded)    │
//!                    └────────────┬────────────┘
//!                                 │
//!       ┌─────────────────────────┼─────────────────────────┐
//!       │                         │                         │
//! ┌─────▼─────┐             ┌─────▼─────┐             ┌─────▼─────┐
//! │  Worker 1 │             │  Worker 2 │             │  Worker N │
//! │  gate     │             │  gate     │             │  gate     │
//! │  expand   │             │  expand   │             │  expand   │
//! └─────┬─────┘             └─────┬─────┘             └─────┬─────┘
//!       └───────── children ──────┼──── scheduler ──────────┘
//!                                 ▼
//!        depth check → exclude → dedup claim → next level
//! ```
//!
//! Each shared component is guarded on its own, and no component takes
//! another's lock while holding its own.

pub mod cancel;
pub mod coordinator;
pub mod dedup;
pub mod gate;
pub mod queue;
pub mod results;
pub mod scheduler;
pub mod tracker;
pub mod worker;

pub use cancel::{CancelReason, CancelToken, Cancelled};
pub use coordinator::{run, WalkCoordinator, WalkProgress, WalkResult};
pub use dedup::DedupStore;
pub use gate::{ConcurrencyGate, GateSlot};
pub use queue::{Task, WorkQueue};
pub use results::{ErrorCollector, ResultAggregator, StatsSnapshot, WalkStats};
pub use scheduler::{Admission, Scheduler};
pub use tracker::{CompletionTracker, WaitOutcome, WorkUnit};
