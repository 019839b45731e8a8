//! Task expansion
//!
//! An [`Expander`] turns one task into the ids of its children. The walker
//! calls it with no internal lock held, at most `max_concurrency` calls at a
//! time, and passes the run's [`CancelToken`] so long expansions can stop
//! early by returning [`ExpandError::Cancelled`].
//!
//! Two expanders ship with the crate:
//! - [`DirExpander`]: local directory tree
//! - [`GraphExpander`]: in-memory adjacency list, loadable from a text file
//!
//! Any `Fn(&Task, &CancelToken) -> ExpandResult<Vec<String>>` closure is an
//! expander too; wrap it in [`from_fn`] when the argument types need to be
//! inferred.

pub mod fs;
pub mod graph;

pub use fs::DirExpander;
pub use graph::GraphExpander;

use crate::error::ExpandResult;
use crate::walker::cancel::CancelToken;
use crate::walker::queue::Task;

/// Produces the children of a task
pub trait Expander: Send + Sync + 'static {
    /// Return the child ids of `task`
    ///
    /// Children are plain ids; the walker assigns them depth
    /// `task.depth + 1`, filters duplicates, and applies the depth limit.
    fn expand(&self, task: &Task, cancel: &CancelToken) -> ExpandResult<Vec<String>>;
}

impl<F> Expander for F
where
    F: Fn(&Task, &CancelToken) -> ExpandResult<Vec<String>> + Send + Sync + 'static,
{
    fn expand(&self, task: &Task, cancel: &CancelToken) -> ExpandResult<Vec<String>> {
        self(task, cancel)
    }
}

/// Pin a closure to the expander signature
pub fn from_fn<F>(f: F) -> F
where
    F: Fn(&Task, &CancelToken) -> ExpandResult<Vec<String>> + Send + Sync + 'static,
{
    f
}
