//! Directory tree expander
//!
//! The children of a directory task are the paths of its entries. Regular
//! files are leaves and are only reported when `include_files` is set.
//! Symbolic links are skipped unless `follow_symlinks` is set, in which case
//! a link to a directory is reported by its canonical path so a link cycle
//! collapses onto an id that was already claimed.

use crate::error::{ExpandError, ExpandResult};
use crate::expand::Expander;
use crate::walker::cancel::CancelToken;
use crate::walker::queue::Task;
use std::fs;
use std::path::Path;
use tracing::trace;

/// Entries read between cancellation checks
const CANCEL_CHECK_EVERY: usize = 64;

/// Expander over the local filesystem
#[derive(Debug, Clone, Default)]
pub struct DirExpander {
    include_files: bool,
    follow_symlinks: bool,
}

impl DirExpander {
    /// Directories only, symlinks not followed
    pub fn new() -> Self {
        Self::default()
    }

    /// Also report regular files as (childless) tasks
    pub fn include_files(mut self, yes: bool) -> Self {
        self.include_files = yes;
        self
    }

    /// Follow symbolic links to directories
    pub fn follow_symlinks(mut self, yes: bool) -> Self {
        self.follow_symlinks = yes;
        self
    }
}

impl Expander for DirExpander {
    fn expand(&self, task: &Task, cancel: &CancelToken) -> ExpandResult<Vec<String>> {
        let path = Path::new(&task.id);

        let meta = fs::metadata(path).map_err(|e| ExpandError::from_io(&task.id, &e))?;
        if !meta.is_dir() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(path).map_err(|e| ExpandError::from_io(&task.id, &e))?;
        let mut children = Vec::new();

        for (i, entry) in entries.enumerate() {
            if i % CANCEL_CHECK_EVERY == 0 && cancel.is_cancelled() {
                return Err(ExpandError::Cancelled);
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // Entry vanished between readdir and stat
                    trace!(id = %task.id, error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(e) => {
                    trace!(id = %task.id, error = %e, "Skipping entry without type");
                    continue;
                }
            };

            let entry_path = entry.path();
            if file_type.is_dir() {
                children.push(entry_path.to_string_lossy().into_owned());
            } else if file_type.is_symlink() {
                if !self.follow_symlinks {
                    continue;
                }
                // Dangling links are skipped
                if let Ok(target) = fs::canonicalize(&entry_path) {
                    if target.is_dir() {
                        children.push(target.to_string_lossy().into_owned());
                    } else if self.include_files {
                        children.push(entry_path.to_string_lossy().into_owned());
                    }
                }
            } else if self.include_files {
                children.push(entry_path.to_string_lossy().into_owned());
            }
        }

        children.sort_unstable();
        Ok(children)
    }
}
