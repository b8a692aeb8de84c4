//! Cascading filter-file resolution.
//!
//! Filter files are plain text rule lists consumed by the external sync
//! tool; this module only decides which of them apply to a task. The
//! mode-wide file comes first, the task-specific file second, so the more
//! specific rules win inside the tool.

use std::path::PathBuf;

use synctide_core::config::{SyncMode, TaskName};
use synctide_core::paths;

/// Flag the sync tool expects in front of every rule-file path.
pub const FILTER_FLAG: &str = "--filter-from";

/// One `--filter-from <path>` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterArg {
    pub path: PathBuf,
}

impl FilterArg {
    /// Render as the two argv entries the sync tool expects.
    pub fn to_args(&self) -> [String; 2] {
        [FILTER_FLAG.to_string(), self.path.display().to_string()]
    }
}

/// Resolves which filter files apply to a (mode, task) pair.
///
/// Existence is re-checked on every call; edits to filter files take effect
/// on the next run without a restart.
#[derive(Debug, Clone)]
pub struct FilterResolver {
    root: PathBuf,
}

impl FilterResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Mode-wide filter first, then the task-specific one; either may be
    /// absent independently.
    pub fn resolve(&self, mode: SyncMode, task: &TaskName) -> Vec<FilterArg> {
        let mut chain = Vec::with_capacity(2);

        let global = paths::mode_filter_path(&self.root, mode);
        if global.exists() {
            chain.push(FilterArg { path: global });
        }

        let specific = paths::task_filter_path(&self.root, mode, task);
        if specific.exists() {
            chain.push(FilterArg { path: specific });
        }

        chain
    }
}
