//! Well-known filesystem locations.
//!
//! # Workspace layout
//!
//! ```text
//! ~/.synctide/
//!   config.json                     (task table)
//!   flags.json                      (shared flag arrays)
//!   filters.<mode>.txt              (mode-wide filter rules, optional)
//!   filters.<mode>.<task>.txt       (task-specific filter rules, optional)
//!   logs/
//!     synctide.log                  (rotated at startup)
//! ```
//!
//! Every function takes its base directory explicitly; only the CLI derives
//! the home directory from the environment.

use std::env;
use std::path::{Path, PathBuf};

use crate::config::{SyncMode, TaskName};

pub const APP_NAME: &str = "synctide";
pub const CONFIG_FILE: &str = "config.json";
pub const FLAGS_FILE: &str = "flags.json";
pub const LOG_FILE: &str = "synctide.log";

/// `<home>/.synctide/` — pure, no I/O.
pub fn workspace_root(home: &Path) -> PathBuf {
    home.join(".synctide")
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn flags_path(root: &Path) -> PathBuf {
    root.join(FLAGS_FILE)
}

pub fn logs_dir(root: &Path) -> PathBuf {
    root.join("logs")
}

pub fn log_path(root: &Path) -> PathBuf {
    logs_dir(root).join(LOG_FILE)
}

/// Mode-wide filter file, applied to every task of `mode`.
pub fn mode_filter_path(root: &Path, mode: SyncMode) -> PathBuf {
    root.join(format!("filters.{mode}.txt"))
}

/// Task-specific filter file, applied after the mode-wide one.
pub fn task_filter_path(root: &Path, mode: SyncMode, task: &TaskName) -> PathBuf {
    root.join(format!("filters.{mode}.{task}.txt"))
}

/// Lock directory for `user`, under the system temp dir.
pub fn lock_dir(user: &str) -> PathBuf {
    env::temp_dir().join(format!("{APP_NAME}_lock_{user}"))
}

/// Current OS user name from the environment; `unknown` as a last resort.
pub fn current_user() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| String::from("unknown"))
}
