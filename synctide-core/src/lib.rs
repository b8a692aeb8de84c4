//! Synctide core library — configuration model, well-known paths, errors.
//!
//! Public API surface:
//! - [`config`] — task table, flag arrays, loading
//! - [`error`] — [`ConfigError`]
//! - [`paths`] — workspace and lock locations

pub mod config;
pub mod error;
pub mod paths;

pub use config::{
    load_config, load_flags, Config, FlagSet, OrderedMap, RunEnvironment, SyncMode, TaskName,
    TaskSpec,
};
pub use error::ConfigError;
