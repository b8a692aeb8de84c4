use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the run path: gate, lock, executor, orchestrator.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connectivity probe failed; no network connection")]
    Offline,

    #[error("run interrupted by operator")]
    Cancelled,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.into(),
        source,
    }
}
