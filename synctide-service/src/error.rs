use std::path::PathBuf;

use thiserror::Error;

/// Error surface for service installation, removal, and status.
///
/// Variants wrapping a `String` carry the captured stdout/stderr of the
/// failing privileged command.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("systemctl error: {0}")]
    Systemd(String),

    #[error("task scheduler error: {0}")]
    Scheduler(String),

    #[error("elevation error: {0}")]
    Elevation(String),

    #[error("cannot determine current executable: {0}")]
    CurrentExe(#[source] std::io::Error),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ServiceError {
    ServiceError::Io {
        path: path.into(),
        source,
    }
}
