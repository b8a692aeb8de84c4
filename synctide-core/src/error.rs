//! Error types for synctide-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading the configuration inputs.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required input file was absent.
    #[error("required file not found at {path}")]
    Missing { path: PathBuf },

    /// Underlying I/O failure (permission denied, unreadable file, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse error on load — includes file path and position context
    /// from serde_json.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
