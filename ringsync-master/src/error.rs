//! Error types for ringsync-master.

use std::path::PathBuf;

/// Main error type for ring-master operations.
#[derive(Debug, thiserror::Error)]
pub enum MasterError {
    /// A ring file could not be stat'ed or read.
    #[error("cannot read ring {path}: {source}")]
    Ring {
        /// The ring file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The digest task panicked or was cancelled.
    #[error("digest task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Could not bind the listen address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Configured address.
        address: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MasterError {
    /// The ring file does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Ring { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Result type alias for ring-master operations.
pub type Result<T> = std::result::Result<T, MasterError>;
