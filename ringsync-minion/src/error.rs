//! Error types for ringsync-minion.

use ringsync_core::FailureKind;
use ringsync_types::RingDigest;
use std::path::PathBuf;

/// Main error type for minion operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Downloaded bytes do not match the server's digest.
    #[error("md5 mismatch: expected {expected}, got {actual}")]
    ContentMismatch {
        /// Digest asserted by the ring-master.
        expected: RingDigest,
        /// Digest of the staged file.
        actual: RingDigest,
    },

    /// Downloaded bytes are not a usable ring.
    #[error("Invalid ring: {reason}")]
    StructuralInvalid {
        /// What was wrong with it.
        reason: String,
    },

    /// Writing the downloaded bytes to a temp file failed.
    #[error("failed to stage ring in {dir}: {source}")]
    Stage {
        /// Directory the temp file was created in.
        dir: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Copying the live ring to the backup directory failed.
    #[error("failed to back up {path}: {source}")]
    Backup {
        /// The file being backed up.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The backup copy does not hash to the live ring's digest.
    #[error("backup {backup} is corrupt: expected {expected}, got {actual}")]
    BackupCorrupt {
        /// Path of the backup.
        backup: PathBuf,
        /// Digest of the live ring.
        expected: RingDigest,
        /// Digest of the backup.
        actual: RingDigest,
    },

    /// Renaming the staged ring over the live ring failed.
    #[error("failed to replace {path}: {source}")]
    Replace {
        /// The live ring path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Ring-master client could not be built.
    #[error("ring-master client error: {0}")]
    Client(#[from] crate::client::ClientError),

    /// A blocking file task panicked or was cancelled.
    #[error("file task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Where this error sits in the failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ContentMismatch { .. } => FailureKind::ContentMismatch,
            Self::StructuralInvalid { .. } => FailureKind::StructuralInvalid,
            Self::Stage { .. }
            | Self::Backup { .. }
            | Self::BackupCorrupt { .. }
            | Self::Replace { .. }
            | Self::Io(_) => FailureKind::LocalIoFailure,
            Self::Client(_) => FailureKind::NetworkUnavailable,
            Self::Config(_) | Self::Task(_) => FailureKind::Unexpected,
        }
    }
}

/// Result type alias for minion operations.
pub type Result<T> = std::result::Result<T, SyncError>;
