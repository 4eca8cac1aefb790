//! Error types for ring decoding.

use thiserror::Error;

/// Errors produced while decoding a ring or resolving partitions.
#[derive(Debug, Error)]
pub enum RingError {
    /// Reading the (gzip) stream failed.
    #[error("ring read failed: {0}")]
    Io(#[from] std::io::Error),

    /// The stream does not start with the ring magic.
    #[error("bad ring magic")]
    BadMagic,

    /// The ring was written with a format version we cannot read.
    #[error("unsupported ring format version: {0}")]
    UnsupportedVersion(u16),

    /// The JSON header could not be parsed.
    #[error("invalid ring header: {0}")]
    Header(#[from] serde_json::Error),

    /// The header's part shift is outside 0..=32.
    #[error("invalid part shift: {0}")]
    InvalidPartShift(u32),

    /// A replica assignment table ended mid-entry.
    #[error("truncated assignment table for replica {replica}")]
    Truncated {
        /// Index of the replica table.
        replica: usize,
    },

    /// The partition is beyond the ring's partition count.
    #[error("partition {partition} out of range (ring has {count} partitions)")]
    PartitionOutOfRange {
        /// Requested partition.
        partition: u32,
        /// Number of partitions in the ring.
        count: usize,
    },

    /// An assignment references a device slot that is empty or missing.
    #[error("assignment references unknown device {id}")]
    UnknownDevice {
        /// The device id found in the assignment table.
        id: u16,
    },
}
