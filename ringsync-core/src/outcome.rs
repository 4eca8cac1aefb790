//! Classified results of the steps of a sync cycle.

use ringsync_types::RingDigest;
use std::fmt;

/// Why a cycle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Transport-level failure: refused, timed out, DNS, malformed response.
    NetworkUnavailable,
    /// The ring-master answered with a status other than 200 or 304.
    RemoteRejected,
    /// The downloaded bytes do not match the server's digest.
    ContentMismatch,
    /// The downloaded bytes do not decode to a usable ring.
    StructuralInvalid,
    /// Staging, backup or rename failed locally.
    LocalIoFailure,
    /// Anything else.
    Unexpected,
}

impl FailureKind {
    /// Stable lowercase name, used in logs and alerts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkUnavailable => "network_unavailable",
            Self::RemoteRejected => "remote_rejected",
            Self::ContentMismatch => "content_mismatch",
            Self::StructuralInvalid => "structural_invalid",
            Self::LocalIoFailure => "local_io_failure",
            Self::Unexpected => "unexpected",
        }
    }

    /// Failures that clear up on their own and are simply retried next cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NetworkUnavailable | Self::RemoteRejected | Self::Unexpected
        )
    }

    /// Failures operators should hear about even when they happen once.
    ///
    /// They point at a corrupt transfer, a server-side data bug or a broken
    /// local filesystem rather than a flaky network.
    pub fn needs_attention(&self) -> bool {
        !self.is_transient()
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cause attached to [`FetchOutcome::TransportError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    /// [`FailureKind::NetworkUnavailable`] or [`FailureKind::Unexpected`].
    pub kind: FailureKind,
    /// Human-readable cause.
    pub cause: String,
}

impl FetchFailure {
    /// A transport-level failure.
    pub fn network(cause: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::NetworkUnavailable,
            cause: cause.into(),
        }
    }

    /// A failure that fits no other category.
    pub fn unexpected(cause: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Unexpected,
            cause: cause.into(),
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.cause)
    }
}

/// Result of one conditional fetch from the ring-master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The server reports our digest is current (304).
    Unchanged,
    /// New ring bytes and the digest the server claims for them (200).
    Received {
        /// Full response body.
        bytes: Vec<u8>,
        /// Digest from the `ETag` header.
        server_digest: RingDigest,
    },
    /// Any status other than 200 and 304.
    ClientOrServerError(u16),
    /// The request did not produce a usable response.
    TransportError(FetchFailure),
}

impl FetchOutcome {
    /// True for the two error variants.
    pub fn is_failure(&self) -> bool {
        self.failure_kind().is_some()
    }

    /// Failure classification, if this outcome is a failure.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Unchanged | Self::Received { .. } => None,
            Self::ClientOrServerError(_) => Some(FailureKind::RemoteRejected),
            Self::TransportError(failure) => Some(failure.kind),
        }
    }
}

/// Result of checking a staged ring file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationResult {
    /// Digest matches and the ring is usable.
    Valid,
    /// Digest does not match the server's.
    DigestMismatch,
    /// Does not decode, has no devices, or partitions do not resolve.
    StructurallyInvalid,
}

impl ValidationResult {
    /// Failure classification, if validation failed.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Valid => None,
            Self::DigestMismatch => Some(FailureKind::ContentMismatch),
            Self::StructurallyInvalid => Some(FailureKind::StructuralInvalid),
        }
    }
}
