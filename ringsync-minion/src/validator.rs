//! Checks on a staged ring before it may go live.
//!
//! The digest is checked first: there is no point decoding bytes that are
//! not the bytes the server sent.

use crate::error::{Result, SyncError};
use ringsync_core::ValidationResult;
use ringsync_types::{RingDecoder, RingDigest};
use std::path::Path;

/// Whether the file at `path` hashes to `expected`.
pub fn check_digest(path: &Path, expected: &RingDigest) -> std::io::Result<bool> {
    Ok(RingDigest::of_file(path)? == *expected)
}

/// Whether the file at `path` decodes to a usable ring.
pub fn check_structure(path: &Path, decoder: &dyn RingDecoder) -> ValidationResult {
    match inspect(path, decoder) {
        Ok(()) => ValidationResult::Valid,
        Err(_) => ValidationResult::StructurallyInvalid,
    }
}

/// Full validation of a staged file.
///
/// # Errors
///
/// [`SyncError::ContentMismatch`] if the digest differs,
/// [`SyncError::StructuralInvalid`] if the ring is unusable, and
/// [`SyncError::Io`] if the file cannot be read.
pub fn validate(path: &Path, expected: &RingDigest, decoder: &dyn RingDecoder) -> Result<()> {
    let actual = RingDigest::of_file(path)?;
    if actual != *expected {
        return Err(SyncError::ContentMismatch {
            expected: expected.clone(),
            actual,
        });
    }
    inspect(path, decoder).map_err(|reason| SyncError::StructuralInvalid { reason })
}

/// Map a validation error onto the result fed to the state machine.
///
/// Errors that are not validation verdicts (the staged file became
/// unreadable) return `None`.
pub fn verdict(result: &Result<()>) -> Option<ValidationResult> {
    match result {
        Ok(()) => Some(ValidationResult::Valid),
        Err(SyncError::ContentMismatch { .. }) => Some(ValidationResult::DigestMismatch),
        Err(SyncError::StructuralInvalid { .. }) => Some(ValidationResult::StructurallyInvalid),
        Err(_) => None,
    }
}

fn inspect(path: &Path, decoder: &dyn RingDecoder) -> std::result::Result<(), String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    let ring = decoder.decode(&bytes).map_err(|e| e.to_string())?;

    if ring.device_count() == 0 {
        return Err("ring has no devices".into());
    }

    let partitions = ring.partition_count();
    if partitions == 0 {
        return Err("ring has no partitions".into());
    }
    // Sample both ends of the table rather than walking every partition.
    let last = u32::try_from(partitions - 1).unwrap_or(u32::MAX);
    for partition in [0, last] {
        let nodes = ring
            .nodes_for_partition(partition)
            .map_err(|e| format!("partition {partition}: {e}"))?;
        if nodes.is_empty() {
            return Err(format!("partition {partition} has no nodes"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ring_bytes;
    use ringsync_types::SwiftRingDecoder;

    fn write(dir: &Path, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join("object.ring.gz");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn valid_ring_passes() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = ring_bytes(3);
        let path = write(dir.path(), &bytes);
        let digest = RingDigest::of_bytes(&bytes);

        assert!(check_digest(&path, &digest).unwrap());
        assert_eq!(check_structure(&path, &SwiftRingDecoder), ValidationResult::Valid);
        validate(&path, &digest, &SwiftRingDecoder).unwrap();
    }

    #[test]
    fn wrong_digest_is_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), &ring_bytes(3));

        let result = validate(&path, &RingDigest::new("badmd5"), &SwiftRingDecoder);

        assert!(!check_digest(&path, &RingDigest::new("badmd5")).unwrap());
        assert!(result.as_ref().unwrap_err().to_string().starts_with("md5 mismatch"));
        assert_eq!(verdict(&result), Some(ValidationResult::DigestMismatch));
    }

    #[test]
    fn garbage_is_structurally_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), b"not a ring");
        let digest = RingDigest::of_bytes(b"not a ring");

        let result = validate(&path, &digest, &SwiftRingDecoder);

        assert!(result.as_ref().unwrap_err().to_string().starts_with("Invalid ring"));
        assert_eq!(verdict(&result), Some(ValidationResult::StructurallyInvalid));
    }

    #[test]
    fn ring_without_devices_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), &ring_bytes(0));
        assert_eq!(
            check_structure(&path, &SwiftRingDecoder),
            ValidationResult::StructurallyInvalid
        );
    }

    #[test]
    fn missing_file_is_not_a_verdict() {
        let dir = tempfile::tempdir().unwrap();
        let result = validate(
            &dir.path().join("gone"),
            &RingDigest::new("abc"),
            &SwiftRingDecoder,
        );
        assert!(matches!(result, Err(SyncError::Io(_))));
        assert_eq!(verdict(&result), None);
    }
}
