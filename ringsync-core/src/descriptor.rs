//! What a node knows about one managed ring.

use crate::outcome::FailureKind;
use crate::state::Action;
use ringsync_types::RingDigest;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// In-memory state for one ring type (`object`, `container`, `account`).
///
/// Owned by that ring's sync task and only changed between cycles. Lives for
/// the whole process; a restart rebuilds it from the live file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingDescriptor {
    name: String,
    path: PathBuf,
    backup_dir: PathBuf,
    known_digest: Option<RingDigest>,
    last_success: Option<SystemTime>,
    consecutive_failures: u32,
    last_failure: Option<FailureKind>,
    next_poll_at: Option<SystemTime>,
}

impl RingDescriptor {
    /// Create a descriptor with no known digest.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        backup_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            backup_dir: backup_dir.into(),
            known_digest: None,
            last_success: None,
            consecutive_failures: 0,
            last_failure: None,
            next_poll_at: None,
        }
    }

    /// Set the digest of the ring currently on disk.
    pub fn with_known_digest(mut self, digest: Option<RingDigest>) -> Self {
        self.known_digest = digest;
        self
    }

    /// Logical ring name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the live ring file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory receiving backups of the live ring.
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// File name of the live ring, which is also its name on the ring-master.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.ring.gz", self.name))
    }

    /// Digest of the live ring, if known.
    pub fn known_digest(&self) -> Option<&RingDigest> {
        self.known_digest.as_ref()
    }

    /// When a cycle last ended in `Unchanged` or `Swapped`.
    pub fn last_success(&self) -> Option<SystemTime> {
        self.last_success
    }

    /// Number of failed cycles since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Classification of the most recent failure since the last success.
    pub fn last_failure(&self) -> Option<FailureKind> {
        self.last_failure
    }

    /// When the next cycle is due.
    pub fn next_poll_at(&self) -> Option<SystemTime> {
        self.next_poll_at
    }

    /// Ring-master reported no change.
    pub fn record_unchanged(&mut self, now: SystemTime) {
        self.last_success = Some(now);
        self.consecutive_failures = 0;
        self.last_failure = None;
    }

    /// A new ring went live.
    pub fn record_swapped(&mut self, digest: RingDigest, now: SystemTime) {
        self.known_digest = Some(digest);
        self.record_unchanged(now);
    }

    /// A cycle failed. Returns the new consecutive failure count.
    pub fn record_failure(&mut self, kind: FailureKind) -> u32 {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure = Some(kind);
        self.consecutive_failures
    }

    /// Remember when the next cycle is due.
    pub fn schedule_next(&mut self, at: SystemTime) {
        self.next_poll_at = Some(at);
    }

    /// Apply a bookkeeping action from the state machine.
    ///
    /// Returns true if the action was a bookkeeping action; I/O actions are
    /// left to the caller.
    pub fn apply(&mut self, action: &Action, now: SystemTime) -> bool {
        match action {
            Action::RecordUnchanged => self.record_unchanged(now),
            Action::RecordSwapped { digest } => self.record_swapped(digest.clone(), now),
            Action::RecordFailure { kind } => {
                self.record_failure(*kind);
            }
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn descriptor() -> RingDescriptor {
        RingDescriptor::new(
            "object",
            "/etc/swift/object.ring.gz",
            "/etc/swift/backups",
        )
    }

    #[test]
    fn new_descriptor_knows_nothing() {
        let d = descriptor();
        assert_eq!(d.name(), "object");
        assert_eq!(d.file_name(), "object.ring.gz");
        assert!(d.known_digest().is_none());
        assert!(d.last_success().is_none());
        assert_eq!(d.consecutive_failures(), 0);
    }

    #[test]
    fn failures_accumulate_until_success() {
        let mut d = descriptor();
        assert_eq!(d.record_failure(FailureKind::NetworkUnavailable), 1);
        assert_eq!(d.record_failure(FailureKind::RemoteRejected), 2);
        assert_eq!(d.last_failure(), Some(FailureKind::RemoteRejected));

        d.record_unchanged(SystemTime::UNIX_EPOCH);
        assert_eq!(d.consecutive_failures(), 0);
        assert!(d.last_failure().is_none());
    }

    #[test]
    fn failure_keeps_known_digest() {
        let digest = RingDigest::of_bytes(b"v1");
        let mut d = descriptor().with_known_digest(Some(digest.clone()));
        d.record_failure(FailureKind::ContentMismatch);
        assert_eq!(d.known_digest(), Some(&digest));
    }

    #[test]
    fn swap_updates_digest_and_time() {
        let mut d = descriptor();
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        d.record_failure(FailureKind::LocalIoFailure);

        d.record_swapped(RingDigest::of_bytes(b"v2"), now);

        assert_eq!(d.known_digest(), Some(&RingDigest::of_bytes(b"v2")));
        assert_eq!(d.last_success(), Some(now));
        assert_eq!(d.consecutive_failures(), 0);
    }

    #[test]
    fn apply_handles_bookkeeping_only() {
        let mut d = descriptor();
        let now = SystemTime::UNIX_EPOCH;

        assert!(d.apply(
            &Action::RecordFailure {
                kind: FailureKind::Unexpected
            },
            now
        ));
        assert_eq!(d.consecutive_failures(), 1);

        assert!(!d.apply(&Action::Fetch, now));
        assert!(!d.apply(&Action::BackupAndReplace, now));
        assert_eq!(d.consecutive_failures(), 1);
    }

    #[test]
    fn file_name_falls_back_to_ring_name() {
        let d = RingDescriptor::new("account", "/", "/tmp");
        assert_eq!(d.file_name(), "account.ring.gz");
    }
}
