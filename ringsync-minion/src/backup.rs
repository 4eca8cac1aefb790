//! Timestamped copies of live rings, and pruning of old ones.
//!
//! Backups are named `<unix seconds>.<ring file name>`, e.g.
//! `1700000000.object.ring.gz`, so they sort by age and can be matched back
//! to their ring.

use crate::error::{Result, SyncError};
use ringsync_types::RingDigest;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Give up after this many name collisions in a row.
const MAX_NAME_ATTEMPTS: u32 = 64;

/// A backup that was written and verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    /// Where the copy was written.
    pub path: PathBuf,
    /// Digest of the copy.
    pub digest: RingDigest,
}

/// A backup found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    /// Path of the backup.
    pub path: PathBuf,
    /// Timestamp prefix, in unix seconds.
    pub stamp: u64,
}

/// Which backups a pruning pass keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Newest backups kept per ring.
    pub retain_count: usize,
    /// Older backups are removed regardless of count. The newest backup of
    /// each ring is never removed for age.
    pub max_age: Option<Duration>,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Copy `current` into `backup_dir` under a fresh timestamped name.
///
/// Creates `backup_dir` if needed and never overwrites an existing file.
///
/// # Errors
///
/// [`SyncError::Backup`] if the directory, copy or fsync fails.
pub fn backup(current: &Path, backup_dir: &Path) -> Result<BackupRecord> {
    let err = |source: io::Error| SyncError::Backup {
        path: current.to_path_buf(),
        source,
    };

    fs::create_dir_all(backup_dir).map_err(err)?;

    let file_name = current
        .file_name()
        .ok_or_else(|| err(io::Error::new(io::ErrorKind::InvalidInput, "no file name")))?
        .to_string_lossy()
        .into_owned();

    let mut source = File::open(current).map_err(err)?;

    // Only a second backup of the same ring within one second moves the
    // stamp past the clock.
    let mut stamp = unix_now();
    let mut attempts = 0;
    let (path, mut target) = loop {
        let path = backup_dir.join(format!("{stamp}.{file_name}"));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => break (path, file),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempts < MAX_NAME_ATTEMPTS => {
                attempts += 1;
                stamp += 1;
            }
            Err(e) => return Err(err(e)),
        }
    };

    io::copy(&mut source, &mut target).map_err(err)?;
    target.sync_all().map_err(err)?;
    drop(target);

    let digest = RingDigest::of_file(&path).map_err(err)?;
    Ok(BackupRecord { path, digest })
}

/// Backups of `file_name` in `backup_dir`, oldest first.
///
/// A missing directory has no backups.
pub fn list(backup_dir: &Path, file_name: &str) -> io::Result<Vec<BackupEntry>> {
    let entries = match fs::read_dir(backup_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let suffix = format!(".{file_name}");
    let mut backups = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(prefix) = name.strip_suffix(&suffix) else {
            continue;
        };
        if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        if let Ok(stamp) = prefix.parse() {
            backups.push(BackupEntry {
                path: entry.path(),
                stamp,
            });
        }
    }
    backups.sort_by_key(|b| b.stamp);
    Ok(backups)
}

/// Remove backups of `file_name` that `policy` does not keep.
///
/// Returns the removed paths.
pub fn prune(
    backup_dir: &Path,
    file_name: &str,
    policy: &RetentionPolicy,
    now: SystemTime,
) -> io::Result<Vec<PathBuf>> {
    let backups = list(backup_dir, file_name)?;
    let excess = backups.len().saturating_sub(policy.retain_count);
    let cutoff = policy
        .max_age
        .and_then(|age| now.checked_sub(age))
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs());
    let newest = backups.len().saturating_sub(1);

    let mut removed = Vec::new();
    for (idx, entry) in backups.into_iter().enumerate() {
        let too_many = idx < excess;
        let too_old = idx != newest && cutoff.is_some_and(|c| entry.stamp < c);
        if !(too_many || too_old) {
            continue;
        }
        match fs::remove_file(&entry.path) {
            Ok(()) => removed.push(entry.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_ring(dir: &Path, content: &[u8]) -> PathBuf {
        let path = dir.join("object.ring.gz");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn backup_copies_and_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let live = live_ring(dir.path(), b"ring v1");
        let backups = dir.path().join("backups");

        let record = backup(&live, &backups).unwrap();

        assert!(record.path.starts_with(&backups));
        assert!(record
            .path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with(".object.ring.gz"));
        assert_eq!(fs::read(&record.path).unwrap(), b"ring v1");
        assert_eq!(record.digest, RingDigest::of_bytes(b"ring v1"));
    }

    #[test]
    fn rapid_backups_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let live = live_ring(dir.path(), b"ring");
        let backups = dir.path().join("backups");

        let first = backup(&live, &backups).unwrap();
        let second = backup(&live, &backups).unwrap();
        let third = backup(&live, &backups).unwrap();

        assert_ne!(first.path, second.path);
        assert_ne!(second.path, third.path);
        assert_eq!(list(&backups, "object.ring.gz").unwrap().len(), 3);
    }

    #[test]
    fn different_rings_share_a_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let backups = dir.path().join("backups");
        let mut stamps = Vec::new();
        for name in ["account.ring.gz", "container.ring.gz", "object.ring.gz"] {
            let live = dir.path().join(name);
            fs::write(&live, name).unwrap();
            backup(&live, &backups).unwrap();
            stamps.push(list(&backups, name).unwrap()[0].stamp);
        }
        let after = unix_now();

        // No ring's backup is dated in the future
        assert!(stamps.iter().all(|&stamp| stamp <= after));
    }

    #[test]
    fn backup_of_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = backup(&dir.path().join("object.ring.gz"), dir.path());
        assert!(matches!(result, Err(SyncError::Backup { .. })));
    }

    #[test]
    fn list_filters_other_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "200.object.ring.gz",
            "100.object.ring.gz",
            "150.account.ring.gz",
            "x100.object.ring.gz",
            "object.ring.gz",
            ".object.ring.gz",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let stamps: Vec<u64> = list(dir.path(), "object.ring.gz")
            .unwrap()
            .iter()
            .map(|b| b.stamp)
            .collect();
        assert_eq!(stamps, vec![100, 200]);
    }

    #[test]
    fn list_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list(&dir.path().join("nope"), "object.ring.gz")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn prune_keeps_newest_by_count() {
        let dir = tempfile::tempdir().unwrap();
        for stamp in [100, 200, 300, 400] {
            fs::write(dir.path().join(format!("{stamp}.object.ring.gz")), b"").unwrap();
        }
        fs::write(dir.path().join("100.account.ring.gz"), b"").unwrap();

        let policy = RetentionPolicy {
            retain_count: 2,
            max_age: None,
        };
        let removed = prune(dir.path(), "object.ring.gz", &policy, SystemTime::now()).unwrap();

        assert_eq!(removed.len(), 2);
        let left: Vec<u64> = list(dir.path(), "object.ring.gz")
            .unwrap()
            .iter()
            .map(|b| b.stamp)
            .collect();
        assert_eq!(left, vec![300, 400]);
        assert!(dir.path().join("100.account.ring.gz").exists());
    }

    #[test]
    fn prune_by_age_spares_newest() {
        let dir = tempfile::tempdir().unwrap();
        for stamp in [100, 200] {
            fs::write(dir.path().join(format!("{stamp}.object.ring.gz")), b"").unwrap();
        }

        let policy = RetentionPolicy {
            retain_count: 10,
            max_age: Some(Duration::from_secs(60)),
        };
        let now = UNIX_EPOCH + Duration::from_secs(10_000);
        let removed = prune(dir.path(), "object.ring.gz", &policy, now).unwrap();

        assert_eq!(removed, vec![dir.path().join("100.object.ring.gz")]);
        assert!(dir.path().join("200.object.ring.gz").exists());
    }
}
