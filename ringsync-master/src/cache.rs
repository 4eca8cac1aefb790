//! md5 of each served ring, recomputed only when the file's mtime changes.

use crate::error::{MasterError, Result};
use dashmap::DashMap;
use ringsync_types::RingDigest;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Digest cache keyed by ring path.
#[derive(Debug, Default)]
pub struct DigestCache {
    entries: DashMap<PathBuf, (SystemTime, RingDigest)>,
}

impl DigestCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current digest of `path`.
    ///
    /// # Errors
    ///
    /// [`MasterError::Ring`] if the file cannot be stat'ed or read.
    pub async fn digest(&self, path: &Path) -> Result<RingDigest> {
        let err = |source: std::io::Error| MasterError::Ring {
            path: path.to_path_buf(),
            source,
        };
        let mtime = tokio::fs::metadata(path)
            .await
            .and_then(|m| m.modified())
            .map_err(err)?;

        if let Some(entry) = self.entries.get(path) {
            if entry.0 == mtime {
                return Ok(entry.1.clone());
            }
        }

        tracing::debug!(path = %path.display(), "updating md5");
        let owned = path.to_path_buf();
        let digest = tokio::task::spawn_blocking(move || RingDigest::of_file(&owned))
            .await?
            .map_err(err)?;
        self.entries
            .insert(path.to_path_buf(), (mtime, digest.clone()));
        Ok(digest)
    }

    /// Digest cached for `path`, without touching the filesystem.
    pub fn cached(&self, path: &Path) -> Option<RingDigest> {
        self.entries.get(path).map(|e| e.1.clone())
    }

    /// Number of cached rings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
