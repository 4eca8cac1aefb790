//! # ringsync-master
//!
//! HTTP server publishing Swift ring files to ring-minions.
//!
//! - `GET /ring/<file>` serves a ring with its md5 as `ETag`, or `304` when
//!   the request's `If-None-Match` already names that md5
//! - `HEAD /ring/<file>` answers with the `ETag` only
//! - `GET /health` reports status, version, served rings and uptime

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

use cache::DigestCache;
use config::MasterConfig;
use ringsync_types::RingDigest;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use config::Config;
pub use error::{MasterError, Result};

/// Shared server state.
#[derive(Debug)]
pub struct RingMaster {
    config: MasterConfig,
    cache: DigestCache,
}

impl RingMaster {
    /// Create a server for `config`.
    pub fn new(config: MasterConfig) -> Self {
        Self {
            config,
            cache: DigestCache::new(),
        }
    }

    /// Served ring file names.
    pub fn ring_files(&self) -> &[String] {
        &self.config.ring_files
    }

    /// Path of a served ring, or `None` if `file` is not served.
    pub fn ring_path(&self, file: &str) -> Option<PathBuf> {
        self.config
            .ring_files
            .iter()
            .any(|f| f == file)
            .then(|| self.config.swift_dir.join(file))
    }

    /// Current md5 of a served ring.
    pub async fn digest(&self, path: &std::path::Path) -> Result<RingDigest> {
        self.cache.digest(path).await
    }

    /// Warm the digest cache. Missing rings are skipped.
    pub async fn prime(&self) {
        for file in &self.config.ring_files {
            let path = self.config.swift_dir.join(file);
            match self.cache.digest(&path).await {
                Ok(digest) => tracing::info!(ring = %file, %digest, "Serving ring"),
                Err(e) if e.is_not_found() => tracing::warn!(ring = %file, "Ring not present yet"),
                Err(e) => tracing::error!(ring = %file, error = %e, "Cannot read ring"),
            }
        }
    }
}

/// Serve `master` on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    master: Arc<RingMaster>,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = http::build_router(master);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
