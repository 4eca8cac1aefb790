//! Health check endpoint.

use crate::RingMaster;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Global start time for uptime calculation.
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call once at startup).
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

/// One served ring.
#[derive(Debug, Clone, Serialize)]
pub struct RingStatus {
    /// File name under `/ring/`.
    pub file: String,
    /// Current md5, or `None` if the file cannot be read.
    pub md5: Option<String>,
}

/// Health status response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Overall status: `ok`, or `degraded` if any ring is unreadable.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Served rings.
    pub rings: Vec<RingStatus>,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Health check handler.
pub async fn health_handler(Extension(master): Extension<Arc<RingMaster>>) -> Json<HealthStatus> {
    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);

    let mut rings = Vec::with_capacity(master.ring_files().len());
    for file in master.ring_files() {
        let md5 = match master.ring_path(file) {
            Some(path) => master.digest(&path).await.ok().map(|d| d.to_string()),
            None => None,
        };
        rings.push(RingStatus {
            file: file.clone(),
            md5,
        });
    }
    let status = if rings.iter().all(|r| r.md5.is_some()) {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        rings,
        uptime_seconds: uptime,
    })
}
