//! The daemon: one loop per ring plus backup pruning.
//!
//! Each ring waits a random start delay, then runs a cycle every interval
//! (plus jitter, plus backoff when enabled). Every cycle runs in its own
//! task so a panic takes down one cycle, not the loop. A ring's
//! [`RingSync`] sits behind a mutex, so at most one cycle per ring is ever
//! in flight.

use crate::backup::{self, RetentionPolicy};
use crate::client::{HttpRingMaster, RingMasterClient};
use crate::config::{Config, ConfigError};
use crate::controller::{CycleReport, RingSync};
use crate::error::Result;
use crate::fetcher::RingFetcher;
use crate::notify::{NoopNotifier, Notifier, WebhookNotifier};
use ringsync_core::{start_delay, RingDescriptor};
use ringsync_types::{RingDecoder, RingDigest, SwiftRingDecoder};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, sleep};
use tokio_util::sync::CancellationToken;

/// A ring's controller, shared between its loop and its cycle tasks.
pub type SharedRing = Arc<Mutex<RingSync>>;

/// Backups of which rings to prune, and how.
#[derive(Debug, Clone)]
pub struct PruneJob {
    /// Backup directory.
    pub backup_dir: PathBuf,
    /// Ring file names whose backups are pruned.
    pub file_names: Vec<String>,
    /// What to keep.
    pub policy: RetentionPolicy,
}

impl PruneJob {
    /// Prune every ring once. Returns how many backups were removed.
    pub fn run(&self, now: SystemTime) -> std::io::Result<usize> {
        let mut removed = 0;
        for file_name in &self.file_names {
            removed += backup::prune(&self.backup_dir, file_name, &self.policy, now)?.len();
        }
        Ok(removed)
    }
}

/// The ring-minion daemon.
pub struct Minion {
    rings: Vec<SharedRing>,
    start_delay_range: Duration,
    prune_job: PruneJob,
    prune_interval: Duration,
    prune_enabled: bool,
}

impl Minion {
    /// Build a minion talking HTTP to the configured ring-master.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP clients cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = HttpRingMaster::new(&config.minion.ring_master, config.ring_master_timeout())?;
        let notifier: Arc<dyn Notifier> = match &config.notify.webhook_url {
            Some(url) => Arc::new(
                WebhookNotifier::new(url, config.ring_master_timeout())
                    .map_err(|e| ConfigError::Invalid(format!("webhook_url: {e}")))?,
            ),
            None => Arc::new(NoopNotifier),
        };
        Ok(Self::new(
            config,
            Arc::new(client),
            Arc::new(SwiftRingDecoder),
            notifier,
        ))
    }

    /// Build a minion from its parts.
    ///
    /// Each ring starts out knowing the digest of its live file, if there is one.
    pub fn new(
        config: &Config,
        client: Arc<dyn RingMasterClient>,
        decoder: Arc<dyn RingDecoder>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let fetcher = RingFetcher::new(client);
        let backup_dir = config.backup_dir();
        let policy = config.poll_policy();

        let mut rings = Vec::new();
        let mut file_names = Vec::new();
        for (name, path) in config.ring_paths() {
            let known = match RingDigest::of_file(&path) {
                Ok(digest) => Some(digest),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => {
                    tracing::warn!(
                        ring = name,
                        path = %path.display(),
                        error = %e,
                        "Cannot read live ring"
                    );
                    None
                }
            };
            let descriptor = RingDescriptor::new(name, path, &backup_dir).with_known_digest(known);
            file_names.push(descriptor.file_name());

            let sync = RingSync::new(
                descriptor,
                fetcher.clone(),
                Arc::clone(&decoder),
                Arc::clone(&notifier),
            )
            .with_policy(policy)
            .with_alert_after(config.notify.alert_after_failures);
            rings.push(Arc::new(Mutex::new(sync)));
        }

        Self {
            rings,
            start_delay_range: config.start_delay_range(),
            prune_job: PruneJob {
                backup_dir,
                file_names,
                policy: config.retention(),
            },
            prune_interval: Duration::from_secs(config.backup.prune_interval_secs),
            prune_enabled: config.backup.prune_enabled,
        }
    }

    /// The managed rings, in polling order.
    pub fn rings(&self) -> &[SharedRing] {
        &self.rings
    }

    /// Run one cycle for every ring, one ring at a time.
    pub async fn run_once(&self) -> Vec<CycleReport> {
        let mut reports = Vec::with_capacity(self.rings.len());
        for ring in &self.rings {
            let report = ring.lock().await.run_cycle().await;
            report.log();
            reports.push(report);
        }
        reports
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Cancellation stops new cycles from starting; a cycle already in
    /// flight runs to completion first.
    pub async fn run_forever(self, shutdown: CancellationToken) {
        let prune = spawn_prune_task(
            self.prune_job.clone(),
            self.prune_interval,
            self.prune_enabled,
            shutdown.clone(),
        );

        let mut loops = JoinSet::new();
        for ring in &self.rings {
            loops.spawn(ring_loop(
                Arc::clone(ring),
                self.start_delay_range,
                shutdown.clone(),
            ));
        }

        while let Some(result) = loops.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Ring loop ended abnormally");
            }
        }
        if let Err(e) = prune.await {
            tracing::error!(error = %e, "Prune task ended abnormally");
        }
        tracing::info!("All ring loops stopped");
    }
}

/// Poll one ring until shutdown.
pub async fn ring_loop(sync: SharedRing, start_delay_range: Duration, shutdown: CancellationToken) {
    let name = sync.lock().await.descriptor().name().to_string();
    let delay = start_delay(start_delay_range);
    tracing::info!(ring = %name, delay_ms = delay.as_millis() as u64, "Ring loop starting");

    tokio::select! {
        biased;
        _ = shutdown.cancelled() => return,
        _ = sleep(delay) => {}
    }

    loop {
        if shutdown.is_cancelled() {
            break;
        }
        let task_sync = Arc::clone(&sync);
        let cycle = tokio::spawn(async move { task_sync.lock().await.run_cycle().await });

        let delay = match cycle.await {
            Ok(report) => {
                report.log();
                report.next_delay
            }
            Err(e) => {
                tracing::error!(ring = %name, error = %e, "Error in watch loop");
                let guard = sync.lock().await;
                guard
                    .policy()
                    .next_delay(guard.descriptor().consecutive_failures())
            }
        };

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = sleep(delay) => {}
        }
    }
    tracing::info!(ring = %name, "Ring loop stopped");
}

/// Spawn a background task pruning old backups.
///
/// Returns a handle that completes after `shutdown` is cancelled.
pub fn spawn_prune_task(
    job: PruneJob,
    every: Duration,
    enabled: bool,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if !enabled {
            tracing::info!("Prune task disabled");
            return;
        }

        tracing::info!("Prune task started (interval: {}s)", every.as_secs());
        let mut timer = interval(every.max(Duration::from_secs(1)));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            let job = job.clone();
            match tokio::task::spawn_blocking(move || job.run(SystemTime::now())).await {
                Ok(Ok(0)) => tracing::debug!("Prune: no backups removed"),
                Ok(Ok(removed)) => tracing::info!("Prune: removed {} old backups", removed),
                Ok(Err(e)) => tracing::error!("Prune error: {}", e),
                Err(e) => tracing::error!("Prune error: {}", e),
            }
        }
        tracing::info!("Prune task stopped");
    })
}
