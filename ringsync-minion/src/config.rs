//! Configuration loading for ring-minion.
//!
//! Configuration is loaded from a TOML file (default:
//! `/etc/swift/ring-minion.toml`). Every section and every key is optional.

use ringsync_core::PollPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backup::RetentionPolicy;

/// Root configuration for ring-minion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Daemon configuration.
    #[serde(default)]
    pub minion: MinionConfig,
    /// Per-ring path overrides.
    #[serde(default)]
    pub rings: RingsConfig,
    /// Backup and retention configuration.
    #[serde(default)]
    pub backup: BackupConfig,
    /// Backoff after failed cycles.
    #[serde(default)]
    pub backoff: BackoffConfig,
    /// Operator alerts.
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MinionConfig {
    /// Directory holding the live rings (default: /etc/swift).
    #[serde(default = "default_swift_dir")]
    pub swift_dir: PathBuf,
    /// Base URL of the ring-master (default: http://127.0.0.1:8090/).
    #[serde(default = "default_ring_master")]
    pub ring_master: String,
    /// Per-request timeout in seconds (default: 30).
    #[serde(default = "default_ring_master_timeout")]
    pub ring_master_timeout_secs: u64,
    /// Seconds between cycles for each ring (default: 30).
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// Upper bound of the random delay before the first cycle (default: 120).
    #[serde(default = "default_start_delay_range")]
    pub start_delay_range_secs: u64,
    /// Upper bound of the random extra delay added to each interval (default: 5).
    #[serde(default = "default_jitter")]
    pub jitter_secs: u64,
    /// Log at debug level (default: false).
    #[serde(default)]
    pub debug: bool,
}

/// Per-ring path overrides. Unset rings live at `<swift_dir>/<name>.ring.gz`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RingsConfig {
    /// Account ring path.
    pub account: Option<PathBuf>,
    /// Container ring path.
    pub container: Option<PathBuf>,
    /// Object ring path.
    pub object: Option<PathBuf>,
}

/// Backup and retention configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    /// Backup directory (default: `<swift_dir>/backups`).
    pub dir: Option<PathBuf>,
    /// Backups kept per ring (default: 10).
    #[serde(default = "default_retain_count")]
    pub retain_count: usize,
    /// Remove backups older than this many seconds (default: never).
    pub max_age_secs: Option<u64>,
    /// Seconds between pruning passes (default: 3600 = 1 hour).
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,
    /// Enable the pruning task (default: true).
    #[serde(default = "default_prune_enabled")]
    pub prune_enabled: bool,
}

/// Backoff configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BackoffConfig {
    /// Double the interval after each consecutive failure (default: false).
    #[serde(default)]
    pub enabled: bool,
    /// Longest delay between cycles in seconds (default: 600).
    #[serde(default = "default_backoff_max")]
    pub max_secs: u64,
}

/// Operator alert configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// POST alerts to this URL as JSON. Alerts are only logged when unset.
    pub webhook_url: Option<String>,
    /// Alert once a ring has failed this many cycles in a row (default: 5).
    #[serde(default = "default_alert_after_failures")]
    pub alert_after_failures: u32,
}

// Default value functions
fn default_swift_dir() -> PathBuf {
    PathBuf::from("/etc/swift")
}

fn default_ring_master() -> String {
    "http://127.0.0.1:8090/".to_string()
}

fn default_ring_master_timeout() -> u64 {
    30
}

fn default_check_interval() -> u64 {
    30
}

fn default_start_delay_range() -> u64 {
    120
}

fn default_jitter() -> u64 {
    5
}

fn default_retain_count() -> usize {
    10
}

fn default_prune_interval() -> u64 {
    3600 // 1 hour
}

fn default_prune_enabled() -> bool {
    true
}

fn default_backoff_max() -> u64 {
    600 // 10 minutes
}

fn default_alert_after_failures() -> u32 {
    5
}

impl Default for MinionConfig {
    fn default() -> Self {
        Self {
            swift_dir: default_swift_dir(),
            ring_master: default_ring_master(),
            ring_master_timeout_secs: default_ring_master_timeout(),
            check_interval_secs: default_check_interval(),
            start_delay_range_secs: default_start_delay_range(),
            jitter_secs: default_jitter(),
            debug: false,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: None,
            retain_count: default_retain_count(),
            max_age_secs: None,
            prune_interval_secs: default_prune_interval(),
            prune_enabled: default_prune_enabled(),
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_secs: default_backoff_max(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            alert_after_failures: default_alert_after_failures(),
        }
    }
}

/// Names of the managed rings, in polling order.
pub const RING_NAMES: [&str; 3] = ["account", "container", "object"];

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Configuration for a minion managing `swift_dir`, everything else default.
    pub fn for_swift_dir(swift_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.minion.swift_dir = swift_dir.into();
        config
    }

    /// Live ring paths by name, in polling order.
    pub fn ring_paths(&self) -> Vec<(&'static str, PathBuf)> {
        RING_NAMES
            .iter()
            .map(|&name| {
                let configured = match name {
                    "account" => self.rings.account.clone(),
                    "container" => self.rings.container.clone(),
                    _ => self.rings.object.clone(),
                };
                let path = configured.unwrap_or_else(|| {
                    self.minion.swift_dir.join(format!("{name}.ring.gz"))
                });
                (name, path)
            })
            .collect()
    }

    /// Where backups are written.
    pub fn backup_dir(&self) -> PathBuf {
        self.backup
            .dir
            .clone()
            .unwrap_or_else(|| self.minion.swift_dir.join("backups"))
    }

    /// Per-request timeout for the ring-master.
    pub fn ring_master_timeout(&self) -> Duration {
        Duration::from_secs(self.minion.ring_master_timeout_secs)
    }

    /// Upper bound of the random delay before each ring's first cycle.
    pub fn start_delay_range(&self) -> Duration {
        Duration::from_secs(self.minion.start_delay_range_secs)
    }

    /// Cadence of the per-ring loops.
    pub fn poll_policy(&self) -> PollPolicy {
        let policy = PollPolicy::new(Duration::from_secs(self.minion.check_interval_secs))
            .with_jitter(Duration::from_secs(self.minion.jitter_secs));
        if self.backoff.enabled {
            policy.with_backoff(Duration::from_secs(self.backoff.max_secs))
        } else {
            policy
        }
    }

    /// Which backups survive a pruning pass.
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            retain_count: self.backup.retain_count,
            max_age: self.backup.max_age_secs.map(Duration::from_secs),
        }
    }

    /// Check the configuration against the local filesystem.
    ///
    /// The daemon refuses to start if it could never install a ring: every
    /// ring directory must accept new files and the ring-master URL must be
    /// an http(s) URL.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.minion.ring_master).map_err(|e| {
            ConfigError::InvalidRingMaster {
                url: self.minion.ring_master.clone(),
                reason: e.to_string(),
            }
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidRingMaster {
                url: self.minion.ring_master.clone(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }

        if self.minion.check_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "check_interval_secs must be greater than zero".into(),
            ));
        }

        let mut checked: Vec<PathBuf> = Vec::new();
        for (_, path) in self.ring_paths() {
            let dir = parent_dir(&path);
            if checked.contains(&dir) {
                continue;
            }
            // Probe with a real file: permission bits alone miss read-only mounts.
            tempfile::tempfile_in(&dir)
                .map_err(|e| ConfigError::NotWritable { path: dir.clone(), source: e })?;
            checked.push(dir);
        }
        Ok(())
    }
}

/// Directory containing `path`; `.` for bare file names.
pub(crate) fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A ring directory does not accept new files.
    #[error("swift_dir is not writable: {path}: {source}")]
    NotWritable {
        /// The directory.
        path: PathBuf,
        /// Error from the write probe.
        source: std::io::Error,
    },
    /// The ring-master URL is unusable.
    #[error("invalid ring_master {url}: {reason}")]
    InvalidRingMaster {
        /// Configured value.
        url: String,
        /// What is wrong with it.
        reason: String,
    },
    /// Any other invalid value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
