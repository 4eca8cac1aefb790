//! Runs sync cycles for one ring.
//!
//! [`RingSync`] owns a ring's [`RingDescriptor`] and drives the
//! [`CycleState`] machine from `ringsync-core`, performing the I/O each
//! action asks for and feeding the result back in as the next event.
//! Filesystem work runs on the blocking pool.
//!
//! Whatever happens, the live ring is either the old file or a fully
//! validated new one, and no staged temp file outlives the cycle.

use crate::backup::{self, BackupRecord};
use crate::config::parent_dir;
use crate::error::{Result, SyncError};
use crate::fetcher::RingFetcher;
use crate::notify::{Alert, Notifier};
use crate::{replace, validator};
use ringsync_core::{
    Action, CycleState, Event, FailureKind, FetchOutcome, PollPolicy, RingDescriptor,
};
use ringsync_types::{RingDecoder, RingDigest};
use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempPath;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_ALERT_AFTER: u32 = 5;

/// What one cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Ring name.
    pub ring: String,
    /// Terminal state the cycle ended in.
    pub state: CycleState,
    /// Backup taken before the swap, if a live ring existed.
    pub backup: Option<BackupRecord>,
    /// Description of the failure, if the cycle failed.
    pub error: Option<String>,
    /// Failed cycles in a row, this one included.
    pub consecutive_failures: u32,
    /// Delay until the next cycle.
    pub next_delay: Duration,
}

impl CycleReport {
    /// A new ring went live.
    pub fn changed(&self) -> bool {
        matches!(self.state, CycleState::Swapped { .. })
    }

    /// Failure classification, if the cycle failed.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.state.failure_kind()
    }

    /// One summary line per cycle.
    pub fn log(&self) {
        match &self.state {
            CycleState::Swapped { digest } => {
                tracing::info!(ring = %self.ring, %digest, "{} updated", self.ring);
            }
            CycleState::Unchanged => {
                tracing::debug!(ring = %self.ring, "{} remains unchanged", self.ring);
            }
            state => {
                tracing::warn!(
                    ring = %self.ring,
                    kind = state.failure_kind().map_or("unexpected", |k| k.as_str()),
                    failures = self.consecutive_failures,
                    error = self.error.as_deref().unwrap_or(""),
                    "{} check/change failed!!",
                    self.ring
                );
            }
        }
    }
}

/// Scratch data carried between the actions of one cycle.
#[derive(Default)]
struct CycleScratch {
    bytes: Option<Vec<u8>>,
    staged: Option<TempPath>,
    backup: Option<BackupRecord>,
    error: Option<String>,
}

/// Sync loop body for one ring.
pub struct RingSync {
    descriptor: RingDescriptor,
    state: CycleState,
    fetcher: RingFetcher,
    decoder: Arc<dyn RingDecoder>,
    notifier: Arc<dyn Notifier>,
    policy: PollPolicy,
    alert_after_failures: u32,
}

impl RingSync {
    /// Create a controller for `descriptor`.
    ///
    /// Polls every 30 seconds and alerts after 5 failures in a row until
    /// configured otherwise.
    pub fn new(
        descriptor: RingDescriptor,
        fetcher: RingFetcher,
        decoder: Arc<dyn RingDecoder>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            descriptor,
            state: CycleState::new(),
            fetcher,
            decoder,
            notifier,
            policy: PollPolicy::new(DEFAULT_INTERVAL),
            alert_after_failures: DEFAULT_ALERT_AFTER,
        }
    }

    /// Set the poll cadence.
    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Alert once this many cycles in a row have failed. Zero disables.
    pub fn with_alert_after(mut self, failures: u32) -> Self {
        self.alert_after_failures = failures;
        self
    }

    /// What this controller knows about its ring.
    pub fn descriptor(&self) -> &RingDescriptor {
        &self.descriptor
    }

    /// State the last cycle ended in.
    pub fn state(&self) -> &CycleState {
        &self.state
    }

    /// Poll cadence.
    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Run one full cycle: fetch, and if a new ring arrived, validate,
    /// back up and swap it in.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut scratch = CycleScratch::default();
        let mut state = std::mem::take(&mut self.state).finish();
        let mut events = VecDeque::from([Event::Start]);

        while let Some(event) = events.pop_front() {
            let (next, actions) = state.on_event(event);
            state = next;
            for action in actions {
                if self.descriptor.apply(&action, SystemTime::now()) {
                    continue;
                }
                if let Some(event) = self.execute(action, &mut scratch).await {
                    events.push_back(event);
                }
            }
        }

        if !state.is_terminal() {
            tracing::error!(ring = self.descriptor.name(), state = state.name(), "Cycle stalled");
            let kind = FailureKind::Unexpected;
            self.descriptor.record_failure(kind);
            state = CycleState::FetchFailed { kind };
        }
        self.discard(&mut scratch).await;

        let failures = self.descriptor.consecutive_failures();
        if let Some(kind) = state.failure_kind() {
            // Failures that need attention were already alerted on.
            if !kind.needs_attention()
                && self.alert_after_failures > 0
                && failures == self.alert_after_failures
            {
                self.alert(kind, scratch.error.clone().unwrap_or_default()).await;
            }
        }

        let next_delay = self.policy.next_delay(failures);
        self.descriptor.schedule_next(SystemTime::now() + next_delay);
        self.state = state.clone();

        CycleReport {
            ring: self.descriptor.name().to_string(),
            state,
            backup: scratch.backup,
            error: scratch.error,
            consecutive_failures: failures,
            next_delay,
        }
    }

    async fn execute(&mut self, action: Action, scratch: &mut CycleScratch) -> Option<Event> {
        let ring = self.descriptor.name().to_string();
        match action {
            Action::Fetch => {
                let outcome = self
                    .fetcher
                    .fetch(&self.descriptor.file_name(), self.descriptor.known_digest())
                    .await;
                Some(match outcome {
                    FetchOutcome::Unchanged => Event::FetchUnchanged,
                    FetchOutcome::Received {
                        bytes,
                        server_digest,
                    } => {
                        scratch.bytes = Some(bytes);
                        Event::FetchReceived { server_digest }
                    }
                    FetchOutcome::ClientOrServerError(status) => {
                        scratch.error = Some(format!("ring-master returned status {status}"));
                        Event::FetchFailed {
                            kind: FailureKind::RemoteRejected,
                        }
                    }
                    FetchOutcome::TransportError(failure) => {
                        scratch.error = Some(failure.cause);
                        Event::FetchFailed { kind: failure.kind }
                    }
                })
            }

            Action::StageAndValidate { expected } => {
                let bytes = scratch.bytes.take().unwrap_or_default();
                let live = self.descriptor.path().to_path_buf();
                let decoder = Arc::clone(&self.decoder);
                let staged = run_blocking(move || {
                    stage_and_validate(&live, &bytes, &expected, decoder.as_ref())
                })
                .await;

                match staged {
                    Ok((path, validation)) => {
                        scratch.staged = Some(path);
                        match validator::verdict(&validation) {
                            Some(result) => {
                                if let Err(e) = validation {
                                    tracing::error!(
                                        ring = %ring,
                                        kind = e.kind().as_str(),
                                        error = %e,
                                        "Rejected new ring"
                                    );
                                    scratch.error = Some(e.to_string());
                                }
                                Some(Event::Validated(result))
                            }
                            None => {
                                let error = validation.err().map(|e| e.to_string());
                                tracing::error!(
                                    ring = %ring,
                                    error = error.as_deref().unwrap_or(""),
                                    "Failed to read staged ring"
                                );
                                scratch.error = error;
                                Some(Event::StageFailed)
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(ring = %ring, error = %e, "Failed to stage ring");
                        scratch.error = Some(e.to_string());
                        Some(Event::StageFailed)
                    }
                }
            }

            Action::DiscardStaged => {
                self.discard(scratch).await;
                None
            }

            Action::BackupAndReplace => {
                let Some(staged) = scratch.staged.take() else {
                    scratch.error = Some("no staged ring to install".into());
                    return Some(Event::SwapFailed {
                        kind: FailureKind::Unexpected,
                    });
                };
                let live = self.descriptor.path().to_path_buf();
                let backup_dir = self.descriptor.backup_dir().to_path_buf();
                let swap = move || backup_and_replace(&live, &backup_dir, staged);
                match run_blocking(swap).await {
                    Ok(record) => {
                        if let Some(record) = &record {
                            tracing::info!(
                                ring = %ring,
                                backup = %record.path.display(),
                                "Backed up live ring"
                            );
                        }
                        scratch.backup = record;
                        Some(Event::Swapped)
                    }
                    Err(e) => {
                        tracing::error!(
                            ring = %ring,
                            kind = e.kind().as_str(),
                            error = %e,
                            "Failed to install new ring"
                        );
                        scratch.error = Some(e.to_string());
                        Some(Event::SwapFailed { kind: e.kind() })
                    }
                }
            }

            Action::Alert { kind } => {
                self.alert(kind, scratch.error.clone().unwrap_or_default())
                    .await;
                None
            }

            Action::RecordUnchanged
            | Action::RecordSwapped { .. }
            | Action::RecordFailure { .. } => None,
        }
    }

    async fn discard(&self, scratch: &mut CycleScratch) {
        scratch.bytes = None;
        let Some(staged) = scratch.staged.take() else {
            return;
        };
        let path = staged.to_path_buf();
        let error = match tokio::task::spawn_blocking(move || staged.close()).await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(e) => e.to_string(),
        };
        tracing::warn!(
            ring = self.descriptor.name(),
            path = %path.display(),
            error = %error,
            "Failed to remove staged ring"
        );
    }

    async fn alert(&self, kind: FailureKind, message: String) {
        let alert = Alert::new(
            self.descriptor.name(),
            kind,
            self.descriptor.consecutive_failures(),
            message,
        );
        if let Err(e) = self.notifier.notify(&alert).await {
            tracing::warn!(ring = self.descriptor.name(), error = %e, "Alert delivery failed");
        }
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

/// Write `bytes` to a temp file next to `live` and validate it.
///
/// The outer error is a staging failure; the inner result is the verdict.
fn stage_and_validate(
    live: &Path,
    bytes: &[u8],
    expected: &RingDigest,
    decoder: &dyn RingDecoder,
) -> Result<(TempPath, Result<()>)> {
    let dir = parent_dir(live);
    let staged = stage(&dir, live, bytes).map_err(|source| SyncError::Stage { dir, source })?;
    let validation = validator::validate(&staged, expected, decoder);
    Ok((staged, validation))
}

fn stage(dir: &Path, live: &Path, bytes: &[u8]) -> std::io::Result<TempPath> {
    let name = live
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut file = tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".tmp")
        .tempfile_in(dir)?;
    for chunk in bytes.chunks(ringsync_types::CHUNK_SIZE) {
        file.write_all(chunk)?;
    }
    file.as_file().sync_all()?;
    Ok(file.into_temp_path())
}

/// Back up the live ring (if any), verify the copy, then swap in `staged`.
fn backup_and_replace(
    live: &Path,
    backup_dir: &Path,
    staged: TempPath,
) -> Result<Option<BackupRecord>> {
    let record = match RingDigest::of_file(live) {
        Ok(live_digest) => {
            let record = backup::backup(live, backup_dir)?;
            Some(verify_backup(record, live_digest)?)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(source) => {
            return Err(SyncError::Backup {
                path: PathBuf::from(live),
                source,
            })
        }
    };

    replace::replace(&staged, live)?;
    Ok(record)
}

/// Check a fresh backup against the live digest.
///
/// A copy that does not match is deleted.
fn verify_backup(record: BackupRecord, expected: RingDigest) -> Result<BackupRecord> {
    if record.digest == expected {
        return Ok(record);
    }
    if let Err(e) = std::fs::remove_file(&record.path) {
        tracing::warn!(path = %record.path.display(), error = %e, "Failed to remove bad backup");
    }
    Err(SyncError::BackupCorrupt {
        backup: record.path,
        expected,
        actual: record.digest,
    })
}
