//! Operator alerts.
//!
//! A ring that keeps failing, or fails in a way that points at corruption,
//! is worth more than a log line. Alerts go through [`Notifier`]; delivery
//! failures are logged and never affect the sync cycle.

use async_trait::async_trait;
use ringsync_core::FailureKind;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Alert delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The webhook could not be reached.
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The webhook answered with an error status.
    #[error("webhook returned status {0}")]
    Status(u16),
}

/// One alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    /// Ring name.
    pub ring: String,
    /// Failure classification.
    pub kind: String,
    /// Failed cycles in a row, this one included.
    pub consecutive_failures: u32,
    /// One-line summary.
    pub subject: String,
    /// Details.
    pub message: String,
}

impl Alert {
    /// Build an alert for a failed cycle.
    pub fn new(ring: &str, kind: FailureKind, consecutive_failures: u32, message: String) -> Self {
        let subject = if consecutive_failures > 1 {
            format!("{ring} ring sync failed {consecutive_failures} times in a row ({kind})")
        } else {
            format!("{ring} ring sync failed ({kind})")
        };
        Self {
            ring: ring.to_string(),
            kind: kind.as_str().to_string(),
            consecutive_failures,
            subject,
            message,
        }
    }
}

/// Delivers alerts.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one alert.
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError>;
}

/// Drops alerts; the failure is still in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _alert: &Alert) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// POSTs alerts as JSON.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// Create a notifier posting to `url`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(alert).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Status(status.as_u16()))
        }
    }
}

/// Keeps alerts in memory. For testing.
#[derive(Debug, Default, Clone)]
pub struct MemoryNotifier {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl MemoryNotifier {
    /// Create an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts received so far.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        self.alerts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(alert.clone());
        Ok(())
    }
}
