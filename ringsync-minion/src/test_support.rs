//! Shared helpers for unit tests.

use ringsync_types::{Device, RingData};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// Log records captured on the current thread.
#[derive(Clone, Default)]
pub(crate) struct CapturedLogs {
    records: Arc<Mutex<Vec<(Level, String)>>>,
}

impl CapturedLogs {
    /// Capture everything logged on this thread until the guard drops.
    ///
    /// Use with the default current-thread `#[tokio::test]` runtime so that
    /// spawned tasks log on the same thread.
    pub(crate) fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let logs = Self::default();
        let subscriber = tracing_subscriber::registry().with(logs.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (logs, guard)
    }

    /// How many records at `level` have exactly this message.
    pub(crate) fn count(&self, level: Level, message: &str) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, m)| *l == level && m == message)
            .count()
    }

    /// How many records have exactly this message, any level.
    pub(crate) fn count_any(&self, message: &str) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, m)| m == message)
            .count()
    }
}

impl<S: Subscriber> Layer<S> for CapturedLogs {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.records
            .lock()
            .unwrap()
            .push((*event.metadata().level(), visitor.0));
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0 = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

/// Gzip'd bytes of a small valid ring.
pub(crate) fn ring_bytes(devices: u16) -> Vec<u8> {
    let devs = (0..devices)
        .map(|id| Device::new(id, "10.0.0.1", 6200 + id, format!("sd{id}")))
        .collect();
    RingData::round_robin(devs, 4, 3).to_gzip_bytes().unwrap()
}
