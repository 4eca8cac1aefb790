//! Poll scheduling: interval, jitter and optional backoff.
//!
//! Jitter keeps a fleet of nodes from polling the ring-master in lockstep
//! after a mass restart.

use std::time::Duration;

/// Largest exponent applied by backoff (2^16 intervals).
const MAX_BACKOFF_SHIFT: u32 = 16;

/// Exponential backoff on consecutive failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Upper bound on the base delay.
    pub max: Duration,
}

/// When to poll next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Base delay between cycles.
    pub interval: Duration,
    /// Random extra delay, uniformly drawn from `0..jitter`.
    pub jitter: Duration,
    /// Stretch the delay after failures. `None` keeps a fixed cadence.
    pub backoff: Option<Backoff>,
}

impl PollPolicy {
    /// Fixed interval, no jitter, no backoff.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            jitter: Duration::ZERO,
            backoff: None,
        }
    }

    /// Add random jitter.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Enable exponential backoff capped at `max`.
    pub fn with_backoff(mut self, max: Duration) -> Self {
        self.backoff = Some(Backoff { max });
        self
    }

    /// Delay before jitter.
    ///
    /// Without backoff this is always `interval`. With backoff it is
    /// `interval * 2^failures`, capped at `max` (but never below `interval`).
    pub fn base_delay(&self, consecutive_failures: u32) -> Duration {
        match self.backoff {
            None => self.interval,
            Some(Backoff { max }) if consecutive_failures > 0 => {
                let factor = 1u32 << consecutive_failures.min(MAX_BACKOFF_SHIFT);
                self.interval
                    .saturating_mul(factor)
                    .min(max.max(self.interval))
            }
            Some(_) => self.interval,
        }
    }

    /// Delay until the next cycle, jitter included.
    pub fn next_delay(&self, consecutive_failures: u32) -> Duration {
        self.base_delay(consecutive_failures) + random_below(self.jitter)
    }
}

/// Random delay before a ring's first cycle, uniformly drawn from `0..range`.
pub fn start_delay(range: Duration) -> Duration {
    random_below(range)
}

/// Random duration in `0..limit`, millisecond resolution.
fn random_below(limit: Duration) -> Duration {
    let limit_ms = limit.as_millis() as u64;
    if limit_ms == 0 {
        return Duration::ZERO;
    }
    let mut bytes = [0u8; 8];
    // No entropy means no jitter, not a failed poll.
    if getrandom::getrandom(&mut bytes).is_err() {
        return Duration::ZERO;
    }
    Duration::from_millis(u64::from_le_bytes(bytes) % limit_ms)
}
