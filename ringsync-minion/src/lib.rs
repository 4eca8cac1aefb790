//! # ringsync-minion
//!
//! Node-side daemon that keeps the local Swift rings in sync with a
//! ring-master.
//!
//! For each ring (`account`, `container`, `object`) the minion polls the
//! ring-master with a conditional GET. When a new ring arrives it is staged
//! next to the live file, checked against the server's md5 and decoded, the
//! live ring is backed up, and the new one is renamed into place.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!  ring-master ◄──┤ fetcher   (conditional GET)  │
//!                 │    │                         │
//!                 │    ▼                         │
//!                 │ controller ── CycleState ────┼── ringsync-core
//!                 │    │                         │
//!                 │    ├─ validator (md5, decode)│
//!                 │    ├─ backup    (copy, prune)│
//!                 │    └─ replace   (rename)     │
//!                 │                              │
//!                 │ scheduler (one loop per ring)│
//!                 └──────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backup;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod fetcher;
pub mod notify;
pub mod replace;
pub mod scheduler;
pub mod validator;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use controller::{CycleReport, RingSync};
pub use error::{Result, SyncError};
pub use scheduler::Minion;
