//! # ringsync-core
//!
//! Pure logic for ringsync (no I/O, instant tests).
//!
//! This crate holds the per-ring sync cycle state machine and the data it
//! works on, without any network or disk I/O:
//!
//! - [`CycleState`] - fetch → validate → swap lifecycle of one ring
//! - [`RingDescriptor`] - what a node knows about one managed ring
//! - [`FetchOutcome`], [`ValidationResult`], [`FailureKind`] - classified results
//! - [`PollPolicy`] - poll interval, jitter and optional backoff
//!
//! The actual I/O (HTTP, staging, backups, renames) is performed by
//! `ringsync-minion`, which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod descriptor;
pub mod outcome;
pub mod schedule;
pub mod state;

pub use descriptor::RingDescriptor;
pub use outcome::{FailureKind, FetchFailure, FetchOutcome, ValidationResult};
pub use schedule::{start_delay, Backoff, PollPolicy};
pub use state::{Action, CycleState, Event};
