//! Sync cycle state machine for one ring.
//!
//! Pure and side-effect-free: it takes events and produces a new state plus
//! a list of actions. `ringsync-minion` performs the actions (HTTP fetch,
//! staging, validation, backup, rename) and feeds the results back in as
//! events.
//!
//! ```text
//! Idle ─Start─► Fetching ─┬─► Unchanged
//!                         ├─► FetchFailed
//!                         └─► Validating ─┬─► ValidationFailed
//!                                         ├─► SwapFailed   (staging write failed)
//!                                         └─► Staging ─┬─► Swapped
//!                                                      └─► SwapFailed
//! ```
//!
//! Every terminal state accepts `Start` again, which is the same as starting
//! from `Idle`.

use crate::outcome::{FailureKind, ValidationResult};
use ringsync_types::RingDigest;

/// Position of one ring within its current sync cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CycleState {
    /// Waiting for the next scheduled cycle.
    #[default]
    Idle,
    /// Conditional request to the ring-master in flight.
    Fetching,
    /// Ring-master reported no change.
    Unchanged,
    /// Bytes received and being staged and checked.
    Validating {
        /// Digest the server claims for the bytes.
        expected: RingDigest,
    },
    /// Staged ring is valid; backing up the live file and swapping.
    Staging {
        /// Digest of the ring being promoted.
        digest: RingDigest,
    },
    /// Live ring replaced.
    Swapped {
        /// Digest of the new live ring.
        digest: RingDigest,
    },
    /// Fetch did not produce a candidate.
    FetchFailed {
        /// Classification of the failure.
        kind: FailureKind,
    },
    /// Candidate rejected; live ring untouched.
    ValidationFailed {
        /// [`FailureKind::ContentMismatch`] or [`FailureKind::StructuralInvalid`].
        kind: FailureKind,
    },
    /// Staging, backup or rename failed; live ring untouched.
    SwapFailed {
        /// Classification of the failure.
        kind: FailureKind,
    },
}

impl CycleState {
    /// Create a state machine in the Idle state.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// Actions are executed in order by the caller.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // Start of a cycle, from Idle or the end of the previous one
            (state, Event::Start) if state.is_idle() || state.is_terminal() => {
                (Self::Fetching, vec![Action::Fetch])
            }

            // From Fetching
            (Self::Fetching, Event::FetchUnchanged) => {
                (Self::Unchanged, vec![Action::RecordUnchanged])
            }
            (Self::Fetching, Event::FetchReceived { server_digest }) => (
                Self::Validating {
                    expected: server_digest.clone(),
                },
                vec![Action::StageAndValidate {
                    expected: server_digest,
                }],
            ),
            (Self::Fetching, Event::FetchFailed { kind }) => (
                Self::FetchFailed { kind },
                vec![Action::RecordFailure { kind }],
            ),

            // From Validating
            (Self::Validating { expected }, Event::Validated(result)) => {
                match result.failure_kind() {
                    None => (
                        Self::Staging { digest: expected },
                        vec![Action::BackupAndReplace],
                    ),
                    Some(kind) => (
                        Self::ValidationFailed { kind },
                        failure_actions(kind),
                    ),
                }
            }
            (Self::Validating { .. }, Event::StageFailed) => {
                let kind = FailureKind::LocalIoFailure;
                (Self::SwapFailed { kind }, failure_actions(kind))
            }

            // From Staging
            (Self::Staging { digest }, Event::Swapped) => (
                Self::Swapped {
                    digest: digest.clone(),
                },
                vec![Action::RecordSwapped { digest }],
            ),
            (Self::Staging { .. }, Event::SwapFailed { kind }) => {
                (Self::SwapFailed { kind }, failure_actions(kind))
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Return to Idle if the cycle has ended.
    pub fn finish(self) -> Self {
        if self.is_terminal() {
            Self::Idle
        } else {
            self
        }
    }

    /// Check if waiting for a cycle to start.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Check if the current cycle has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Unchanged
                | Self::Swapped { .. }
                | Self::FetchFailed { .. }
                | Self::ValidationFailed { .. }
                | Self::SwapFailed { .. }
        )
    }

    /// Failure classification of a failed terminal state.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::FetchFailed { kind }
            | Self::ValidationFailed { kind }
            | Self::SwapFailed { kind } => Some(*kind),
            _ => None,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Unchanged => "unchanged",
            Self::Validating { .. } => "validating",
            Self::Staging { .. } => "staging",
            Self::Swapped { .. } => "swapped",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::ValidationFailed { .. } => "validation_failed",
            Self::SwapFailed { .. } => "swap_failed",
        }
    }
}

fn failure_actions(kind: FailureKind) -> Vec<Action> {
    vec![
        Action::DiscardStaged,
        Action::RecordFailure { kind },
        Action::Alert { kind },
    ]
}

/// Results fed back into the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Scheduled time reached.
    Start,
    /// Ring-master answered 304.
    FetchUnchanged,
    /// Ring-master answered 200 with a body.
    FetchReceived {
        /// Digest from the `ETag` header.
        server_digest: RingDigest,
    },
    /// The fetch failed.
    FetchFailed {
        /// Classification of the failure.
        kind: FailureKind,
    },
    /// Writing the received bytes to a temp file failed.
    StageFailed,
    /// Staged file checked.
    Validated(ValidationResult),
    /// Backup taken and live file replaced.
    Swapped,
    /// Backup or rename failed.
    SwapFailed {
        /// Classification of the failure.
        kind: FailureKind,
    },
}

/// Work for the controller.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Conditional fetch using the descriptor's known digest.
    Fetch,
    /// Write the received bytes to a temp file next to the live ring, then
    /// check digest and structure.
    StageAndValidate {
        /// Digest the bytes must have.
        expected: RingDigest,
    },
    /// Remove the staged temp file.
    DiscardStaged,
    /// Back up the live ring, then atomically replace it with the staged one.
    BackupAndReplace,
    /// Note a successful no-change check on the descriptor.
    RecordUnchanged,
    /// Note a completed swap on the descriptor.
    RecordSwapped {
        /// Digest of the new live ring.
        digest: RingDigest,
    },
    /// Bump the descriptor's failure counter.
    RecordFailure {
        /// Classification of the failure.
        kind: FailureKind,
    },
    /// Tell operators.
    Alert {
        /// Classification of the failure.
        kind: FailureKind,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest() -> RingDigest {
        RingDigest::of_bytes(b"ring")
    }

    #[test]
    fn starts_idle() {
        assert!(CycleState::new().is_idle());
    }

    #[test]
    fn start_transitions_to_fetching() {
        let (state, actions) = CycleState::Idle.on_event(Event::Start);
        assert_eq!(state, CycleState::Fetching);
        assert_eq!(actions, vec![Action::Fetch]);
    }

    #[test]
    fn unchanged_records_success_only() {
        let (state, actions) = CycleState::Fetching.on_event(Event::FetchUnchanged);
        assert_eq!(state, CycleState::Unchanged);
        assert_eq!(actions, vec![Action::RecordUnchanged]);
    }

    #[test]
    fn fetch_failure_touches_nothing() {
        let (state, actions) = CycleState::Fetching.on_event(Event::FetchFailed {
            kind: FailureKind::NetworkUnavailable,
        });
        assert_eq!(
            state,
            CycleState::FetchFailed {
                kind: FailureKind::NetworkUnavailable
            }
        );
        assert_eq!(
            actions,
            vec![Action::RecordFailure {
                kind: FailureKind::NetworkUnavailable
            }]
        );
    }

    #[test]
    fn received_bytes_are_staged_and_validated() {
        let (state, actions) = CycleState::Fetching.on_event(Event::FetchReceived {
            server_digest: digest(),
        });
        assert!(matches!(state, CycleState::Validating { ref expected } if *expected == digest()));
        assert_eq!(
            actions,
            vec![Action::StageAndValidate { expected: digest() }]
        );
    }

    #[test]
    fn valid_ring_moves_to_staging() {
        let state = CycleState::Validating { expected: digest() };
        let (state, actions) = state.on_event(Event::Validated(ValidationResult::Valid));
        assert_eq!(state, CycleState::Staging { digest: digest() });
        assert_eq!(actions, vec![Action::BackupAndReplace]);
    }

    #[test]
    fn digest_mismatch_discards_and_alerts() {
        let state = CycleState::Validating { expected: digest() };
        let (state, actions) =
            state.on_event(Event::Validated(ValidationResult::DigestMismatch));

        assert_eq!(
            state,
            CycleState::ValidationFailed {
                kind: FailureKind::ContentMismatch
            }
        );
        assert_eq!(actions[0], Action::DiscardStaged);
        assert!(actions.contains(&Action::Alert {
            kind: FailureKind::ContentMismatch
        }));
        assert!(!actions.contains(&Action::BackupAndReplace));
    }

    #[test]
    fn invalid_structure_discards_and_alerts() {
        let state = CycleState::Validating { expected: digest() };
        let (state, actions) =
            state.on_event(Event::Validated(ValidationResult::StructurallyInvalid));

        assert_eq!(
            state.failure_kind(),
            Some(FailureKind::StructuralInvalid)
        );
        assert!(actions.contains(&Action::DiscardStaged));
        assert!(actions.contains(&Action::RecordFailure {
            kind: FailureKind::StructuralInvalid
        }));
    }

    #[test]
    fn staging_write_failure_is_swap_failure() {
        let state = CycleState::Validating { expected: digest() };
        let (state, _) = state.on_event(Event::StageFailed);
        assert_eq!(
            state,
            CycleState::SwapFailed {
                kind: FailureKind::LocalIoFailure
            }
        );
    }

    #[test]
    fn swap_records_new_digest() {
        let state = CycleState::Staging { digest: digest() };
        let (state, actions) = state.on_event(Event::Swapped);
        assert_eq!(state, CycleState::Swapped { digest: digest() });
        assert_eq!(actions, vec![Action::RecordSwapped { digest: digest() }]);
    }

    #[test]
    fn swap_failure_records_failure() {
        let state = CycleState::Staging { digest: digest() };
        let (state, actions) = state.on_event(Event::SwapFailed {
            kind: FailureKind::LocalIoFailure,
        });
        assert_eq!(state.failure_kind(), Some(FailureKind::LocalIoFailure));
        assert!(!actions
            .iter()
            .any(|a| matches!(a, Action::RecordSwapped { .. })));
    }

    #[test]
    fn terminal_states_accept_next_start() {
        let terminals = vec![
            CycleState::Unchanged,
            CycleState::Swapped { digest: digest() },
            CycleState::FetchFailed {
                kind: FailureKind::RemoteRejected,
            },
            CycleState::ValidationFailed {
                kind: FailureKind::ContentMismatch,
            },
            CycleState::SwapFailed {
                kind: FailureKind::LocalIoFailure,
            },
        ];
        for state in terminals {
            assert!(state.is_terminal());
            assert!(state.clone().finish().is_idle());
            let (next, _) = state.on_event(Event::Start);
            assert_eq!(next, CycleState::Fetching);
        }
    }

    #[test]
    fn start_is_ignored_mid_cycle() {
        let (state, actions) = CycleState::Fetching.on_event(Event::Start);
        assert_eq!(state, CycleState::Fetching);
        assert!(actions.is_empty());

        let staging = CycleState::Staging { digest: digest() };
        let (state, actions) = staging.clone().on_event(Event::Start);
        assert_eq!(state, staging);
        assert!(actions.is_empty());
    }

    #[test]
    fn out_of_order_events_are_ignored() {
        let (state, actions) = CycleState::Idle.on_event(Event::Swapped);
        assert!(state.is_idle());
        assert!(actions.is_empty());

        let (state, actions) =
            CycleState::Fetching.on_event(Event::Validated(ValidationResult::Valid));
        assert_eq!(state, CycleState::Fetching);
        assert!(actions.is_empty());
    }

    #[test]
    fn full_happy_path() {
        let (state, _) = CycleState::Idle.on_event(Event::Start);
        let (state, _) = state.on_event(Event::FetchReceived {
            server_digest: digest(),
        });
        let (state, _) = state.on_event(Event::Validated(ValidationResult::Valid));
        let (state, actions) = state.on_event(Event::Swapped);

        assert_eq!(state.name(), "swapped");
        assert_eq!(actions, vec![Action::RecordSwapped { digest: digest() }]);
        assert!(state.finish().is_idle());
    }
}
