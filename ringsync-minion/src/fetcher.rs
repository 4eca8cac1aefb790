//! Conditional fetch of one ring from the ring-master.
//!
//! Turns whatever the client returns into a [`FetchOutcome`] and logs it.
//! The messages are stable: operators grep for them.
//!
//! | Answer                         | Outcome                  | Level | Message                                   |
//! |--------------------------------|--------------------------|-------|-------------------------------------------|
//! | 304                            | `Unchanged`              | debug | Ring-master reports ring unchanged.       |
//! | 200 with ETag                  | `Received`               |       |                                           |
//! | other status below 400         | `ClientOrServerError`    | warn  | Received non 200 status code              |
//! | status 400 and up              | `ClientOrServerError`    | error | Error communicating with ring-master      |
//! | no answer                      | `TransportError`         | error | Error communicating with ring-master      |
//! | anything else (200 w/o ETag)   | `TransportError`         | error | Error retrieving or checking on ring      |

use crate::client::{ClientError, RingMasterClient};
use ringsync_core::{FailureKind, FetchFailure, FetchOutcome};
use ringsync_types::RingDigest;
use std::sync::Arc;

/// Fetches rings through a [`RingMasterClient`].
#[derive(Clone)]
pub struct RingFetcher {
    client: Arc<dyn RingMasterClient>,
}

impl RingFetcher {
    /// Create a fetcher using `client`.
    pub fn new(client: Arc<dyn RingMasterClient>) -> Self {
        Self { client }
    }

    /// Ask the ring-master for `ring_file`, conditional on `known_digest`.
    ///
    /// Never fails: every problem is folded into the outcome.
    pub async fn fetch(&self, ring_file: &str, known_digest: Option<&RingDigest>) -> FetchOutcome {
        tracing::debug!(ring = ring_file, "Checking on ring");

        let response = match self.client.get_ring(ring_file, known_digest).await {
            Ok(response) => response,
            Err(ClientError::Transport(cause)) => {
                tracing::error!(
                    ring = ring_file,
                    kind = FailureKind::NetworkUnavailable.as_str(),
                    %cause,
                    "Error communicating with ring-master"
                );
                return FetchOutcome::TransportError(FetchFailure::network(cause));
            }
            Err(ClientError::Other(cause)) => {
                tracing::error!(
                    ring = ring_file,
                    kind = FailureKind::Unexpected.as_str(),
                    %cause,
                    "Error retrieving or checking on ring"
                );
                return FetchOutcome::TransportError(FetchFailure::unexpected(cause));
            }
        };

        match response.status {
            304 => {
                tracing::debug!(ring = ring_file, "Ring-master reports ring unchanged.");
                FetchOutcome::Unchanged
            }
            200 => match response.etag {
                Some(etag) => FetchOutcome::Received {
                    bytes: response.body,
                    server_digest: RingDigest::new(etag),
                },
                None => {
                    let cause = "200 response without ETag";
                    tracing::error!(
                        ring = ring_file,
                        kind = FailureKind::Unexpected.as_str(),
                        cause,
                        "Error retrieving or checking on ring"
                    );
                    FetchOutcome::TransportError(FetchFailure::unexpected(cause))
                }
            },
            status if status >= 400 => {
                tracing::error!(
                    ring = ring_file,
                    kind = FailureKind::RemoteRejected.as_str(),
                    status,
                    "Error communicating with ring-master"
                );
                FetchOutcome::ClientOrServerError(status)
            }
            status => {
                tracing::warn!(
                    ring = ring_file,
                    kind = FailureKind::RemoteRejected.as_str(),
                    status,
                    "Received non 200 status code"
                );
                FetchOutcome::ClientOrServerError(status)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockRingMaster, RingResponse};
    use crate::test_support::CapturedLogs;
    use tracing::Level;

    fn fetcher() -> (RingFetcher, MockRingMaster) {
        let mock = MockRingMaster::new();
        (RingFetcher::new(Arc::new(mock.clone())), mock)
    }

    #[tokio::test]
    async fn not_modified_is_unchanged() {
        let (logs, _guard) = CapturedLogs::install();
        let (fetcher, mock) = fetcher();
        mock.queue_response(RingResponse::not_modified());
        let known = RingDigest::of_bytes(b"ring");

        let outcome = fetcher.fetch("object.ring.gz", Some(&known)).await;

        assert_eq!(outcome, FetchOutcome::Unchanged);
        assert_eq!(logs.count(Level::DEBUG, "Ring-master reports ring unchanged."), 1);
        assert_eq!(mock.requests()[0].if_none_match, Some(known));
    }

    #[tokio::test]
    async fn ok_carries_bytes_and_normalized_etag() {
        let (fetcher, mock) = fetcher();
        let digest = RingDigest::of_bytes(b"ring");
        mock.queue_response(RingResponse::ok(
            b"ring".to_vec(),
            format!("\"{}\"", digest.as_str().to_uppercase()),
        ));

        let outcome = fetcher.fetch("object.ring.gz", None).await;

        assert_eq!(
            outcome,
            FetchOutcome::Received {
                bytes: b"ring".to_vec(),
                server_digest: digest,
            }
        );
    }

    #[tokio::test]
    async fn status_203_warns_once() {
        let (logs, _guard) = CapturedLogs::install();
        let (fetcher, mock) = fetcher();
        mock.queue_response(RingResponse::status(203));

        let outcome = fetcher.fetch("object.ring.gz", None).await;

        assert_eq!(outcome, FetchOutcome::ClientOrServerError(203));
        assert_eq!(logs.count(Level::WARN, "Received non 200 status code"), 1);
        assert_eq!(logs.count_any("Error communicating with ring-master"), 0);
    }

    #[tokio::test]
    async fn status_401_errors_once() {
        let (logs, _guard) = CapturedLogs::install();
        let (fetcher, mock) = fetcher();
        mock.queue_response(RingResponse::status(401));

        let outcome = fetcher.fetch("object.ring.gz", None).await;

        assert_eq!(outcome, FetchOutcome::ClientOrServerError(401));
        assert_eq!(outcome.failure_kind(), Some(FailureKind::RemoteRejected));
        assert_eq!(
            logs.count(Level::ERROR, "Error communicating with ring-master"),
            1
        );
        assert_eq!(logs.count_any("Received non 200 status code"), 0);
    }

    #[tokio::test]
    async fn transport_failure_errors_once() {
        let (logs, _guard) = CapturedLogs::install();
        let (fetcher, mock) = fetcher();
        mock.fail_next_transport("connection refused");

        let outcome = fetcher.fetch("object.ring.gz", None).await;

        assert_eq!(
            outcome,
            FetchOutcome::TransportError(FetchFailure::network("connection refused"))
        );
        assert_eq!(
            logs.count(Level::ERROR, "Error communicating with ring-master"),
            1
        );
    }

    #[tokio::test]
    async fn unexpected_failure_errors_once() {
        let (logs, _guard) = CapturedLogs::install();
        let (fetcher, mock) = fetcher();
        mock.fail_next_other("boom");

        let outcome = fetcher.fetch("object.ring.gz", None).await;

        assert_eq!(outcome.failure_kind(), Some(FailureKind::Unexpected));
        assert_eq!(
            logs.count(Level::ERROR, "Error retrieving or checking on ring"),
            1
        );
        assert_eq!(logs.count_any("Error communicating with ring-master"), 0);
    }

    #[tokio::test]
    async fn ok_without_etag_is_unexpected() {
        let (logs, _guard) = CapturedLogs::install();
        let (fetcher, mock) = fetcher();
        mock.queue_response(RingResponse::status(200));

        let outcome = fetcher.fetch("object.ring.gz", None).await;

        assert_eq!(outcome.failure_kind(), Some(FailureKind::Unexpected));
        assert_eq!(
            logs.count(Level::ERROR, "Error retrieving or checking on ring"),
            1
        );
    }
}
