//! Mock ring-master for testing.
//!
//! Allows queueing responses and capturing requests for verification.

use super::{ClientError, RingMasterClient, RingResponse};
use async_trait::async_trait;
use ringsync_types::RingDigest;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// A request seen by [`MockRingMaster`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Requested ring file.
    pub ring_file: String,
    /// `If-None-Match` value, if sent.
    pub if_none_match: Option<RingDigest>,
}

/// Mock ring-master for testing.
///
/// Answers requests from a queue; an empty queue behaves like an unreachable
/// server.
#[derive(Debug, Default, Clone)]
pub struct MockRingMaster {
    inner: Arc<Mutex<MockRingMasterInner>>,
}

#[derive(Debug, Default)]
struct MockRingMasterInner {
    responses: VecDeque<Result<RingResponse, ClientError>>,
    requests: Vec<RecordedRequest>,
}

impl MockRingMaster {
    /// Create a new mock with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockRingMasterInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a response for the next request.
    pub fn queue_response(&self, response: RingResponse) {
        self.lock().responses.push_back(Ok(response));
    }

    /// Cause the next request to fail at the transport level.
    pub fn fail_next_transport(&self, error: &str) {
        self.lock()
            .responses
            .push_back(Err(ClientError::Transport(error.to_string())));
    }

    /// Cause the next request to fail with an unclassified error.
    pub fn fail_next_other(&self, error: &str) {
        self.lock()
            .responses
            .push_back(Err(ClientError::Other(error.to_string())));
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }
}

#[async_trait]
impl RingMasterClient for MockRingMaster {
    async fn get_ring(
        &self,
        ring_file: &str,
        if_none_match: Option<&RingDigest>,
    ) -> Result<RingResponse, ClientError> {
        let mut inner = self.lock();
        inner.requests.push(RecordedRequest {
            ring_file: ring_file.to_string(),
            if_none_match: if_none_match.cloned(),
        });
        inner
            .responses
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Transport("connection refused".into())))
    }
}
