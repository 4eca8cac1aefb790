//! reqwest-backed ring-master client.

use super::{ClientError, RingMasterClient, RingResponse};
use async_trait::async_trait;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use ringsync_types::RingDigest;
use std::time::Duration;

/// Talks to a ring-master over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRingMaster {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRingMaster {
    /// Create a client for the ring-master at `base_url`.
    ///
    /// `timeout` bounds each whole request, body included.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ring-minion/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Other(e.to_string()))?;

        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self { client, base_url })
    }

    /// Full URL of a ring file.
    pub fn ring_url(&self, ring_file: &str) -> String {
        format!("{}ring/{}", self.base_url, ring_file)
    }
}

fn classify(err: reqwest::Error) -> ClientError {
    if err.is_builder() {
        ClientError::Other(err.to_string())
    } else {
        ClientError::Transport(err.to_string())
    }
}

#[async_trait]
impl RingMasterClient for HttpRingMaster {
    async fn get_ring(
        &self,
        ring_file: &str,
        if_none_match: Option<&RingDigest>,
    ) -> Result<RingResponse, ClientError> {
        let mut request = self.client.get(self.ring_url(ring_file));
        if let Some(digest) = if_none_match {
            request = request.header(IF_NONE_MATCH, digest.as_str());
        }

        let response = request.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = if status == 200 {
            response.bytes().await.map_err(classify)?.to_vec()
        } else {
            Vec::new()
        };

        Ok(RingResponse { status, etag, body })
    }
}
