//! Ring-master client abstraction.
//!
//! The fetcher talks to the ring-master through [`RingMasterClient`] so the
//! HTTP stack can be swapped for [`MockRingMaster`] in tests.
//!
//! # Design
//!
//! The client does not interpret status codes. Every answer the server gives
//! comes back as a [`RingResponse`]; only requests that produced no answer at
//! all are errors. Classification lives in [`crate::fetcher`].

mod http;
mod mock;

pub use http::HttpRingMaster;
pub use mock::MockRingMaster;

use async_trait::async_trait;
use ringsync_types::RingDigest;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Connection refused or reset, DNS failure, timeout, truncated body.
    #[error("transport error: {0}")]
    Transport(String),

    /// Anything else, such as a request that could not be built.
    #[error("{0}")]
    Other(String),
}

/// One answer from the ring-master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw `ETag` header, if present.
    pub etag: Option<String>,
    /// Response body. Only read for 200 responses.
    pub body: Vec<u8>,
}

impl RingResponse {
    /// A 200 response carrying a ring.
    pub fn ok(body: Vec<u8>, etag: impl Into<String>) -> Self {
        Self {
            status: 200,
            etag: Some(etag.into()),
            body,
        }
    }

    /// A 304 response.
    pub fn not_modified() -> Self {
        Self::status(304)
    }

    /// A response with no headers and no body.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            etag: None,
            body: Vec::new(),
        }
    }
}

/// Conditional GET of ring files from the ring-master.
#[async_trait]
pub trait RingMasterClient: Send + Sync {
    /// Request `ring/<ring_file>`.
    ///
    /// When `if_none_match` is set it is sent as `If-None-Match`, and a
    /// server holding the same ring answers 304.
    async fn get_ring(
        &self,
        ring_file: &str,
        if_none_match: Option<&RingDigest>,
    ) -> Result<RingResponse, ClientError>;
}
