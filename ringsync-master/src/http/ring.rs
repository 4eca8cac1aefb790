//! `/ring/<file>` endpoint.

use crate::RingMaster;
use axum::extract::Path;
use axum::http::header::{CONTENT_TYPE, ETAG, IF_NONE_MATCH};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use ringsync_types::RingDigest;
use std::sync::Arc;

const OCTET_STREAM: &str = "application/octet-stream";

fn unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable\r\n").into_response()
}

/// Serve one ring file.
pub async fn ring_handler(
    Extension(master): Extension<Arc<RingMaster>>,
    method: Method,
    Path(file): Path<String>,
    headers: HeaderMap,
) -> Response {
    let Some(path) = master.ring_path(&file) else {
        return (StatusCode::NOT_FOUND, "Not Found\r\n").into_response();
    };

    let digest = match master.digest(&path).await {
        Ok(digest) => digest,
        Err(e) => {
            tracing::error!(ring = %file, error = %e, "Cannot read ring");
            return unavailable();
        }
    };

    let if_none_match = headers
        .get(IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(RingDigest::new);
    if if_none_match.as_ref() == Some(&digest) {
        return (
            StatusCode::NOT_MODIFIED,
            [(CONTENT_TYPE, OCTET_STREAM), (ETAG, digest.as_str())],
        )
            .into_response();
    }

    match method {
        Method::GET => {
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(ring = %file, error = %e, "Cannot read ring");
                    return unavailable();
                }
            };
            // The file may have been replaced since it was hashed; the ETag
            // must describe the bytes actually sent.
            let etag = RingDigest::of_bytes(&bytes);
            tracing::debug!(ring = %file, %etag, "Serving ring");
            (
                StatusCode::OK,
                [(CONTENT_TYPE, OCTET_STREAM), (ETAG, etag.as_str())],
                bytes,
            )
                .into_response()
        }
        Method::HEAD => (
            StatusCode::OK,
            [(CONTENT_TYPE, OCTET_STREAM), (ETAG, digest.as_str())],
        )
            .into_response(),
        _ => (StatusCode::NOT_IMPLEMENTED, "Not Implemented\r\n").into_response(),
    }
}
