//! HTTP endpoints for ring-master.

pub mod health;
mod ring;

use crate::RingMaster;
use axum::http::StatusCode;
use axum::{
    routing::{any, get},
    Extension, Router,
};
use std::sync::Arc;

pub use health::HealthStatus;

/// Build the HTTP router with all endpoints.
pub fn build_router(master: Arc<RingMaster>) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/ring/:file", any(ring::ring_handler))
        .fallback(not_found)
        .layer(Extension(master))
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MasterConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::header::{ETAG, IF_NONE_MATCH};
    use axum::http::{Method, Request};
    use ringsync_types::RingDigest;
    use tower::util::ServiceExt;

    fn test_master(dir: &std::path::Path) -> Arc<RingMaster> {
        Arc::new(RingMaster::new(MasterConfig {
            swift_dir: dir.to_path_buf(),
            ..MasterConfig::default()
        }))
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn get_serves_ring_with_etag() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("object.ring.gz"), b"ring v1").unwrap();
        let app = build_router(test_master(dir.path()));

        let response = app
            .oneshot(request(Method::GET, "/ring/object.ring.gz"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[ETAG],
            RingDigest::of_bytes(b"ring v1").as_str()
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ring v1");
    }

    #[tokio::test]
    async fn matching_if_none_match_is_not_modified() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("object.ring.gz"), b"ring v1").unwrap();
        let app = build_router(test_master(dir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ring/object.ring.gz")
                    .header(IF_NONE_MATCH, RingDigest::of_bytes(b"ring v1").as_str())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn stale_if_none_match_gets_new_ring() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("object.ring.gz"), b"ring v2").unwrap();
        let app = build_router(test_master(dir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ring/object.ring.gz")
                    .header(IF_NONE_MATCH, RingDigest::of_bytes(b"ring v1").as_str())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn head_returns_etag_without_body() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("account.ring.gz"), b"ring").unwrap();
        let app = build_router(test_master(dir.path()));

        let response = app
            .oneshot(request(Method::HEAD, "/ring/account.ring.gz"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[ETAG],
            RingDigest::of_bytes(b"ring").as_str()
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn unknown_ring_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("swift.conf"), b"secret").unwrap();
        let app = build_router(test_master(dir.path()));

        let response = app
            .oneshot(request(Method::GET, "/ring/swift.conf"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn other_paths_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_master(dir.path()));

        let response = app.oneshot(request(Method::GET, "/rings")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn other_methods_are_not_implemented() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("object.ring.gz"), b"ring").unwrap();
        let app = build_router(test_master(dir.path()));

        let response = app
            .oneshot(request(Method::PUT, "/ring/object.ring.gz"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn missing_ring_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_master(dir.path()));

        let response = app
            .oneshot(request(Method::GET, "/ring/object.ring.gz"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_master(dir.path()));

        let response = app.oneshot(request(Method::GET, "/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
