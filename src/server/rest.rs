//! REST API endpoints.

use std::collections::BTreeMap;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};

use super::metrics::CHECKSUM_REQUESTS;
use super::state::AppState;
use crate::crawler::checksum_batch;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

/// Checksum batch request.
#[derive(Debug, Deserialize)]
pub struct ChecksumRequest {
    pub paths: Vec<String>,
}

/// Checksum batch response. Unreadable paths are absent.
#[derive(Debug, Serialize)]
pub struct ChecksumResponse {
    pub checksums: BTreeMap<String, String>,
}

/// Create REST API router.
pub fn create_rest_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/api/v1/status", get(status))
        .route("/api/v1/checksums", post(checksums))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_status = match state.db.health_check() {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            "error"
        }
    };

    let response = HealthResponse {
        status: if db_status == "ok" {
            "healthy"
        } else {
            "unhealthy"
        }
        .to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_status.to_string(),
    };

    let status_code = if db_status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    tracing::debug!(status = ?status_code, database = %db_status, "Health check");

    (status_code, Json(response))
}

/// Prometheus metrics endpoint.
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                b"Failed to encode metrics".to_vec(),
            )
        }
    }
}

/// Status endpoint with crawl statistics.
async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let catalog_files = state
        .db
        .with_conn(crate::storage::count_files)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to count catalog files");
            0
        });
    let crawler = state.stats.snapshot();

    tracing::debug!(
        cached = state.cache.len(),
        catalog = catalog_files,
        cycles = crawler.cycles,
        "Status retrieved"
    );

    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "stats": {
            "cached_files": state.cache.len(),
            "catalog_files": catalog_files,
            "subscribers": state.publisher.subscriber_count(),
            "cycles": crawler.cycles,
        },
        "last_cycle": crawler.last_cycle,
    }))
}

/// Checksum batch endpoint.
async fn checksums(Json(request): Json<ChecksumRequest>) -> impl IntoResponse {
    CHECKSUM_REQUESTS.inc();

    match checksum_batch(request.paths).await {
        Ok(checksums) => (StatusCode::OK, Json(ChecksumResponse { checksums })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Checksum batch failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{CrawlerStats, Publisher, SnapshotCache};
    use crate::storage::{migrate, Database};
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn create_test_state() -> AppState {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| migrate(conn)).unwrap();
        AppState::new(
            db,
            Arc::new(Publisher::new(8, Duration::from_secs(1))),
            SnapshotCache::new(),
            Arc::new(CrawlerStats::new()),
        )
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_rest_router(create_test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_metrics() {
        let app = create_rest_router(create_test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status() {
        let state = create_test_state();
        let _sub = state.publisher.subscribe("status-test");
        let app = create_rest_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["stats"]["cached_files"], 0);
        assert_eq!(body["stats"]["catalog_files"], 0);
        assert_eq!(body["stats"]["subscribers"], 1);
        assert!(body["last_cycle"].is_null());
    }

    #[tokio::test]
    async fn test_checksums_partial_batch() {
        let tmp = TempDir::new().unwrap();
        let present = tmp.path().join("a.txt");
        std::fs::write(&present, "abc").unwrap();
        let present = present.to_string_lossy().to_string();
        let missing = tmp.path().join("nope").to_string_lossy().to_string();

        let app = create_rest_router(create_test_state());
        let payload = serde_json::json!({ "paths": [present, missing] });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/checksums")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let checksums = body["checksums"].as_object().unwrap();
        assert_eq!(checksums.len(), 1);
        assert_eq!(
            checksums[&present],
            blake3::hash(b"abc").to_hex().to_string()
        );
    }

    #[tokio::test]
    async fn test_checksums_rejects_bad_body() {
        let app = create_rest_router(create_test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/checksums")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"files": []}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }
}
