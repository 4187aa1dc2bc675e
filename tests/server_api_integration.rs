//! Integration tests for server API wiring
//!
//! These tests drive the real router through `tower::ServiceExt::oneshot`.
//! The driver client connects lazily, so everything here runs without a
//! live MongoDB deployment; endpoints that would hit the database are only
//! exercised up to request decoding.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use docbridge::{build_router, ServerConfig, ServerState};
use http_body_util::BodyExt;
use tower::ServiceExt;

async fn test_state() -> Arc<ServerState> {
    let config = ServerConfig::default();
    Arc::new(
        ServerState::connect(config)
            .await
            .expect("client construction needs no live deployment"),
    )
}

async fn body_json(body: Body) -> serde_json::Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn api_info_lists_endpoints() {
    let app = build_router(test_state().await);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response.into_body()).await;
    assert_eq!(json["name"], "Docbridge Server");
    let endpoints = json["endpoints"].as_array().unwrap();
    assert!(endpoints.iter().any(|e| e == "/api/find"));
    assert!(endpoints.iter().any(|e| e == "/api/bulkWrite"));
}

#[tokio::test]
async fn health_check_reports_healthy() {
    let app = build_router(test_state().await);

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
    let json = body_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "docbridge");
}

#[tokio::test]
async fn unknown_route_returns_error_envelope() {
    let app = build_router(test_state().await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/doesNotExist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response.into_body()).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn malformed_json_body_is_rejected() {
    let app = build_router(test_state().await);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/find")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = build_router(test_state().await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "test-req-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "test-req-1"
    );
}

#[tokio::test]
async fn state_tracks_the_active_collection() {
    let state = test_state().await;

    assert_eq!(state.collection_name(), "items");
    state.set_collection("renamed");
    assert_eq!(state.collection().name(), "renamed");
}
