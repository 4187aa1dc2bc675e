//! Error envelope tests
//!
//! Every error leaving the API uses the same JSON envelope:
//! `{"success": false, "error": {"code", "message"}}`.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use docbridge::ServerError;
use http_body_util::BodyExt;

async fn envelope(err: ServerError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn bad_request_maps_to_400() {
    let (status, json) = envelope(ServerError::BadRequest("missing filter".into())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("missing filter"));
}

#[tokio::test]
async fn not_found_maps_to_404() {
    let (status, json) = envelope(ServerError::NotFound).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn timeout_maps_to_408() {
    let (status, json) = envelope(ServerError::Timeout).await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(json["error"]["code"], "REQUEST_TIMEOUT");
}

#[tokio::test]
async fn internal_maps_to_500() {
    let (status, json) = envelope(ServerError::Internal("boom".into())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["code"], "INTERNAL_ERROR");
}

#[tokio::test]
async fn json_errors_convert_to_bad_request() {
    let parse_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
    let err: ServerError = parse_err.into();
    let (status, json) = envelope(err).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}
