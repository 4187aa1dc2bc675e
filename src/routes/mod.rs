//! API route handlers
//!
//! This module contains all HTTP endpoint implementations for the docbridge
//! server. Routes are organized by functionality:
//!
//! - `health`: Health checks, readiness, and metrics
//! - `query`: Read operations (find, distinct, count, aggregate)
//! - `write`: Write operations (insert, update, replace, delete, bulk)
//! - `atomic`: Atomic find-and-modify operations
//! - `admin`: Index and collection management

pub mod admin;
pub mod atomic;
pub mod health;
pub mod query;
pub mod write;

use crate::error::{ServerError, ServerResult};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// API version and base info
///
/// Returns server information including version and available endpoints.
/// This is the root endpoint (GET /) and requires no authentication.
pub async fn api_info() -> ServerResult<impl IntoResponse> {
    Ok(Json(json!({
        "name": "Docbridge Server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/api/insertOne",
            "/api/insertMany",
            "/api/find",
            "/api/findOne",
            "/api/distinct",
            "/api/countDocuments",
            "/api/updateOne",
            "/api/updateMany",
            "/api/replaceOne",
            "/api/deleteOne",
            "/api/deleteMany",
            "/api/aggregate",
            "/api/createIndex",
            "/api/dropIndex",
            "/api/getIndexes",
            "/api/findOneAndUpdate",
            "/api/findOneAndDelete",
            "/api/findOneAndReplace",
            "/api/bulkWrite",
            "/api/renameCollection",
            "/api/drop",
            "/api/listCollections",
            "/health",
            "/ready",
            "/metrics"
        ]
    })))
}

/// 404 Not Found handler
///
/// Returns a standardized error response for undefined routes.
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
