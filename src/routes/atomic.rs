//! Atomic find-and-modify operations.
//!
//! Each of these resolves to a single driver call, so match-and-mutate is
//! atomic on the server side. Filters go through ObjectId promotion; the
//! update/replacement payloads do not.

use crate::error::{ServerError, ServerResult};
use crate::oid::{document_to_response_json, promote_object_ids_in};
use crate::state::ServerState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use mongodb::bson::Document;
use mongodb::options::{
    FindOneAndDeleteOptions, FindOneAndReplaceOptions, FindOneAndUpdateOptions, ReturnDocument,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

const NO_MATCH_MESSAGE: &str = "No document found with the specified ID or criteria";

/// Options shared by the find-and-modify family
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FindAndModifyOpts {
    pub upsert: Option<bool>,
    /// `"before"` or `"after"`
    pub return_document: Option<String>,
    pub sort: Option<Document>,
    pub projection: Option<Document>,
}

fn return_document(value: Option<&str>) -> ServerResult<Option<ReturnDocument>> {
    match value {
        None => Ok(None),
        Some("after") => Ok(Some(ReturnDocument::After)),
        Some("before") => Ok(Some(ReturnDocument::Before)),
        Some(other) => Err(ServerError::BadRequest(format!(
            "invalid returnDocument value: {other}"
        ))),
    }
}

#[derive(Debug, Serialize)]
pub struct FindAndModifyResponse {
    pub success: bool,
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn respond(result: Option<Document>) -> Json<FindAndModifyResponse> {
    match result {
        Some(doc) => Json(FindAndModifyResponse {
            success: true,
            result: Some(document_to_response_json(doc)),
            message: None,
        }),
        None => Json(FindAndModifyResponse {
            success: true,
            result: None,
            message: Some(NO_MATCH_MESSAGE.to_string()),
        }),
    }
}

/// Body of `POST /api/findOneAndUpdate`
#[derive(Debug, Deserialize)]
pub struct FindAndUpdateRequest {
    pub filter: Document,
    pub update: Document,
    #[serde(default)]
    pub options: FindAndModifyOpts,
}

/// Find and update a document atomically
pub async fn find_one_and_update(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<FindAndUpdateRequest>,
) -> ServerResult<impl IntoResponse> {
    let filter = promote_object_ids_in(request.filter);
    tracing::debug!(filter = %filter, "findOneAndUpdate filter after id promotion");

    let mut options = FindOneAndUpdateOptions::default();
    options.upsert = request.options.upsert;
    options.return_document = return_document(request.options.return_document.as_deref())?;
    options.sort = request.options.sort;
    options.projection = request.options.projection;

    let result = state
        .collection()
        .find_one_and_update(filter, request.update)
        .with_options(options)
        .await?;

    Ok(respond(result))
}

/// Body of `POST /api/findOneAndDelete`
#[derive(Debug, Default, Deserialize)]
pub struct FindAndDeleteRequest {
    #[serde(default)]
    pub filter: Document,
    #[serde(default)]
    pub options: FindAndModifyOpts,
}

/// Find and delete a document atomically
pub async fn find_one_and_delete(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<FindAndDeleteRequest>,
) -> ServerResult<impl IntoResponse> {
    let filter = promote_object_ids_in(request.filter);
    tracing::debug!(filter = %filter, "findOneAndDelete filter after id promotion");

    let mut options = FindOneAndDeleteOptions::default();
    options.sort = request.options.sort;
    options.projection = request.options.projection;

    let result = state
        .collection()
        .find_one_and_delete(filter)
        .with_options(options)
        .await?;

    Ok(respond(result))
}

/// Body of `POST /api/findOneAndReplace`
#[derive(Debug, Deserialize)]
pub struct FindAndReplaceRequest {
    pub filter: Document,
    pub replacement: Document,
    #[serde(default)]
    pub options: FindAndModifyOpts,
}

/// Find and replace a document atomically
pub async fn find_one_and_replace(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<FindAndReplaceRequest>,
) -> ServerResult<impl IntoResponse> {
    let filter = promote_object_ids_in(request.filter);
    tracing::debug!(filter = %filter, "findOneAndReplace filter after id promotion");

    let mut options = FindOneAndReplaceOptions::default();
    options.upsert = request.options.upsert;
    options.return_document = return_document(request.options.return_document.as_deref())?;
    options.sort = request.options.sort;
    options.projection = request.options.projection;

    let result = state
        .collection()
        .find_one_and_replace(filter, request.replacement)
        .with_options(options)
        .await?;

    Ok(respond(result))
}
