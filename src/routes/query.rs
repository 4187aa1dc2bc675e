//! Read operations: find, findOne, distinct, countDocuments, aggregate.
//!
//! Every query document is run through ObjectId promotion before it reaches
//! the driver; for aggregation only `$match` stages carry query documents,
//! so only those are promoted.

use crate::error::ServerResult;
use crate::oid::{
    bson_to_response_json, document_to_response_json, promote_object_ids, promote_object_ids_in,
};
use crate::state::ServerState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use futures::TryStreamExt;
use mongodb::bson::Document;
use mongodb::options::FindOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Body of `POST /api/find`
#[derive(Debug, Default, Deserialize)]
pub struct FindRequest {
    #[serde(default)]
    pub query: Document,
    #[serde(default)]
    pub options: FindOpts,
}

/// Cursor modifiers accepted by `find`
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FindOpts {
    pub sort: Option<Document>,
    pub limit: Option<i64>,
    pub skip: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct FindResponse {
    pub success: bool,
    pub documents: Vec<Value>,
}

/// Find documents matching a query, with optional sort/limit/skip
pub async fn find(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<FindRequest>,
) -> ServerResult<impl IntoResponse> {
    let filter = promote_object_ids_in(request.query);

    let mut options = FindOptions::default();
    options.sort = request.options.sort;
    options.limit = request.options.limit;
    options.skip = request.options.skip;

    let cursor = state.collection().find(filter).with_options(options).await?;
    let documents: Vec<Document> = cursor.try_collect().await?;

    Ok(Json(FindResponse {
        success: true,
        documents: documents.into_iter().map(document_to_response_json).collect(),
    }))
}

/// Body of `POST /api/findOne`
#[derive(Debug, Default, Deserialize)]
pub struct FindOneRequest {
    #[serde(default)]
    pub query: Document,
}

#[derive(Debug, Serialize)]
pub struct FindOneResponse {
    pub success: bool,
    pub document: Option<Value>,
}

/// Find the first document matching a query
pub async fn find_one(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<FindOneRequest>,
) -> ServerResult<impl IntoResponse> {
    let filter = promote_object_ids_in(request.query);
    let document = state.collection().find_one(filter).await?;

    Ok(Json(FindOneResponse {
        success: true,
        document: document.map(document_to_response_json),
    }))
}

/// Body of `POST /api/distinct`
#[derive(Debug, Deserialize)]
pub struct DistinctRequest {
    pub field: String,
    #[serde(default)]
    pub query: Document,
}

#[derive(Debug, Serialize)]
pub struct DistinctResponse {
    pub success: bool,
    pub values: Vec<Value>,
}

/// Return distinct values for a field among matching documents
pub async fn distinct(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<DistinctRequest>,
) -> ServerResult<impl IntoResponse> {
    let filter = promote_object_ids_in(request.query);
    let values = state.collection().distinct(&request.field, filter).await?;

    Ok(Json(DistinctResponse {
        success: true,
        values: values.into_iter().map(bson_to_response_json).collect(),
    }))
}

/// Body of `POST /api/countDocuments`
#[derive(Debug, Default, Deserialize)]
pub struct CountRequest {
    #[serde(default)]
    pub query: Document,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub success: bool,
    pub count: u64,
}

/// Count the number of matching documents
pub async fn count_documents(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<CountRequest>,
) -> ServerResult<impl IntoResponse> {
    let filter = promote_object_ids_in(request.query);
    let count = state.collection().count_documents(filter).await?;

    Ok(Json(CountResponse {
        success: true,
        count,
    }))
}

/// Body of `POST /api/aggregate`
#[derive(Debug, Default, Deserialize)]
pub struct AggregateRequest {
    #[serde(default)]
    pub pipeline: Vec<Document>,
}

#[derive(Debug, Serialize)]
pub struct AggregateResponse {
    pub success: bool,
    pub result: Vec<Value>,
}

/// Run an aggregation pipeline
pub async fn aggregate(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<AggregateRequest>,
) -> ServerResult<impl IntoResponse> {
    let pipeline: Vec<Document> = request
        .pipeline
        .into_iter()
        .map(promote_match_stage)
        .collect();

    let cursor = state.collection().aggregate(pipeline).await?;
    let result: Vec<Document> = cursor.try_collect().await?;

    Ok(Json(AggregateResponse {
        success: true,
        result: result.into_iter().map(document_to_response_json).collect(),
    }))
}

/// Only `$match` carries a query document; every other stage passes through
/// as written.
fn promote_match_stage(stage: Document) -> Document {
    let mut out = Document::new();
    for (key, value) in stage {
        if key == "$match" {
            out.insert(key, promote_object_ids(value));
        } else {
            out.insert(key, value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, Bson};

    #[test]
    fn match_stages_are_promoted_and_others_untouched() {
        let stage = promote_match_stage(doc! {
            "$match": { "_id": "507f1f77bcf86cd799439011" }
        });
        let matched = stage.get_document("$match").unwrap();
        assert!(matched.get_object_id("_id").is_ok());

        let group = doc! { "$group": { "_id": "$category", "n": { "$sum": 1 } } };
        assert_eq!(promote_match_stage(group.clone()), group);
    }

    #[test]
    fn find_request_defaults_to_empty_query() {
        let request: FindRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(request.query.is_empty());
        assert!(request.options.sort.is_none());
        assert!(request.options.limit.is_none());
    }

    #[test]
    fn find_options_accept_the_wire_shape() {
        let request: FindRequest = serde_json::from_value(serde_json::json!({
            "query": { "qty": { "$gt": 1 } },
            "options": { "sort": { "name": 1 }, "limit": 5, "skip": 10 }
        }))
        .unwrap();
        assert_eq!(request.options.limit, Some(5));
        assert_eq!(request.options.skip, Some(10));
        let sort = request.options.sort.unwrap();
        assert!(matches!(
            sort.get("name"),
            Some(Bson::Int32(1) | Bson::Int64(1))
        ));
    }
}
