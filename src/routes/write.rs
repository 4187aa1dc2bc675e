//! Write operations: insert, update, replace, delete, and bulkWrite.
//!
//! Filters are run through ObjectId promotion; inserted documents, update
//! documents, and replacements are stored exactly as the client sent them.

use crate::error::{ServerError, ServerResult};
use crate::oid::{bson_to_response_json, promote_object_ids_in};
use crate::state::ServerState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use mongodb::bson::Document;
use mongodb::options::{
    BulkWriteOptions, DeleteManyModel, DeleteOneModel, InsertOneModel, ReplaceOneModel,
    ReplaceOptions, UpdateManyModel, UpdateModifications, UpdateOneModel, UpdateOptions,
    WriteModel,
};
use mongodb::Namespace;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

const NO_MATCH_MESSAGE: &str = "No document found with the specified ID or criteria";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneResponse {
    pub success: bool,
    pub inserted_id: Value,
}

/// Insert a single document
pub async fn insert_one(
    State(state): State<Arc<ServerState>>,
    Json(document): Json<Document>,
) -> ServerResult<impl IntoResponse> {
    let result = state.collection().insert_one(document).await?;

    Ok(Json(InsertOneResponse {
        success: true,
        inserted_id: bson_to_response_json(result.inserted_id),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertManyResponse {
    pub success: bool,
    pub inserted_count: usize,
    pub inserted_ids: BTreeMap<usize, Value>,
}

/// Insert multiple documents; the body is the document array itself
pub async fn insert_many(
    State(state): State<Arc<ServerState>>,
    Json(documents): Json<Vec<Document>>,
) -> ServerResult<impl IntoResponse> {
    let result = state.collection().insert_many(documents).await?;

    let inserted_ids: BTreeMap<usize, Value> = result
        .inserted_ids
        .into_iter()
        .map(|(index, id)| (index, bson_to_response_json(id)))
        .collect();

    Ok(Json(InsertManyResponse {
        success: true,
        inserted_count: inserted_ids.len(),
        inserted_ids,
    }))
}

/// Body of `POST /api/updateOne` and `POST /api/updateMany`
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub filter: Document,
    pub update: Document,
    #[serde(default)]
    pub options: UpdateOpts,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateOpts {
    pub upsert: Option<bool>,
    pub array_filters: Option<Vec<Document>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    pub success: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upserted_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Update the first matching document
pub async fn update_one(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<UpdateRequest>,
) -> ServerResult<impl IntoResponse> {
    let filter = promote_object_ids_in(request.filter);
    tracing::debug!(filter = %filter, "updateOne filter after id promotion");

    let mut options = UpdateOptions::default();
    options.upsert = request.options.upsert;
    options.array_filters = request.options.array_filters;

    let result = state
        .collection()
        .update_one(filter, request.update)
        .with_options(options)
        .await?;

    let message = (result.matched_count == 0 && result.upserted_id.is_none())
        .then(|| NO_MATCH_MESSAGE.to_string());
    if let Some(msg) = &message {
        tracing::info!("updateOne matched nothing: {msg}");
    }

    Ok(Json(UpdateResponse {
        success: true,
        matched_count: result.matched_count,
        modified_count: result.modified_count,
        upserted_id: result.upserted_id.map(bson_to_response_json),
        message,
    }))
}

/// Update all matching documents
pub async fn update_many(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<UpdateRequest>,
) -> ServerResult<impl IntoResponse> {
    let filter = promote_object_ids_in(request.filter);

    let mut options = UpdateOptions::default();
    options.upsert = request.options.upsert;
    options.array_filters = request.options.array_filters;

    let result = state
        .collection()
        .update_many(filter, request.update)
        .with_options(options)
        .await?;

    Ok(Json(UpdateResponse {
        success: true,
        matched_count: result.matched_count,
        modified_count: result.modified_count,
        upserted_id: result.upserted_id.map(bson_to_response_json),
        message: None,
    }))
}

/// Body of `POST /api/replaceOne`
#[derive(Debug, Deserialize)]
pub struct ReplaceRequest {
    pub filter: Document,
    pub replacement: Document,
    #[serde(default)]
    pub options: ReplaceOpts,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReplaceOpts {
    pub upsert: Option<bool>,
}

/// Replace an entire document
pub async fn replace_one(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ReplaceRequest>,
) -> ServerResult<impl IntoResponse> {
    let filter = promote_object_ids_in(request.filter);

    let mut options = ReplaceOptions::default();
    options.upsert = request.options.upsert;

    let result = state
        .collection()
        .replace_one(filter, request.replacement)
        .with_options(options)
        .await?;

    Ok(Json(UpdateResponse {
        success: true,
        matched_count: result.matched_count,
        modified_count: result.modified_count,
        upserted_id: result.upserted_id.map(bson_to_response_json),
        message: None,
    }))
}

/// Body of `POST /api/deleteOne` and `POST /api/deleteMany`
#[derive(Debug, Default, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub filter: Document,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Delete the first matching document
pub async fn delete_one(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<DeleteRequest>,
) -> ServerResult<impl IntoResponse> {
    let filter = promote_object_ids_in(request.filter);
    tracing::debug!(filter = %filter, "deleteOne filter after id promotion");

    let result = state.collection().delete_one(filter).await?;

    let message = (result.deleted_count == 0).then(|| NO_MATCH_MESSAGE.to_string());

    Ok(Json(DeleteResponse {
        success: true,
        deleted_count: result.deleted_count,
        message,
    }))
}

/// Delete all matching documents
pub async fn delete_many(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<DeleteRequest>,
) -> ServerResult<impl IntoResponse> {
    let filter = promote_object_ids_in(request.filter);
    let result = state.collection().delete_many(filter).await?;

    Ok(Json(DeleteResponse {
        success: true,
        deleted_count: result.deleted_count,
        message: None,
    }))
}

/// Body of `POST /api/bulkWrite`
#[derive(Debug, Deserialize)]
pub struct BulkWriteRequest {
    #[serde(default)]
    pub operations: Vec<BulkOperation>,
    #[serde(default)]
    pub options: BulkOpts,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BulkOpts {
    pub ordered: Option<bool>,
}

/// One entry of a `bulkWrite` operation list, in the driver's wire shape.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BulkOperation {
    InsertOne {
        document: Document,
    },
    UpdateOne {
        filter: Document,
        update: Document,
        #[serde(default)]
        upsert: Option<bool>,
    },
    UpdateMany {
        filter: Document,
        update: Document,
        #[serde(default)]
        upsert: Option<bool>,
    },
    ReplaceOne {
        filter: Document,
        replacement: Document,
        #[serde(default)]
        upsert: Option<bool>,
    },
    DeleteOne {
        filter: Document,
    },
    DeleteMany {
        filter: Document,
    },
}

impl BulkOperation {
    /// Lower to a driver write model against `namespace`, promoting
    /// ObjectIds in the filter only.
    fn into_write_model(self, namespace: Namespace) -> WriteModel {
        match self {
            BulkOperation::InsertOne { document } => WriteModel::InsertOne(
                InsertOneModel::builder()
                    .namespace(namespace)
                    .document(document)
                    .build(),
            ),
            BulkOperation::UpdateOne {
                filter,
                update,
                upsert,
            } => {
                let mut model = UpdateOneModel::builder()
                    .namespace(namespace)
                    .filter(promote_object_ids_in(filter))
                    .update(UpdateModifications::Document(update))
                    .build();
                model.upsert = upsert;
                WriteModel::UpdateOne(model)
            }
            BulkOperation::UpdateMany {
                filter,
                update,
                upsert,
            } => {
                let mut model = UpdateManyModel::builder()
                    .namespace(namespace)
                    .filter(promote_object_ids_in(filter))
                    .update(UpdateModifications::Document(update))
                    .build();
                model.upsert = upsert;
                WriteModel::UpdateMany(model)
            }
            BulkOperation::ReplaceOne {
                filter,
                replacement,
                upsert,
            } => {
                let mut model = ReplaceOneModel::builder()
                    .namespace(namespace)
                    .filter(promote_object_ids_in(filter))
                    .replacement(replacement)
                    .build();
                model.upsert = upsert;
                WriteModel::ReplaceOne(model)
            }
            BulkOperation::DeleteOne { filter } => WriteModel::DeleteOne(
                DeleteOneModel::builder()
                    .namespace(namespace)
                    .filter(promote_object_ids_in(filter))
                    .build(),
            ),
            BulkOperation::DeleteMany { filter } => WriteModel::DeleteMany(
                DeleteManyModel::builder()
                    .namespace(namespace)
                    .filter(promote_object_ids_in(filter))
                    .build(),
            ),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkWriteResponse {
    pub success: bool,
    pub inserted_count: i64,
    pub matched_count: i64,
    pub modified_count: i64,
    pub deleted_count: i64,
    pub upserted_count: i64,
}

/// Perform a list of write operations in a single driver call
pub async fn bulk_write(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<BulkWriteRequest>,
) -> ServerResult<impl IntoResponse> {
    if request.operations.is_empty() {
        return Err(ServerError::BadRequest(
            "bulkWrite requires at least one operation".to_string(),
        ));
    }

    let namespace = state.collection().namespace();
    let models: Vec<WriteModel> = request
        .operations
        .into_iter()
        .map(|op| op.into_write_model(namespace.clone()))
        .collect();

    let mut options = BulkWriteOptions::default();
    options.ordered = request.options.ordered;

    let result = state
        .client
        .bulk_write(models)
        .with_options(options)
        .await?;

    Ok(Json(BulkWriteResponse {
        success: true,
        inserted_count: result.inserted_count,
        matched_count: result.matched_count,
        modified_count: result.modified_count,
        deleted_count: result.deleted_count,
        upserted_count: result.upserted_count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_operations_parse_the_wire_shape() {
        let request: BulkWriteRequest = serde_json::from_value(serde_json::json!({
            "operations": [
                { "insertOne": { "document": { "name": "a" } } },
                { "updateOne": {
                    "filter": { "_id": "507f1f77bcf86cd799439011" },
                    "update": { "$set": { "name": "b" } },
                    "upsert": true
                } },
                { "deleteMany": { "filter": { "name": "c" } } }
            ]
        }))
        .unwrap();

        assert_eq!(request.operations.len(), 3);
        assert!(matches!(request.operations[0], BulkOperation::InsertOne { .. }));
        assert!(matches!(
            request.operations[1],
            BulkOperation::UpdateOne { upsert: Some(true), .. }
        ));
        assert!(matches!(request.operations[2], BulkOperation::DeleteMany { .. }));
    }

    #[test]
    fn update_filter_is_promoted_when_lowered() {
        let op = BulkOperation::UpdateOne {
            filter: mongodb::bson::doc! { "_id": "507f1f77bcf86cd799439011" },
            update: mongodb::bson::doc! { "$set": { "name": "b" } },
            upsert: None,
        };
        let namespace: Namespace = "db.items".parse().unwrap();
        let model = op.into_write_model(namespace);
        match model {
            WriteModel::UpdateOne(update) => {
                assert!(update.filter.get_object_id("_id").is_ok());
            }
            other => panic!("expected UpdateOne model, got {other:?}"),
        }
    }
}
