//! Index and collection management.

use crate::error::ServerResult;
use crate::oid::document_to_response_json;
use crate::state::ServerState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::IndexOptions;
use mongodb::IndexModel;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// MongoDB "ns not found" server error, raised when dropping a collection
/// that does not exist.
const NAMESPACE_NOT_FOUND: i32 = 26;

fn is_namespace_not_found(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        mongodb::error::ErrorKind::Command(ref command) if command.code == NAMESPACE_NOT_FOUND
    )
}

/// Body of `POST /api/createIndex`
#[derive(Debug, Deserialize)]
pub struct CreateIndexRequest {
    pub keys: Document,
    #[serde(default)]
    pub options: IndexOpts,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IndexOpts {
    pub name: Option<String>,
    pub unique: Option<bool>,
    pub sparse: Option<bool>,
}

/// Create an index
pub async fn create_index(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<CreateIndexRequest>,
) -> ServerResult<impl IntoResponse> {
    let mut options = IndexOptions::default();
    options.name = request.options.name;
    options.unique = request.options.unique;
    options.sparse = request.options.sparse;

    let model = IndexModel::builder()
        .keys(request.keys)
        .options(options)
        .build();

    let result = state.collection().create_index(model).await?;

    Ok(Json(json!({
        "success": true,
        "indexName": result.index_name,
    })))
}

/// Body of `POST /api/dropIndex`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropIndexRequest {
    pub index_name: String,
}

/// Drop an index by name
pub async fn drop_index(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<DropIndexRequest>,
) -> ServerResult<impl IntoResponse> {
    state.collection().drop_index(request.index_name).await?;

    Ok(Json(json!({ "success": true })))
}

/// List all indexes on the active collection
pub async fn get_indexes(State(state): State<Arc<ServerState>>) -> ServerResult<impl IntoResponse> {
    let mut cursor = state.collection().list_indexes().await?;

    let mut indexes: Vec<Value> = Vec::new();
    while let Some(model) = cursor.try_next().await? {
        let mut spec = serde_json::Map::new();
        spec.insert("key".to_string(), document_to_response_json(model.keys));
        if let Some(options) = model.options {
            if let Some(name) = options.name {
                spec.insert("name".to_string(), json!(name));
            }
            if let Some(unique) = options.unique {
                spec.insert("unique".to_string(), json!(unique));
            }
            if let Some(sparse) = options.sparse {
                spec.insert("sparse".to_string(), json!(sparse));
            }
        }
        indexes.push(Value::Object(spec));
    }

    Ok(Json(json!({
        "success": true,
        "indexes": indexes,
    })))
}

/// Body of `POST /api/renameCollection`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameCollectionRequest {
    pub new_name: String,
}

/// Rename the active collection; subsequent requests go to the new name
pub async fn rename_collection(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<RenameCollectionRequest>,
) -> ServerResult<impl IntoResponse> {
    let db_name = state.db.name().to_string();
    let source = format!("{}.{}", db_name, state.collection_name());
    let target = format!("{}.{}", db_name, request.new_name);

    // renameCollection is an admin-database command in the wire protocol.
    state
        .client
        .database("admin")
        .run_command(doc! { "renameCollection": source, "to": target })
        .await?;

    state.set_collection(&request.new_name);
    tracing::info!(collection = %request.new_name, "active collection renamed");

    Ok(Json(json!({
        "success": true,
        "message": format!("Collection renamed to {}", request.new_name),
    })))
}

/// Drop the active collection and fall back to the configured default
pub async fn drop_collection(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<impl IntoResponse> {
    if let Err(err) = state.collection().drop().await {
        // Dropping an already-dropped collection counts as success.
        if !is_namespace_not_found(&err) {
            return Err(err.into());
        }
    }

    state.set_collection(&state.config.collection);
    tracing::info!(collection = %state.config.collection, "collection dropped, reset to default");

    Ok(Json(json!({
        "success": true,
        "message": "Collection dropped",
    })))
}

/// List collection names in the database
pub async fn list_collections(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<impl IntoResponse> {
    let collections = state.db.list_collection_names().await?;

    Ok(Json(json!({
        "success": true,
        "collections": collections,
    })))
}
