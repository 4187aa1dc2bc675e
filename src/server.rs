//! Server initialization and routing
//!
//! This module handles the Axum server setup including:
//! - Router configuration with all API endpoints
//! - Middleware stack (logging, compression, timeout, CORS)
//! - Graceful shutdown handling

use crate::config::ServerConfig;
use crate::middleware::{log_requests, request_id};
use crate::routes::{admin, atomic, health, query, write};
use crate::routes::{api_info, not_found};
use crate::state::ServerState;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the Axum router with all routes and middleware
///
/// Routes are divided into:
/// - Public routes: /, /health, /ready, /metrics
/// - Operation routes: all /api/* endpoints, passthroughs to the driver
///
/// Middleware stack (applied in reverse order):
/// 1. Request ID tracking
/// 2. Request logging
/// 3. Timeout handling
/// 4. Compression
/// 5. CORS
pub fn build_router(state: Arc<ServerState>) -> Router {
    // CORS layer
    let cors = if state.config.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    // Public routes
    let public_routes = Router::new()
        .route("/", get(api_info))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics));

    // Database operation routes
    let api_routes = Router::new()
        // Documents
        .route("/api/insertOne", post(write::insert_one))
        .route("/api/insertMany", post(write::insert_many))
        .route("/api/find", post(query::find))
        .route("/api/findOne", post(query::find_one))
        .route("/api/distinct", post(query::distinct))
        .route("/api/countDocuments", post(query::count_documents))
        .route("/api/updateOne", post(write::update_one))
        .route("/api/updateMany", post(write::update_many))
        .route("/api/replaceOne", post(write::replace_one))
        .route("/api/deleteOne", post(write::delete_one))
        .route("/api/deleteMany", post(write::delete_many))
        .route("/api/aggregate", post(query::aggregate))
        .route("/api/bulkWrite", post(write::bulk_write))
        // Atomic find-and-modify
        .route("/api/findOneAndUpdate", post(atomic::find_one_and_update))
        .route("/api/findOneAndDelete", post(atomic::find_one_and_delete))
        .route("/api/findOneAndReplace", post(atomic::find_one_and_replace))
        // Indexes
        .route("/api/createIndex", post(admin::create_index))
        .route("/api/dropIndex", post(admin::drop_index))
        .route("/api/getIndexes", get(admin::get_indexes))
        // Collections
        .route("/api/renameCollection", post(admin::rename_collection))
        .route("/api/drop", post(admin::drop_collection))
        .route("/api/listCollections", get(admin::list_collections))
        .layer(DefaultBodyLimit::max(state.config.max_body_size()));

    // Combine routes
    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .fallback(not_found)
        .layer(TimeoutLayer::new(state.config.timeout()))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(from_fn(log_requests))
        .layer(from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the docbridge HTTP server
///
/// Initializes logging and metrics, connects to MongoDB, builds the router,
/// and serves until SIGTERM or Ctrl+C. Startup fails fast when the MongoDB
/// deployment does not answer the initial ping.
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(config.log_level.as_str())
        .with_target(false)
        .json()
        .init();

    if config.metrics_enabled {
        health::install_metrics_recorder()?;
    }

    // Create server state and verify the deployment is reachable
    let state = Arc::new(ServerState::connect(config.clone()).await?);
    state.prepare().await?;
    tracing::info!(
        "Connected to MongoDB at {} (database {}, collection {})",
        config.mongodb_uri,
        config.database,
        config.collection
    );

    // Build router
    let app = build_router(state);

    // Parse bind address
    let addr: SocketAddr = config.socket_addr()?;

    tracing::info!("Starting docbridge server on {}", addr);
    tracing::info!(
        "Timeout: {}s, Max body: {}MB",
        config.timeout_secs,
        config.max_body_size_mb
    );
    tracing::info!(
        "CORS: {}, Metrics: {}",
        config.enable_cors,
        config.metrics_enabled
    );

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
