//! Docbridge - HTTP REST gateway for MongoDB document operations
//!
//! This crate provides an HTTP server that exposes a MongoDB collection's
//! CRUD, query, aggregation, index, and collection-management operations as
//! REST endpoints. Every endpoint is a thin passthrough to the driver; the
//! one piece of real policy is [`oid`], which promotes identifier-shaped
//! strings in client-supplied filters into native `ObjectId`s before they
//! reach the driver.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use docbridge::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     docbridge::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! ## Service
//!
//! - `GET /` - API information
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe (pings MongoDB)
//! - `GET /metrics` - Prometheus metrics
//!
//! ## Documents
//!
//! - `POST /api/insertOne` / `POST /api/insertMany`
//! - `POST /api/find` / `POST /api/findOne`
//! - `POST /api/distinct` / `POST /api/countDocuments`
//! - `POST /api/updateOne` / `POST /api/updateMany`
//! - `POST /api/replaceOne`
//! - `POST /api/deleteOne` / `POST /api/deleteMany`
//! - `POST /api/aggregate`
//! - `POST /api/bulkWrite`
//! - `POST /api/findOneAndUpdate` / `findOneAndDelete` / `findOneAndReplace`
//!
//! ## Administration
//!
//! - `POST /api/createIndex` / `POST /api/dropIndex` / `GET /api/getIndexes`
//! - `POST /api/renameCollection` / `POST /api/drop`
//! - `GET /api/listCollections`
//!
//! Responses carry a `success` flag plus operation-specific camelCase
//! fields; errors use `{"success": false, "error": {"code", "message"}}`.

pub mod config;
pub mod error;
pub mod middleware;
pub mod oid;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
