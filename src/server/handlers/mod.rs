//! HTTP handlers for the server.

use axum::Json;
use serde_json::{Value, json};

pub mod job;
pub mod text;

/// Handle GET /api/health.
pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
}
