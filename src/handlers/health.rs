//! Liveness endpoint handler.

use axum::{response::IntoResponse, Json};
use serde_json::json;
use tracing::{debug, instrument};

/// Handler for the /healthz endpoint.
#[instrument]
pub async fn health_handler() -> impl IntoResponse {
    debug!("Processing /healthz request");
    Json(json!({ "status": "ok" }))
}
