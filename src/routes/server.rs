use crate::config::VERSION;
use axum::Json;
use serde_json::{json, Value};

/// GET /healthcheck
///
/// Liveness probe also reporting the running version
pub async fn healthcheck() -> Json<Value> {
    Json(json!({ "healthy": true, "version": VERSION }))
}
