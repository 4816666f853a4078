use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service status and the configured default model.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "AI Course Builder Service",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.config.model_label(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
