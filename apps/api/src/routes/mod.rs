pub mod health;

use axum::{
    http::Uri,
    routing::{get, post},
    Router,
};

use crate::errors::AppError;
use crate::generation::handlers;
use crate::state::AppState;

const AVAILABLE_ENDPOINTS: &str = "GET /health, POST /generate";

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!(
        "Route {} not found. Available endpoints: {AVAILABLE_ENDPOINTS}",
        uri.path()
    ))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/generate", post(handlers::handle_generate))
        .fallback(not_found)
        .with_state(state)
}
