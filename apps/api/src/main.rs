mod config;
mod errors;
mod generation;
mod llm_client;
mod models;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::generation::fallback::{BackoffPolicy, ModelCandidates};
use crate::llm_client::GeminiClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log,
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Course Builder API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize model backend; a missing key is reported per request
    let llm = GeminiClient::new(config.gemini_api_key.clone(), &config.gemini_api_base)?;
    if config.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; /generate will fail until it is configured");
    }

    let candidates = ModelCandidates::resolve(config.gemini_model.as_deref());
    info!("Model candidates: {:?}", candidates.names());

    let backoff = BackoffPolicy::new(Duration::from_secs(config.max_total_backoff_secs));

    // Build app state
    let state = AppState {
        llm: Arc::new(llm),
        candidates,
        backoff,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
