use std::sync::Arc;

use crate::config::Config;
use crate::generation::fallback::{BackoffPolicy, ModelCandidates};
use crate::llm_client::ModelBackend;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Everything here is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    /// Model backend. `GeminiClient` in production.
    pub llm: Arc<dyn ModelBackend>,
    /// Resolved once from `GEMINI_MODEL` plus the built-in fallbacks.
    pub candidates: ModelCandidates,
    pub backoff: BackoffPolicy,
    pub config: Config,
}
