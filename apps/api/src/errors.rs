use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::generation::fallback::{FallbackError, GenerationAttempt};
use crate::generation::validator::ResponseError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Every variant carries enough context for the caller to diagnose the
/// failure without access to server logs.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Generation failed after trying {tried_models:?}")]
    GenerationExhausted {
        tried_models: Vec<String>,
        /// Per-model outcome, so callers can tell quota waits from hard failures.
        attempts: Vec<GenerationAttempt>,
        last_error: Option<String>,
    },

    #[error("Malformed model response: {parse_error}")]
    MalformedResponse {
        raw_response: String,
        parse_error: String,
    },

    #[error("Schema violation: missing {missing:?}")]
    SchemaViolation { missing: Vec<String> },

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<FallbackError> for AppError {
    fn from(err: FallbackError) -> Self {
        match err {
            FallbackError::NotConfigured => {
                AppError::Configuration("Gemini API key not configured".to_string())
            }
            FallbackError::Exhausted {
                tried_models,
                attempts,
                last_error,
            } => AppError::GenerationExhausted {
                tried_models,
                attempts,
                last_error: last_error.map(|e| e.to_string()),
            },
        }
    }
}

impl From<ResponseError> for AppError {
    fn from(err: ResponseError) -> Self {
        match err {
            ResponseError::Malformed {
                raw_response,
                parse_error,
            } => AppError::MalformedResponse {
                raw_response,
                parse_error,
            },
            ResponseError::SchemaViolation { missing } => AppError::SchemaViolation { missing },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut context = Map::new();

        let (status, code, message) = match &self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone()),
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIGURATION_ERROR",
                    msg.clone(),
                )
            }
            AppError::GenerationExhausted {
                tried_models,
                attempts,
                last_error,
            } => {
                tracing::error!("Generation exhausted: tried {tried_models:?}");
                context.insert("triedModels".to_string(), json!(tried_models));
                context.insert("attempts".to_string(), json!(attempts));
                if let Some(last) = last_error {
                    context.insert("lastError".to_string(), json!(last));
                }
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "GENERATION_EXHAUSTED",
                    "Failed to generate response".to_string(),
                )
            }
            AppError::MalformedResponse {
                raw_response,
                parse_error,
            } => {
                tracing::error!("Model returned malformed JSON: {parse_error}");
                context.insert("raw_response".to_string(), json!(raw_response));
                context.insert("parse_error".to_string(), json!(parse_error));
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "MALFORMED_RESPONSE",
                    "Failed to parse AI response as JSON".to_string(),
                )
            }
            AppError::SchemaViolation { missing } => {
                tracing::error!("Model response missing fields: {missing:?}");
                context.insert("missingFields".to_string(), json!(missing));
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SCHEMA_VIOLATION",
                    "Missing required fields in generated course".to_string(),
                )
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
        };

        let mut body = Map::new();
        body.insert(
            "error".to_string(),
            json!({
                "code": code,
                "message": message
            }),
        );
        body.extend(context);

        (status, Json(Value::Object(body))).into_response()
    }
}
