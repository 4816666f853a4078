//! Axum route handlers for the Generation API.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::generator::generate_course;
use crate::models::course::CourseDocument;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateCourseRequest {
    pub prompt: Option<String>,
}

/// POST /generate
///
/// Turns a free-text prompt into a course outline. A missing or unreadable
/// body is reported the same way as a missing prompt.
pub async fn handle_generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateCourseRequest>, JsonRejection>,
) -> Result<Json<CourseDocument>, AppError> {
    let prompt = payload
        .ok()
        .and_then(|Json(request)| request.prompt)
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("Missing 'prompt' in request body".to_string()))?;

    let request_id = Uuid::new_v4();
    let span = info_span!("generate_course", %request_id);

    async move {
        info!(
            "Received course generation request: {}",
            prompt.chars().take(100).collect::<String>()
        );
        let course =
            generate_course(state.llm.as_ref(), &state.candidates, state.backoff, &prompt).await?;
        Ok::<_, AppError>(Json(course))
    }
    .instrument(span)
    .await
}
