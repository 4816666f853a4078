//! Course Generation: runs the full pipeline for one prompt.
//!
//! Flow: build_course_prompt → FallbackController → extract_json_payload →
//!       validate_course → CourseDocument.

use tracing::{info, warn};

use crate::errors::AppError;
use crate::generation::extractor::extract_json_payload;
use crate::generation::fallback::{BackoffPolicy, FallbackController, ModelCandidates};
use crate::generation::prompts::build_course_prompt;
use crate::generation::validator::validate_course;
use crate::llm_client::ModelBackend;
use crate::models::course::CourseDocument;

/// Generates a course outline for `user_prompt`.
///
/// `user_prompt` must already be checked as non-empty by the caller.
pub async fn generate_course(
    llm: &dyn ModelBackend,
    candidates: &ModelCandidates,
    backoff: BackoffPolicy,
    user_prompt: &str,
) -> Result<CourseDocument, AppError> {
    // Step 1: Build the instruction
    let prompt = build_course_prompt(user_prompt);

    // Step 2: Model fallback
    let generated = FallbackController::new(llm, candidates, backoff)
        .run(&prompt)
        .await?;
    info!(
        "Model {} answered after {} attempt(s)",
        generated.model,
        generated.attempts.len()
    );

    // Step 3: Strip fences
    let payload = extract_json_payload(&generated.text);

    // Step 4: Validate top-level shape
    let course = validate_course(payload)?;

    match course.outline() {
        Some(modules) => info!(
            "Course {:?} generated: {} modules, {} lessons, {} quizzes",
            course.course_title().unwrap_or_default(),
            modules.len(),
            modules.iter().map(|m| m.lessons.len()).sum::<usize>(),
            modules.iter().map(|m| m.quizzes.len()).sum::<usize>(),
        ),
        None => warn!("Course generated but nested modules do not match the expected shape"),
    }

    Ok(course)
}
