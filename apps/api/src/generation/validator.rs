//! Response Validator: parses extracted model output and enforces the
//! top-level course fields. Nested modules, lessons and quizzes pass through.

use serde_json::Value;
use thiserror::Error;

use crate::models::course::CourseDocument;

pub const REQUIRED_FIELDS: [&str; 2] = ["courseTitle", "modules"];

#[derive(Debug, Error)]
pub enum ResponseError {
    /// The extracted text is not JSON at all.
    #[error("Failed to parse AI response as JSON: {parse_error}")]
    Malformed {
        raw_response: String,
        parse_error: String,
    },

    /// Valid JSON without the required top-level fields.
    #[error("Missing required fields in generated course: {}", .missing.join(", "))]
    SchemaViolation { missing: Vec<String> },
}

/// Parses `extracted` as a course document.
pub fn validate_course(extracted: &str) -> Result<CourseDocument, ResponseError> {
    let value: Value =
        serde_json::from_str(extracted).map_err(|e| ResponseError::Malformed {
            raw_response: extracted.to_string(),
            parse_error: e.to_string(),
        })?;

    // A non-object top level has none of the required fields.
    let Value::Object(object) = value else {
        return Err(ResponseError::SchemaViolation {
            missing: REQUIRED_FIELDS.iter().map(|f| f.to_string()).collect(),
        });
    };

    let missing: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|field| !object.contains_key(**field))
        .map(|field| field.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(ResponseError::SchemaViolation { missing });
    }

    Ok(CourseDocument::from_object(object))
}
