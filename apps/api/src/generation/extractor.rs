//! Response Extractor: recovers the JSON payload from model output that may
//! be wrapped in prose and markdown code fences.
//!
//! Lexical only: a ```` ```json ```` fence wins over a bare ```` ``` ```` fence,
//! and anything without a closing fence is returned trimmed and unchanged.

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Returns the JSON-looking part of `raw`.
pub fn extract_json_payload(raw: &str) -> &str {
    let text = raw.trim();

    let opener = if text.contains(JSON_FENCE) {
        JSON_FENCE
    } else if text.contains(FENCE) {
        FENCE
    } else {
        return text;
    };

    let Some(open_at) = text.find(opener) else {
        return text;
    };
    let body_start = open_at + opener.len();

    match text[body_start..].find(FENCE) {
        Some(close_at) => text[body_start..body_start + close_at].trim(),
        None => text,
    }
}
