// Course generation: prompt → model fallback → extract → validate.
// All model calls go through llm_client; no direct Gemini HTTP calls here.

pub mod extractor;
pub mod fallback;
pub mod generator;
pub mod handlers;
pub mod prompts;
pub mod validator;
