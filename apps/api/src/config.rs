use anyhow::{Context, Result};

const DEFAULT_MODEL: &str = "gemini-2.5-pro";
const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Application configuration loaded from environment variables.
///
/// Read once at startup and never mutated. A missing Gemini key is tolerated
/// here and reported per request by the generation pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    /// Preferred model, tried before the built-in fallback sequence.
    pub gemini_model: Option<String>,
    pub gemini_api_base: String,
    pub max_total_backoff_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Config {
            gemini_api_key: non_blank("GEMINI_API_KEY"),
            // Set but blank disables the preferred model; unset uses the default.
            gemini_model: match lookup("GEMINI_MODEL") {
                Some(model) => Some(model).filter(|m| !m.trim().is_empty()),
                None => Some(DEFAULT_MODEL.to_string()),
            },
            gemini_api_base: non_blank("GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            max_total_backoff_secs: lookup("MAX_TOTAL_BACKOFF_SECS")
                .unwrap_or_else(|| "120".to_string())
                .parse::<u64>()
                .context("MAX_TOTAL_BACKOFF_SECS must be a whole number of seconds")?,
            port: lookup("PORT")
                .unwrap_or_else(|| "5001".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Model name reported by the health endpoint.
    pub fn model_label(&self) -> &str {
        self.gemini_model.as_deref().unwrap_or("none")
    }
}
