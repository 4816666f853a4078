//! Model Fallback: walks a prioritized, deduplicated list of Gemini models
//! until one of them produces output.
//!
//! Quota failures wait (hinted delay + 1s, else 5s) and move on to the next
//! model. Any other failure moves on immediately; on the last model it ends
//! the sequence. The same model is never called twice in one request.
//!
//! Each request runs its own sequence over the shared, read-only
//! `ModelCandidates`. Calls are strictly sequential.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::llm_client::{LlmError, ModelBackend};

/// Known-good models appended after the configured default.
pub const FALLBACK_MODELS: &[&str] = &[
    "gemini-2.5-pro",
    "gemini-pro-latest",
    "gemini-2.5-flash",
    "gemini-2.0-flash",
];

/// Wait applied to a quota failure that carries no retry hint.
pub const DEFAULT_QUOTA_DELAY_SECS: u64 = 5;

// ────────────────────────────────────────────────────────────────────────────
// Candidate list
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelCandidate {
    pub name: String,
    /// 0 is tried first.
    pub priority: u32,
}

/// Ordered, duplicate-free model list. Built once at startup.
#[derive(Debug, Clone)]
pub struct ModelCandidates(Arc<[ModelCandidate]>);

impl ModelCandidates {
    /// Configured default first, then `FALLBACK_MODELS` minus anything already listed.
    pub fn resolve(default_model: Option<&str>) -> Self {
        Self::from_names(default_model.into_iter().chain(FALLBACK_MODELS.iter().copied()))
    }

    /// Keeps the first occurrence of each name. Blank names are skipped.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut candidates: Vec<ModelCandidate> = Vec::new();
        for name in names.into_iter().map(str::trim) {
            if name.is_empty() || candidates.iter().any(|c| c.name == name) {
                continue;
            }
            candidates.push(ModelCandidate {
                name: name.to_string(),
                priority: candidates.len() as u32,
            });
        }
        Self(candidates.into())
    }

    pub fn as_slice(&self) -> &[ModelCandidate] {
        &self.0
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|c| c.name.as_str()).collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Failure classification
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Rate/quota exhaustion. `hint_secs` is the backend's suggested delay, if any.
    Quota { hint_secs: Option<u64> },
    Other,
}

/// The one place that decides whether a backend failure is a quota error.
pub fn classify_failure(err: &LlmError) -> FailureClass {
    let message = err.to_string();
    if message.contains("429") || message.to_lowercase().contains("quota") {
        FailureClass::Quota {
            hint_secs: retry_hint_secs(&message),
        }
    } else {
        FailureClass::Other
    }
}

// Only numbers that sit in a retry context count. A bare number elsewhere in
// the message (model versions, quota limits) is ignored.
static RETRY_HINT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // "Please retry in 55.7s."
        r"(?i)\bretry\s+in\s+(\d+)",
        // "retryDelay": "37s"  /  retryDelay: 37s
        r#"(?i)\bretry_?delay"?\s*:\s*"?(\d+)"#,
        // retry_delay { seconds: 37 }
        r"(?i)\bretry_delay\s*\{\s*seconds:\s*(\d+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("retry hint pattern is a valid regex"))
    .collect()
});

/// Extracts the backend's suggested retry delay in whole seconds.
pub fn retry_hint_secs(text: &str) -> Option<u64> {
    RETRY_HINT_PATTERNS.iter().find_map(|re| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok())
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Backoff policy and step decision
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub default_delay: Duration,
    /// Cap on the cumulative quota wait of one request.
    pub max_total_wait: Duration,
}

impl BackoffPolicy {
    pub fn new(max_total_wait: Duration) -> Self {
        Self {
            default_delay: Duration::from_secs(DEFAULT_QUOTA_DELAY_SECS),
            max_total_wait,
        }
    }

    /// `hint + 1` seconds when the backend suggested a delay, else the default.
    pub fn quota_delay(&self, hint_secs: Option<u64>) -> Duration {
        match hint_secs {
            Some(secs) => Duration::from_secs(secs.saturating_add(1)),
            None => self.default_delay,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Sleep `wait` (possibly zero), then try the next candidate.
    Advance { wait: Duration },
    /// Stop; the sequence is exhausted.
    Stop,
}

/// Pure transition function of the fallback loop.
pub fn next_step(
    class: FailureClass,
    is_last: bool,
    waited: Duration,
    policy: &BackoffPolicy,
) -> Step {
    if is_last {
        return Step::Stop;
    }
    match class {
        FailureClass::Quota { hint_secs } => {
            let wait = policy.quota_delay(hint_secs);
            if waited + wait > policy.max_total_wait {
                Step::Stop
            } else {
                Step::Advance { wait }
            }
        }
        FailureClass::Other => Step::Advance {
            wait: Duration::ZERO,
        },
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Attempts and outcomes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success { output_bytes: usize },
    TransientFailure { retry_after_secs: u64 },
    PermanentFailure { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationAttempt {
    pub model: String,
    pub outcome: AttemptOutcome,
}

/// Raw model output together with the attempt log that produced it.
#[derive(Debug)]
pub struct Generated {
    pub model: String,
    pub text: String,
    pub attempts: Vec<GenerationAttempt>,
}

#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("model backend not configured")]
    NotConfigured,

    #[error("generation failed after trying {tried_models:?}")]
    Exhausted {
        tried_models: Vec<String>,
        attempts: Vec<GenerationAttempt>,
        #[source]
        last_error: Option<LlmError>,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// Controller
// ────────────────────────────────────────────────────────────────────────────

pub struct FallbackController<'a> {
    backend: &'a dyn ModelBackend,
    candidates: &'a ModelCandidates,
    policy: BackoffPolicy,
}

impl<'a> FallbackController<'a> {
    pub fn new(
        backend: &'a dyn ModelBackend,
        candidates: &'a ModelCandidates,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            backend,
            candidates,
            policy,
        }
    }

    /// Runs the fallback sequence for one prompt.
    pub async fn run(&self, prompt: &str) -> Result<Generated, FallbackError> {
        if !self.backend.is_configured() {
            return Err(FallbackError::NotConfigured);
        }

        let candidates = self.candidates.as_slice();
        info!("Attempting generation with models: {:?}", self.candidates.names());

        let mut attempts: Vec<GenerationAttempt> = Vec::with_capacity(candidates.len());
        let mut waited = Duration::ZERO;
        let mut last_error = None;

        for (cursor, candidate) in candidates.iter().enumerate() {
            let is_last = cursor + 1 == candidates.len();
            info!(
                "Trying model {} ({}/{})",
                candidate.name,
                cursor + 1,
                candidates.len()
            );

            let err = match self.backend.generate(&candidate.name, prompt).await {
                Ok(text) => {
                    info!("Model {} succeeded ({} bytes)", candidate.name, text.len());
                    attempts.push(GenerationAttempt {
                        model: candidate.name.clone(),
                        outcome: AttemptOutcome::Success {
                            output_bytes: text.len(),
                        },
                    });
                    return Ok(Generated {
                        model: candidate.name.clone(),
                        text,
                        attempts,
                    });
                }
                Err(err) => err,
            };

            warn!("Attempt failed with model {}: {err}", candidate.name);
            let class = classify_failure(&err);
            let step = next_step(class, is_last, waited, &self.policy);

            attempts.push(GenerationAttempt {
                model: candidate.name.clone(),
                outcome: match class {
                    // Wait actually taken; zero when the sequence stops here.
                    FailureClass::Quota { .. } => AttemptOutcome::TransientFailure {
                        retry_after_secs: match step {
                            Step::Advance { wait } => wait.as_secs(),
                            Step::Stop => 0,
                        },
                    },
                    FailureClass::Other => AttemptOutcome::PermanentFailure {
                        error: err.to_string(),
                    },
                },
            });
            last_error = Some(err);

            match step {
                Step::Advance { wait } if !wait.is_zero() => {
                    match class {
                        FailureClass::Quota { hint_secs: Some(_) } => info!(
                            "Quota exceeded. Waiting for {}s as requested by API...",
                            wait.as_secs()
                        ),
                        _ => info!("Quota exceeded. Waiting for {}s (default)...", wait.as_secs()),
                    }
                    tokio::time::sleep(wait).await;
                    waited += wait;
                }
                Step::Advance { .. } => {}
                Step::Stop => {
                    if !is_last {
                        warn!(
                            "Cumulative quota wait would exceed {}s; giving up",
                            self.policy.max_total_wait.as_secs()
                        );
                    }
                    break;
                }
            }
        }

        let tried_models: Vec<String> = attempts.iter().map(|a| a.model.clone()).collect();
        warn!("Generation failed; tried models: {:?}", tried_models);

        Err(FallbackError::Exhausted {
            tried_models,
            attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::stub::{quota_error, server_error, ScriptedBackend};

    fn ok(text: &str) -> Result<String, LlmError> {
        Ok(text.to_string())
    }

    // ── candidate ordering ─────────────────────────────────────────────────

    #[test]
    fn test_default_model_first_then_fallbacks() {
        let candidates = ModelCandidates::resolve(Some("gemini-1.5-pro"));
        assert_eq!(
            candidates.names(),
            vec![
                "gemini-1.5-pro",
                "gemini-2.5-pro",
                "gemini-pro-latest",
                "gemini-2.5-flash",
                "gemini-2.0-flash"
            ]
        );
        let priorities: Vec<u32> = candidates.as_slice().iter().map(|c| c.priority).collect();
        assert_eq!(priorities, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_default_model_in_fallbacks_is_not_duplicated() {
        let candidates = ModelCandidates::resolve(Some("gemini-2.5-flash"));
        assert_eq!(
            candidates.names(),
            vec![
                "gemini-2.5-flash",
                "gemini-2.5-pro",
                "gemini-pro-latest",
                "gemini-2.0-flash"
            ]
        );
    }

    #[test]
    fn test_no_default_model_uses_fallbacks_only() {
        let candidates = ModelCandidates::resolve(None);
        assert_eq!(candidates.names(), FALLBACK_MODELS.to_vec());
    }

    #[test]
    fn test_from_names_skips_blank_and_repeated_names() {
        let candidates = ModelCandidates::from_names(["a", " ", "b", "a", " b ", "c"]);
        assert_eq!(candidates.names(), vec!["a", "b", "c"]);
    }

    // ── classification ─────────────────────────────────────────────────────

    #[test]
    fn test_429_status_is_quota() {
        let class = classify_failure(&server_error(429, "Resource has been exhausted"));
        assert_eq!(class, FailureClass::Quota { hint_secs: None });
    }

    #[test]
    fn test_quota_marker_is_case_insensitive() {
        let class = classify_failure(&server_error(403, "QUOTA exceeded for project"));
        assert!(matches!(class, FailureClass::Quota { .. }));
    }

    #[test]
    fn test_other_errors_are_not_quota() {
        let class = classify_failure(&server_error(401, "API key not valid"));
        assert_eq!(class, FailureClass::Other);
        assert_eq!(classify_failure(&LlmError::EmptyContent), FailureClass::Other);
    }

    #[test]
    fn test_retry_hint_forms() {
        assert_eq!(retry_hint_secs("Please retry in 55.7s."), Some(55));
        assert_eq!(retry_hint_secs("retry in 3"), Some(3));
        assert_eq!(retry_hint_secs(r#"details: {"retryDelay": "37s"}"#), Some(37));
        assert_eq!(retry_hint_secs("quota hit (retryDelay: \"12s\")"), Some(12));
        assert_eq!(retry_hint_secs("retry_delay { seconds: 9 }"), Some(9));
    }

    #[test]
    fn test_retry_hint_ignores_unrelated_numbers() {
        assert_eq!(
            retry_hint_secs("Quota exceeded for gemini-2.5-pro, limit: 50 requests per day"),
            None
        );
    }

    #[test]
    fn test_quota_delay_is_hint_plus_one_or_default() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.quota_delay(Some(3)), Duration::from_secs(4));
        assert_eq!(policy.quota_delay(None), Duration::from_secs(5));
    }

    // ── step decision ──────────────────────────────────────────────────────

    #[test]
    fn test_quota_on_non_last_advances_after_wait() {
        let step = next_step(
            FailureClass::Quota { hint_secs: Some(3) },
            false,
            Duration::ZERO,
            &BackoffPolicy::default(),
        );
        assert_eq!(
            step,
            Step::Advance {
                wait: Duration::from_secs(4)
            }
        );
    }

    #[test]
    fn test_other_failure_on_non_last_advances_without_wait() {
        let step = next_step(
            FailureClass::Other,
            false,
            Duration::ZERO,
            &BackoffPolicy::default(),
        );
        assert_eq!(
            step,
            Step::Advance {
                wait: Duration::ZERO
            }
        );
    }

    #[test]
    fn test_any_failure_on_last_stops() {
        let policy = BackoffPolicy::default();
        assert_eq!(
            next_step(FailureClass::Other, true, Duration::ZERO, &policy),
            Step::Stop
        );
        assert_eq!(
            next_step(
                FailureClass::Quota { hint_secs: None },
                true,
                Duration::ZERO,
                &policy
            ),
            Step::Stop
        );
    }

    #[test]
    fn test_quota_wait_beyond_cap_stops() {
        let policy = BackoffPolicy::new(Duration::from_secs(10));
        let step = next_step(
            FailureClass::Quota { hint_secs: Some(7) },
            false,
            Duration::from_secs(5),
            &policy,
        );
        assert_eq!(step, Step::Stop);
    }

    // ── controller ─────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_first_success_stops_sequence() {
        let backend = ScriptedBackend::new(vec![ok("{}")]);
        let candidates = ModelCandidates::from_names(["m1", "m2"]);
        let controller = FallbackController::new(&backend, &candidates, BackoffPolicy::default());

        let generated = controller.run("prompt").await.unwrap();

        assert_eq!(generated.model, "m1");
        assert_eq!(generated.text, "{}");
        assert_eq!(backend.called_models(), vec!["m1"]);
        assert_eq!(
            generated.attempts[0].outcome,
            AttemptOutcome::Success { output_bytes: 2 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_failure_advances_to_next_model_after_hinted_delay() {
        let backend = ScriptedBackend::new(vec![
            Err(quota_error("Quota exceeded. Please retry in 3s.")),
            ok("done"),
        ]);
        let candidates = ModelCandidates::from_names(["m1", "m2", "m3"]);
        let controller = FallbackController::new(&backend, &candidates, BackoffPolicy::default());

        let generated = controller.run("prompt").await.unwrap();

        assert_eq!(generated.model, "m2");
        assert_eq!(backend.called_models(), vec!["m1", "m2"]);
        let times = backend.call_times();
        assert_eq!(times[1] - times[0], Duration::from_secs(4));
        assert_eq!(
            generated.attempts[0].outcome,
            AttemptOutcome::TransientFailure {
                retry_after_secs: 4
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_failure_without_hint_waits_default() {
        let backend = ScriptedBackend::new(vec![Err(quota_error("Resource exhausted")), ok("x")]);
        let candidates = ModelCandidates::from_names(["m1", "m2"]);
        let controller = FallbackController::new(&backend, &candidates, BackoffPolicy::default());

        controller.run("prompt").await.unwrap();

        let times = backend.call_times();
        assert_eq!(times[1] - times[0], Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_quota_failure_advances_immediately() {
        let backend = ScriptedBackend::new(vec![
            Err(server_error(404, "model not found")),
            ok("x"),
        ]);
        let candidates = ModelCandidates::from_names(["m1", "m2"]);
        let controller = FallbackController::new(&backend, &candidates, BackoffPolicy::default());

        let generated = controller.run("prompt").await.unwrap();

        assert_eq!(generated.model, "m2");
        let times = backend.call_times();
        assert_eq!(times[1] - times[0], Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_non_quota_failures_exhaust_with_tried_models_in_order() {
        let backend = ScriptedBackend::new(vec![
            Err(server_error(400, "bad request")),
            Err(server_error(500, "internal")),
            Err(server_error(401, "API key not valid")),
        ]);
        let candidates = ModelCandidates::from_names(["m1", "m2", "m3"]);
        let controller = FallbackController::new(&backend, &candidates, BackoffPolicy::default());

        let err = controller.run("prompt").await.unwrap_err();

        match err {
            FallbackError::Exhausted {
                tried_models,
                last_error,
                ..
            } => {
                assert_eq!(tried_models, vec!["m1", "m2", "m3"]);
                let last = last_error.expect("terminal error is propagated");
                assert!(last.to_string().contains("API key not valid"));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_on_last_model_does_not_sleep() {
        let backend = ScriptedBackend::new(vec![Err(quota_error("quota"))]);
        let candidates = ModelCandidates::from_names(["only"]);
        let controller = FallbackController::new(&backend, &candidates, BackoffPolicy::default());
        let started = tokio::time::Instant::now();

        let err = controller.run("prompt").await.unwrap_err();

        assert_eq!(started.elapsed(), Duration::ZERO);
        match err {
            FallbackError::Exhausted { attempts, .. } => assert_eq!(
                attempts[0].outcome,
                AttemptOutcome::TransientFailure {
                    retry_after_secs: 0
                }
            ),
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cumulative_wait_cap_ends_sequence() {
        let backend = ScriptedBackend::new(vec![
            Err(quota_error("retry in 5s")),
            Err(quota_error("retry in 5s")),
            ok("never reached"),
        ]);
        let candidates = ModelCandidates::from_names(["m1", "m2", "m3"]);
        let controller = FallbackController::new(
            &backend,
            &candidates,
            BackoffPolicy::new(Duration::from_secs(10)),
        );

        let err = controller.run("prompt").await.unwrap_err();

        assert_eq!(backend.called_models(), vec!["m1", "m2"]);
        match err {
            FallbackError::Exhausted {
                tried_models,
                attempts,
                ..
            } => {
                assert_eq!(tried_models, vec!["m1", "m2"]);
                let waits: Vec<AttemptOutcome> =
                    attempts.into_iter().map(|a| a.outcome).collect();
                assert_eq!(
                    waits,
                    vec![
                        AttemptOutcome::TransientFailure {
                            retry_after_secs: 6
                        },
                        AttemptOutcome::TransientFailure {
                            retry_after_secs: 0
                        },
                    ]
                );
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_backend_is_never_called() {
        let backend = ScriptedBackend::unconfigured();
        let candidates = ModelCandidates::resolve(None);
        let controller = FallbackController::new(&backend, &candidates, BackoffPolicy::default());

        let err = controller.run("prompt").await.unwrap_err();

        assert!(matches!(err, FallbackError::NotConfigured));
        assert!(backend.called_models().is_empty());
    }
}
