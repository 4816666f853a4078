//! Scripted in-memory backend for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{LlmError, ModelBackend};

/// Replays a fixed script of responses and records every call.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<(String, Instant)>>,
    configured: bool,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
            configured: true,
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new(vec![])
        }
    }

    /// Models called so far, in order.
    pub fn called_models(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
    }

    /// Instants at which each call was made.
    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

pub fn quota_error(message: &str) -> LlmError {
    LlmError::Api {
        status: 429,
        message: message.to_string(),
    }
}

pub fn server_error(status: u16, message: &str) -> LlmError {
    LlmError::Api {
        status,
        message: message.to_string(),
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn generate(&self, model: &str, _prompt: &str) -> Result<String, LlmError> {
        self.calls
            .lock()
            .unwrap()
            .push((model.to_string(), Instant::now()));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyContent))
    }
}
