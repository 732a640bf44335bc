//! Scripted backend for tests and offline dry runs.

use super::{CompletionRequest, CompletionResponse, ModelBackend};
use crate::error::ModelCallError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Answers each call with the next scripted reply and records every request.
///
/// When the script runs out, the fallback reply is used (by default a short
/// canned text).
pub struct MockBackend {
    script: Mutex<VecDeque<Result<String, ModelCallError>>>,
    fallback: Result<String, ModelCallError>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok("Mock analysis".to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful reply.
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()))
    }

    /// Queue a failed call.
    pub fn fail(self, error: ModelCallError) -> Self {
        self.push(Err(error))
    }

    /// Reply used once the script is exhausted.
    pub fn otherwise(mut self, reply: Result<String, ModelCallError>) -> Self {
        self.fallback = reply;
        self
    }

    fn push(self, reply: Result<String, ModelCallError>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(reply);
        self
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ModelCallError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        let next = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        let text = next?;
        if text.trim().is_empty() {
            return Err(ModelCallError::EmptyResponse);
        }
        Ok(CompletionResponse {
            input_tokens: request.image_count() as u64 * 1000,
            output_tokens: text.split_whitespace().count() as u64,
            text,
        })
    }
}
