//! LlmClient trait and a scripted implementation for tests

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Result, ShopError};
use crate::llm::types::{CompletionRequest, CompletionResponse};

/// Stateless chat-completion client; each call carries its full context
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Model name used when the request does not override it
    fn model(&self) -> &str;
}

/// Replays queued responses in order and records every request.
/// An exhausted queue answers with an error.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<CompletionResponse>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmClient {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request);
        }
        self.responses
            .lock()
            .map_err(|_| ShopError::Llm("mock response queue poisoned".to_string()))?
            .pop_front()
            .ok_or_else(|| ShopError::Llm("no scripted response left".to_string()))
    }

    fn model(&self) -> &str {
        "mock"
    }
}
