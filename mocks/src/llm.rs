//! Scripted language-model client
//!
//! Answers prompts from a queue of canned responses and records every prompt
//! it receives, so planning code can be tested without network access.

use agro_advisor::LlmClient;
use agro_core::error::{AgroError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct MockLlmClient {
    responses: Arc<Mutex<VecDeque<Result<String>>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful answer
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.responses.lock().push_back(Ok(text.into()));
        self
    }

    /// Queue a failure
    pub fn with_error(self, error: AgroError) -> Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    /// Prompts received so far, oldest first
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn assert_prompt_contains(&self, needle: &str) {
        let prompts = self.prompts.lock();
        assert!(
            prompts.iter().any(|prompt| prompt.contains(needle)),
            "No prompt contained '{needle}'. Prompts: {:?}",
            *prompts
        );
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(AgroError::Upstream("no scripted response left".to_string())))
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}
