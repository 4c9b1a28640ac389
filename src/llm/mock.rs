/// Canned language model for tests.
use std::sync::Mutex;

use async_trait::async_trait;

use super::{LanguageModel, LlmError};

/// Returns the same answer (or the same failure) for every prompt and
/// keeps every prompt it was given.
pub struct StaticModel {
    reply: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl StaticModel {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            reply: Ok(answer.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A model whose every call fails with an API error carrying `body`.
    pub fn failing(body: impl Into<String>) -> Self {
        Self {
            reply: Err(body.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for StaticModel {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        if let Ok(mut p) = self.prompts.lock() {
            p.push(prompt.to_string());
        }
        match &self.reply {
            Ok(answer) => Ok(answer.clone()),
            Err(body) => Err(LlmError::Api {
                status: 503,
                body: body.clone(),
            }),
        }
    }

    fn model_name(&self) -> &str {
        "static"
    }
}
