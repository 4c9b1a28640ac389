//! Hosted language-model access.
//!
//! Sampling parameters are fixed for the whole process: the answers are
//! meant to be short and only moderately varied.
pub mod mock;
pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

/// Sampling temperature for every completion.
pub const TEMPERATURE: f32 = 0.4;
/// Upper bound on generated tokens per answer.
pub const MAX_TOKENS: u32 = 500;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("language model request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("language model returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("language model returned no completion")]
    EmptyResponse,

    #[error("invalid API key")]
    InvalidApiKey,
}

/// Text-in, text-out completion model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Model identifier, for logs.
    fn model_name(&self) -> &str;
}
