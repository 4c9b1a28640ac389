/// OpenAI completions client.
///
/// Talks to the legacy `/v1/completions` endpoint: the chat prompt is
/// flattened to text before it gets here, and the instruct model answers
/// with plain text.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{LanguageModel, LlmError, MAX_TOKENS, TEMPERATURE};
use crate::config::LlmConfig;

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    usage: Option<CompletionUsage>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CompletionUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

pub struct OpenAiCompletions {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OpenAiCompletions {
    pub fn new(settings: &LlmConfig, api_key: &str) -> Result<Self, LlmError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| LlmError::InvalidApiKey)?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(secs) = settings.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
        })
    }

    /// Confirm the key is accepted and the model exists.
    pub async fn verify(&self) -> Result<(), LlmError> {
        let url = format!("{}/v1/models/{}", self.base_url, self.model);
        let resp = self.client.get(&url).send().await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(LlmError::InvalidApiKey);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        info!("Language model {} is available", self.model);
        Ok(())
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompletions {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let body = CompletionRequest {
            model: &self.model,
            prompt,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let resp = self
            .client
            .post(format!("{}/v1/completions", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = resp.json().await?;
        if let Some(usage) = &parsed.usage {
            debug!(
                prompt_tokens = ?usage.prompt_tokens,
                completion_tokens = ?usage.completion_tokens,
                "completion usage"
            );
        }

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?;
        if choice.finish_reason.as_deref() == Some("length") {
            debug!("completion truncated at {MAX_TOKENS} tokens");
        }
        Ok(choice.text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OpenAiCompletions {
        let settings = LlmConfig {
            base_url: server.uri(),
            ..LlmConfig::default()
        };
        OpenAiCompletions::new(&settings, "sk-test").unwrap()
    }

    #[tokio::test]
    async fn test_complete_sends_fixed_sampling() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"text": "\nRest and fluids.", "index": 0, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 40, "completion_tokens": 5, "total_tokens": 45}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let answer = client(&server).complete("System: ...\nHuman: flu?").await.unwrap();
        // Returned verbatim, leading newline included.
        assert_eq!(answer, "\nRest and fluids.");

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = requests[0].body_json().unwrap();
        assert_eq!(body["model"], "gpt-3.5-turbo-instruct");
        assert_eq!(body["prompt"], "System: ...\nHuman: flu?");
        assert_eq!(body["max_tokens"], 500);
        let temperature = body["temperature"].as_f64().unwrap();
        assert!((temperature - 0.4).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_complete_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = client(&server).complete("hi").await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 429, ref body } if body == "rate limited"));
    }

    #[tokio::test]
    async fn test_complete_no_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let err = client(&server).complete("hi").await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_complete_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"choices": [{"text": "late"}]}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let settings = LlmConfig {
            base_url: server.uri(),
            timeout_secs: Some(1),
            ..LlmConfig::default()
        };
        let llm = OpenAiCompletions::new(&settings, "sk-test").unwrap();

        let err = llm.complete("hi").await.unwrap_err();
        assert!(matches!(err, LlmError::Request(ref e) if e.is_timeout()));
    }

    #[tokio::test]
    async fn test_verify() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models/gpt-3.5-turbo-instruct"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "gpt-3.5-turbo-instruct",
                "object": "model"
            })))
            .mount(&server)
            .await;

        client(&server).verify().await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_rejected_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models/gpt-3.5-turbo-instruct"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server).verify().await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidApiKey));
    }
}
