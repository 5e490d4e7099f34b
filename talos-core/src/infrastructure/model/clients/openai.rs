//! OpenAI-compatible chat-completions client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use crate::infrastructure::model::traits::TextGenerator;
use crate::infrastructure::model::types::{Completion, ProviderError, Usage};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f32,
    /// Cost per 1000 total tokens, used to derive the per-call cost.
    pub cost_per_1k_tokens: f64,
}

impl OpenAiConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: model.into(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            temperature: 0.2,
            cost_per_1k_tokens: 0.000_15,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Works with OpenAI and any provider exposing the same chat-completions
/// shape (Groq, Mistral, local gateways).
pub struct OpenAiClient {
    http: reqwest::Client,
    config: OpenAiConfig,
    api_key: String,
}

impl OpenAiClient {
    /// Fails fast when the configured API key variable is absent rather
    /// than on the first call.
    pub fn new(config: OpenAiConfig) -> Result<Self, ProviderError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ProviderError::missing_api_key("openai", config.api_key_env.clone()))?;
        Ok(Self {
            http: reqwest::Client::new(),
            config,
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<Completion, ProviderError> {
        let payload = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatRequestMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
        };

        info!(model = %self.config.model, "sending chat completion request");
        let start = Instant::now();

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|source| ProviderError::network("openai", source))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::http("openai", status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|source| ProviderError::network("openai", source))?;
        let completion = parse_completion(&body, self.config.cost_per_1k_tokens)?;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            tokens = completion.usage.tokens,
            cost = completion.usage.cost,
            "chat completion received"
        );
        Ok(completion)
    }
}

fn parse_completion(body: &str, cost_per_1k_tokens: f64) -> Result<Completion, ProviderError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|error| ProviderError::invalid_response("openai", error.to_string()))?;

    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .ok_or_else(|| ProviderError::invalid_response("openai", "missing message content"))?;

    let tokens = parsed
        .usage
        .map(|usage| usage.total_tokens)
        .unwrap_or_default();
    let cost = (tokens as f64 / 1000.0) * cost_per_1k_tokens;

    Ok(Completion {
        text,
        usage: Usage::new(tokens, cost),
    })
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatRequestMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageBody>,
}

#[derive(Deserialize)]
struct ChatMessageBody {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_and_usage() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "hello"}}],
            "usage": {"prompt_tokens": 4, "completion_tokens": 8, "total_tokens": 12}
        }"#;
        let completion = parse_completion(body, 0.001).expect("parses");
        assert_eq!(completion.text, "hello");
        assert_eq!(completion.usage.tokens, 12);
        assert!((completion.usage.cost - 0.000_012).abs() < 1e-12);
    }

    #[test]
    fn missing_content_is_invalid_response() {
        let body = r#"{"choices": [], "usage": null}"#;
        let error = parse_completion(body, 0.001).expect_err("rejects");
        assert!(matches!(error, ProviderError::InvalidResponse { .. }));
    }

    #[test]
    fn absent_usage_defaults_to_zero() {
        let body = r#"{"choices": [{"message": {"content": "x"}}]}"#;
        let completion = parse_completion(body, 0.001).expect("parses");
        assert_eq!(completion.usage.tokens, 0);
        assert_eq!(completion.usage.cost, 0.0);
    }
}
