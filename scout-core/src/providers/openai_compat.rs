//! OpenAI-compatible LLM provider.
//!
//! Supports OpenAI, Azure OpenAI, Ollama, vLLM, LM Studio, and any endpoint
//! that follows the OpenAI chat completions API format.

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::llm::LlmProvider;
use crate::types::{CompletionRequest, CompletionResponse, Message, Role, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

/// OpenAI-compatible LLM provider.
pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    context_window: usize,
    default_max_tokens: usize,
}

impl OpenAiCompatibleProvider {
    /// Create a new provider from configuration.
    ///
    /// Reads the API key from the environment variable named in
    /// `config.api_key_env`. Local endpoints (localhost base URLs) do not
    /// require a real key and fall back to a dummy bearer token.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let is_local = config
            .base_url
            .as_ref()
            .map(|u| u.contains("localhost") || u.contains("127.0.0.1"))
            .unwrap_or(false);

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .or_else(|| {
                if is_local {
                    debug!("No API key set for local provider; using dummy bearer token");
                    Some("local".to_string())
                } else {
                    None
                }
            })
            .ok_or_else(|| LlmError::AuthFailed {
                provider: format!(
                    "OpenAI-compatible: env var '{}' not set",
                    config.api_key_env
                ),
            })?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client: Client::new(),
            base_url,
            api_key,
            model: config.model.clone(),
            context_window: config.context_window,
            default_max_tokens: config.max_tokens,
        })
    }

    /// Convert internal messages to OpenAI JSON format.
    fn messages_to_json(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::System => "system",
                };
                json!({ "role": role, "content": msg.content })
            })
            .collect()
    }

    fn parse_response(&self, body: Value) -> Result<CompletionResponse, LlmError> {
        let text = body
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| LlmError::ResponseParse {
                message: "missing choices[0].message.content".to_string(),
            })?
            .to_string();

        let finish_reason = body
            .pointer("/choices/0/finish_reason")
            .and_then(|v| v.as_str())
            .map(String::from);

        let usage = TokenUsage {
            input_tokens: body
                .pointer("/usage/prompt_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize,
            output_tokens: body
                .pointer("/usage/completion_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize,
        };

        let model = body
            .get("model")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.model)
            .to_string();

        Ok(CompletionResponse {
            text,
            usage,
            model,
            finish_reason,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let payload = json!({
            "model": self.model,
            "messages": Self::messages_to_json(&request.messages),
            "temperature": request.temperature.clamp(0.0, 2.0),
            "max_tokens": request.max_tokens.unwrap_or(self.default_max_tokens),
        });

        debug!(model = %self.model, messages = request.messages.len(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout { timeout_secs: 0 }
                } else {
                    LlmError::Connection {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(30);
            return Err(LlmError::RateLimited { retry_after_secs });
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(LlmError::AuthFailed {
                provider: format!("OpenAI-compatible ({})", self.base_url),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiRequest {
                message: format!("HTTP {status}: {body}"),
            });
        }

        let body: Value = response.json().await.map_err(|e| LlmError::ResponseParse {
            message: e.to_string(),
        })?;

        self.parse_response(body)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn context_window(&self) -> usize {
        self.context_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> LlmConfig {
        LlmConfig {
            provider: "openai".to_string(),
            model: "test-model".to_string(),
            api_key_env: "SCOUT_TEST_API_KEY".to_string(),
            base_url: None,
            max_tokens: 512,
            temperature: 0.5,
            context_window: 32_000,
        }
    }

    fn provider_with_key() -> OpenAiCompatibleProvider {
        std::env::set_var("SCOUT_TEST_API_KEY", "sk-test");
        let provider = OpenAiCompatibleProvider::new(&test_config()).unwrap();
        std::env::remove_var("SCOUT_TEST_API_KEY");
        provider
    }

    #[test]
    fn test_missing_key_fails() {
        std::env::remove_var("SCOUT_NONEXISTENT_KEY");
        let mut config = test_config();
        config.api_key_env = "SCOUT_NONEXISTENT_KEY".to_string();
        let result = OpenAiCompatibleProvider::new(&config);
        assert!(matches!(result, Err(LlmError::AuthFailed { .. })));
    }

    #[test]
    fn test_local_endpoint_needs_no_key() {
        std::env::remove_var("SCOUT_NONEXISTENT_KEY");
        let mut config = test_config();
        config.api_key_env = "SCOUT_NONEXISTENT_KEY".to_string();
        config.base_url = Some("http://localhost:11434/v1".to_string());
        let provider = OpenAiCompatibleProvider::new(&config).unwrap();
        assert_eq!(provider.model_name(), "test-model");
    }

    #[test]
    fn test_messages_to_json() {
        let messages = vec![Message::system("be brief"), Message::user("hi")];
        let json_messages = OpenAiCompatibleProvider::messages_to_json(&messages);
        assert_eq!(json_messages[0]["role"], "system");
        assert_eq!(json_messages[1]["content"], "hi");
    }

    #[test]
    fn test_parse_response_well_formed() {
        let provider = provider_with_key();
        let body = json!({
            "model": "test-model-0125",
            "choices": [{
                "message": { "role": "assistant", "content": "Answer text" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 7 }
        });
        let response = provider.parse_response(body).unwrap();
        assert_eq!(response.text, "Answer text");
        assert_eq!(response.usage.input_tokens, 12);
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
        assert_eq!(response.model, "test-model-0125");
    }

    #[test]
    fn test_parse_response_missing_content() {
        let provider = provider_with_key();
        let body = json!({ "choices": [] });
        let result = provider.parse_response(body);
        assert!(matches!(result, Err(LlmError::ResponseParse { .. })));
    }
}
