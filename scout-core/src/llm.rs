//! LLM capability port.
//!
//! Defines the `LlmProvider` trait for model-agnostic completions, the
//! fast/smart tier split, and a `ModelPool` that binds both configured tiers
//! and applies per-call timeout and retry policy. Concrete providers live in
//! `providers/`.

use crate::config::{RetryConfig, ScoutConfig};
use crate::error::LlmError;
use crate::providers::with_retry;
use crate::types::{CompletionRequest, CompletionResponse, Message, TokenUsage};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a full completion and return the response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Return the model name.
    fn model_name(&self) -> &str;

    /// Return the context window size for this provider/model.
    fn context_window(&self) -> usize;
}

/// Which configured model handles a call.
///
/// The fast tier favors low-latency extraction and summarization; the smart
/// tier favors higher-quality synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Fast,
    Smart,
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelTier::Fast => write!(f, "fast"),
            ModelTier::Smart => write!(f, "smart"),
        }
    }
}

/// Both model tiers plus the shared call policy (timeout, retry).
///
/// Shared read-only across all concurrent sub-query units.
pub struct ModelPool {
    fast: Arc<dyn LlmProvider>,
    smart: Arc<dyn LlmProvider>,
    fast_temperature: f32,
    smart_temperature: f32,
    retry: RetryConfig,
    call_timeout: Duration,
}

impl ModelPool {
    pub fn new(
        fast: Arc<dyn LlmProvider>,
        smart: Arc<dyn LlmProvider>,
        config: &ScoutConfig,
    ) -> Self {
        Self {
            fast,
            smart,
            fast_temperature: config.fast_llm.temperature,
            smart_temperature: config.smart_llm.temperature,
            retry: config.retry.clone(),
            call_timeout: Duration::from_secs(config.research.llm_timeout_secs),
        }
    }

    /// Get the provider behind a tier.
    pub fn provider(&self, tier: ModelTier) -> &Arc<dyn LlmProvider> {
        match tier {
            ModelTier::Fast => &self.fast,
            ModelTier::Smart => &self.smart,
        }
    }

    /// Complete a request on the given tier, applying the per-call timeout
    /// and retrying transient failures with exponential backoff.
    ///
    /// A timeout is treated identically to any other transient call failure.
    pub async fn complete(
        &self,
        tier: ModelTier,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        let provider = self.provider(tier);
        let timeout_secs = self.call_timeout.as_secs();
        with_retry(&self.retry, || {
            let request = request.clone();
            async move {
                match tokio::time::timeout(self.call_timeout, provider.complete(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(LlmError::Timeout { timeout_secs }),
                }
            }
        })
        .await
    }

    /// Convenience: complete a system+user prompt on a tier and return the text.
    pub async fn prompt(
        &self,
        tier: ModelTier,
        system: &str,
        user: &str,
    ) -> Result<String, LlmError> {
        let mut request = CompletionRequest::from_prompt(system, user);
        request.temperature = match tier {
            ModelTier::Fast => self.fast_temperature,
            ModelTier::Smart => self.smart_temperature,
        };
        let response = self.complete(tier, request).await?;
        Ok(response.text)
    }
}

// ---------------------------------------------------------------------------
// Mock provider
// ---------------------------------------------------------------------------

/// Mock LLM provider with queued responses, for tests and dry runs.
///
/// Responses (or errors) are returned in FIFO order; when the queue is empty
/// a canned default response is returned.
pub struct MockLlmProvider {
    responses: Mutex<Vec<Result<CompletionResponse, LlmError>>>,
    calls: Mutex<Vec<CompletionRequest>>,
    model: String,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            model: "mock-model".to_string(),
        }
    }

    /// Queue a text response.
    pub fn queue_text(&self, text: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .push(Ok(Self::text_response(text)));
    }

    /// Queue an error.
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push(Err(error));
    }

    /// Number of completion calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The requests received so far, in order.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }

    fn text_response(text: impl Into<String>) -> CompletionResponse {
        CompletionResponse {
            text: text.into(),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            model: "mock-model".to_string(),
            finish_reason: Some("stop".to_string()),
        }
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(Self::text_response(
                "Mock LLM: no queued responses available.",
            ))
        } else {
            responses.remove(0)
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn context_window(&self) -> usize {
        128_000
    }
}

/// Rough token estimate used where exact counts are unnecessary (~4 chars per token).
pub fn estimate_tokens(messages: &[Message]) -> usize {
    messages.iter().map(|m| m.content.len() / 4 + 4).sum()
}
