//! Configuration system for the Scout research engine.
//!
//! Uses `figment` for layered configuration: defaults -> `scout.toml` ->
//! environment variables. Environment values (prefix `SCOUT_`, `__` as the
//! section separator) override file values for the same key, and the loaded
//! config is read-only for the lifetime of a research task — it is threaded
//! through every component as an explicit context object.

use crate::error::ConfigError;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for a research task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoutConfig {
    /// Ordered list of search backend identifiers (e.g., "duckduckgo").
    /// Evidence ordering favors earlier entries.
    pub retrievers: Vec<String>,
    /// Model used for planning and per-source summarization.
    pub fast_llm: LlmConfig,
    /// Model used for report synthesis.
    pub smart_llm: LlmConfig,
    /// Orchestration limits and thresholds.
    pub research: ResearchLimits,
    /// Retry policy for model calls.
    pub retry: RetryConfig,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            retrievers: vec!["duckduckgo".to_string()],
            fast_llm: LlmConfig {
                model: "gpt-4o-mini".to_string(),
                ..Default::default()
            },
            smart_llm: LlmConfig::default(),
            research: ResearchLimits::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Limits and thresholds for the orchestration pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchLimits {
    /// Maximum synthesis refinement passes (must be >= 1).
    pub max_iterations: usize,
    /// Maximum subtopics for detailed reports (0 disables subtopic planning).
    pub max_subtopics: usize,
    /// Maximum results requested from each retriever per sub-query.
    pub max_search_results: usize,
    /// Maximum documents fetched per sub-query.
    pub max_sources_per_query: usize,
    /// Maximum sub-query units in flight at once.
    pub concurrency_limit: usize,
    /// Content overlap (word-set Jaccard, 0.0-1.0) above which two snippets
    /// from the same source collapse into one.
    pub dedup_overlap_threshold: f64,
    /// Per-fetch timeout in seconds.
    pub fetch_timeout_secs: u64,
    /// Per-model-call timeout in seconds.
    pub llm_timeout_secs: u64,
}

impl Default for ResearchLimits {
    fn default() -> Self {
        Self {
            max_iterations: 2,
            max_subtopics: 3,
            max_search_results: 5,
            max_sources_per_query: 5,
            concurrency_limit: 4,
            dedup_overlap_threshold: 0.65,
            fetch_timeout_secs: 15,
            llm_timeout_secs: 90,
        }
    }
}

/// LLM provider configuration for one model tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name: "openai" or any OpenAI-compatible endpoint.
    pub provider: String,
    /// Model identifier (e.g., "gpt-4o", "gpt-4o-mini").
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Optional base URL override for the API endpoint.
    pub base_url: Option<String>,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Default temperature for generation.
    pub temperature: f32,
    /// Context window size for the model.
    pub context_window: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            max_tokens: 4096,
            temperature: 0.7,
            context_window: 128_000,
        }
    }
}

impl LlmConfig {
    /// Validate this LLM config and return any warnings.
    ///
    /// Returns human-readable warning messages for problematic values.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.max_tokens >= self.context_window {
            warnings.push(format!(
                "max_tokens ({}) >= context_window ({}); responses may be truncated or fail",
                self.max_tokens, self.context_window
            ));
        }
        if self.temperature < 0.0 || self.temperature > 2.0 {
            warnings.push(format!(
                "temperature ({}) is outside the typical range 0.0-2.0",
                self.temperature
            ));
        }
        warnings
    }
}

/// Retry policy for transient model-call failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retry attempts after the initial call.
    pub max_retries: u32,
    /// Initial backoff delay in milliseconds.
    pub initial_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_backoff_ms: u64,
    /// Multiplier applied to the backoff per attempt.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to backoff delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 15_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl ScoutConfig {
    /// Validate the configuration.
    ///
    /// Returns warnings for suspicious-but-usable values; returns an error for
    /// values that make the engine unable to honor its invariants.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        if self.research.max_iterations == 0 {
            return Err(ConfigError::Invalid {
                message: "research.max_iterations must be >= 1".into(),
            });
        }
        if self.retrievers.is_empty() {
            return Err(ConfigError::Invalid {
                message: "at least one retriever backend must be configured".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.research.dedup_overlap_threshold) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "research.dedup_overlap_threshold ({}) must be within 0.0-1.0",
                    self.research.dedup_overlap_threshold
                ),
            });
        }

        let mut warnings = Vec::new();
        if self.research.concurrency_limit == 0 {
            warnings.push("research.concurrency_limit is 0; treated as 1".into());
        }
        if self.research.max_search_results == 0 {
            warnings.push("research.max_search_results is 0; sub-queries will find nothing".into());
        }
        for (tier, llm) in [("fast_llm", &self.fast_llm), ("smart_llm", &self.smart_llm)] {
            for w in llm.validate() {
                warnings.push(format!("{tier}: {w}"));
            }
        }
        Ok(warnings)
    }

    /// Effective concurrency ceiling (never zero).
    pub fn concurrency(&self) -> usize {
        self.research.concurrency_limit.max(1)
    }
}

/// Load the configuration with layered precedence:
/// 1. Built-in defaults
/// 2. `scout.toml` in the workspace directory (if present)
/// 3. An explicit config file (if given; missing is an error)
/// 4. Environment variables: `SCOUT_RESEARCH__MAX_ITERATIONS`, etc.
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<ScoutConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(ScoutConfig::default()));

    if let Some(ws) = workspace {
        let ws_config = ws.join("scout.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("SCOUT_").split("__"));

    figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}
