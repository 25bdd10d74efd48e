//! Error types for the Scout research engine.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering the LLM, retrieval, configuration, and task-orchestration domains.
//!
//! Failure severity follows the engine's propagation policy: retrieval and
//! summarization errors are absorbed at their component boundary and only
//! degrade evidence quality; `TaskError` variants are the hard failures that
//! terminate a research task.

use std::path::PathBuf;

/// Top-level error type for the Scout core library.
#[derive(Debug, thiserror::Error)]
pub enum ScoutError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from LLM provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

/// Errors from search backends and page fetching.
///
/// These are always recovered locally: a failed retriever or fetch is logged
/// and skipped, never escalated past the evidence collector.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("Search request to '{backend}' failed: {message}")]
    SearchFailed { backend: String, message: String },

    #[error("Search request to '{backend}' timed out after {timeout_secs}s")]
    SearchTimeout { backend: String, timeout_secs: u64 },

    #[error("Fetch failed for {url}: {message}")]
    FetchFailed { url: String, message: String },

    #[error("Fetch timed out for {url} after {timeout_secs}s")]
    FetchTimeout { url: String, timeout_secs: u64 },

    #[error("Unusable content from {url}: {reason}")]
    UnusableContent { url: String, reason: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("No usable retriever backends configured (requested: {requested:?})")]
    NoRetrievers { requested: Vec<String> },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Hard failures that terminate a research task.
///
/// Everything below this level (a single search, fetch, or summarization
/// failing, or even a whole sub-query producing no evidence) is absorbed and
/// recorded; only these variants surface to the caller with no report.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Every sub-query failed to produce evidence ({attempted} attempted)")]
    TotalEvidenceFailure { attempted: usize },

    #[error("Report synthesis failed after {attempts} attempt(s): {message}")]
    SynthesisFailed { attempts: usize, message: String },

    #[error("Task was cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// A type alias for results using the top-level `ScoutError`.
pub type Result<T> = std::result::Result<T, ScoutError>;
