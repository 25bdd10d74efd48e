//! # Scout Core
//!
//! Core library for the Scout autonomous research agent.
//! Provides the research orchestration engine (planning, parallel evidence
//! collection, aggregation, synthesis), the LLM and retrieval capability
//! ports with concrete backends, configuration, and error types.

pub mod config;
pub mod error;
pub mod llm;
pub mod providers;
pub mod research;
pub mod retrieve;
pub mod types;

// Re-export commonly used types at the crate root.
pub use config::{load_config, LlmConfig, ResearchLimits, RetryConfig, ScoutConfig};
pub use error::{
    ConfigError, LlmError, Result, RetrievalError, ScoutError, TaskError,
};
pub use llm::{LlmProvider, MockLlmProvider, ModelPool, ModelTier};
pub use research::{
    AggregatedContext, EvidenceSnippet, Report, ReportType, ResearchEngine, ResearchPlan,
    ResearchTask, SubQuery, TaskPhase,
};
pub use retrieve::{
    Fetcher, MockRetriever, PageFetcher, Retriever, SearchHit, SourceDocument, StaticFetcher,
};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, TokenUsage};
