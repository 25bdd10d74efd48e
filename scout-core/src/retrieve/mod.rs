//! Retrieval capability port and backends.
//!
//! A `Retriever` turns a query string into a bounded list of `SearchHit`s;
//! a `Fetcher` turns a hit's URL into a `SourceDocument`. Both may fail or
//! time out — failures are reported conditions, never crashes, and the
//! evidence collector absorbs them.

pub mod duckduckgo;
pub mod fetcher;

use crate::config::ScoutConfig;
use crate::error::{ConfigError, RetrievalError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use duckduckgo::DuckDuckGoRetriever;
pub use fetcher::{Fetcher, PageFetcher, SourceDocument, StaticFetcher};

/// A single search result from a retrieval backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Trait for search backends.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Backend identifier, matching the config's `retrievers` entries.
    fn name(&self) -> &str;

    /// Search for a query, returning at most `max_results` hits.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, RetrievalError>;
}

/// Normalize a URL for use as a deduplication key.
///
/// Lowercases scheme and host, drops the fragment, and strips a trailing
/// slash from the path. Invalid URLs fall back to a trimmed copy of the raw
/// string so they still dedup exactly.
pub fn normalize_url(raw: &str) -> String {
    match url::Url::parse(raw.trim()) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            let mut normalized = parsed.to_string();
            if normalized.ends_with('/') && parsed.path() == "/" {
                normalized.pop();
            } else if parsed.path().len() > 1 && parsed.path().ends_with('/') {
                // Strip trailing slash on non-root paths
                let path = parsed.path().trim_end_matches('/').to_string();
                parsed.set_path(&path);
                normalized = parsed.to_string();
            }
            normalized
        }
        Err(_) => raw.trim().to_string(),
    }
}

/// Instantiate the configured retriever backends, preserving order.
///
/// Unknown identifiers are logged and skipped; if nothing usable remains the
/// configuration is rejected.
pub fn create_retrievers(config: &ScoutConfig) -> Result<Vec<Arc<dyn Retriever>>, ConfigError> {
    let mut retrievers: Vec<Arc<dyn Retriever>> = Vec::new();
    for id in &config.retrievers {
        match id.as_str() {
            "duckduckgo" => retrievers.push(Arc::new(DuckDuckGoRetriever::new())),
            other => {
                tracing::warn!(retriever = %other, "Skipping unknown retriever backend");
            }
        }
    }
    if retrievers.is_empty() {
        return Err(ConfigError::NoRetrievers {
            requested: config.retrievers.clone(),
        });
    }
    Ok(retrievers)
}

// ---------------------------------------------------------------------------
// Mock retriever
// ---------------------------------------------------------------------------

/// Mock retriever returning canned hits, for tests and dry runs.
pub struct MockRetriever {
    name: String,
    hits: Vec<SearchHit>,
    fail: bool,
}

impl MockRetriever {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            name: "mock".to_string(),
            hits,
            fail: false,
        }
    }

    /// A retriever that fails every search.
    pub fn failing() -> Self {
        Self {
            name: "mock".to_string(),
            hits: Vec::new(),
            fail: true,
        }
    }

    /// Build a hit with a derived title and snippet.
    pub fn hit(url: &str) -> SearchHit {
        SearchHit {
            title: format!("Title for {url}"),
            url: url.to_string(),
            snippet: format!("Snippet for {url}"),
        }
    }
}

#[async_trait]
impl Retriever for MockRetriever {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        _query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        if self.fail {
            return Err(RetrievalError::SearchFailed {
                backend: self.name.clone(),
                message: "mock failure".into(),
            });
        }
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }
}
