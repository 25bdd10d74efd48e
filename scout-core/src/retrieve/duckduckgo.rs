//! DuckDuckGo search backend.
//!
//! Uses the instant answer API: no API key required, and queries go directly
//! to DuckDuckGo. Abstract answers and related topics are flattened into
//! `SearchHit`s.

use super::{Retriever, SearchHit};
use crate::error::RetrievalError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

const SEARCH_TIMEOUT_SECS: u64 = 10;

/// DuckDuckGo instant-answer retriever.
pub struct DuckDuckGoRetriever {
    client: Client,
}

impl DuckDuckGoRetriever {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(SEARCH_TIMEOUT_SECS))
            .user_agent("scout/0.3")
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Flatten the instant-answer payload into hits.
    fn parse_hits(body: &Value, max_results: usize) -> Vec<SearchHit> {
        let mut hits = Vec::new();

        if let Some(abstract_text) = body.get("AbstractText").and_then(|v| v.as_str()) {
            if !abstract_text.is_empty() {
                let url = body
                    .get("AbstractURL")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                if !url.is_empty() {
                    hits.push(SearchHit {
                        title: body
                            .get("Heading")
                            .and_then(|v| v.as_str())
                            .unwrap_or("Abstract")
                            .to_string(),
                        url: url.to_string(),
                        snippet: abstract_text.to_string(),
                    });
                }
            }
        }

        for key in ["Results", "RelatedTopics"] {
            if hits.len() >= max_results {
                break;
            }
            if let Some(entries) = body.get(key).and_then(|v| v.as_array()) {
                for entry in entries {
                    if hits.len() >= max_results {
                        break;
                    }
                    // Related topics may be nested one level under "Topics"
                    if let Some(nested) = entry.get("Topics").and_then(|v| v.as_array()) {
                        for sub in nested {
                            if hits.len() >= max_results {
                                break;
                            }
                            if let Some(hit) = Self::topic_to_hit(sub) {
                                hits.push(hit);
                            }
                        }
                    } else if let Some(hit) = Self::topic_to_hit(entry) {
                        hits.push(hit);
                    }
                }
            }
        }

        hits
    }

    fn topic_to_hit(topic: &Value) -> Option<SearchHit> {
        let text = topic.get("Text").and_then(|v| v.as_str())?;
        let url = topic.get("FirstURL").and_then(|v| v.as_str())?;
        if text.is_empty() || url.is_empty() {
            return None;
        }
        // The leading clause of the topic text doubles as a title
        let title = text.split(" - ").next().unwrap_or(text).to_string();
        Some(SearchHit {
            title,
            url: url.to_string(),
            snippet: text.to_string(),
        })
    }
}

impl Default for DuckDuckGoRetriever {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Retriever for DuckDuckGoRetriever {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        let url = format!(
            "https://api.duckduckgo.com/?q={}&format=json&no_html=1&skip_disambig=1",
            urlencoding::encode(query)
        );

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                RetrievalError::SearchTimeout {
                    backend: "duckduckgo".into(),
                    timeout_secs: SEARCH_TIMEOUT_SECS,
                }
            } else {
                RetrievalError::SearchFailed {
                    backend: "duckduckgo".into(),
                    message: e.to_string(),
                }
            }
        })?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| RetrievalError::SearchFailed {
                backend: "duckduckgo".into(),
                message: format!("response parse: {e}"),
            })?;

        Ok(Self::parse_hits(&body, max_results))
    }
}
