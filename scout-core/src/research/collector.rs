//! Evidence collection for a single sub-query.
//!
//! Searches the configured backends in order, deduplicates hits by normalized
//! URL, and fetches a bounded number of documents. Every search and fetch
//! failure is absorbed here: a sub-query that finds nothing yields an empty
//! set, never an error.

use crate::config::ScoutConfig;
use crate::retrieve::{normalize_url, Fetcher, Retriever, SearchHit, SourceDocument};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Collects source documents for one sub-query.
pub struct EvidenceCollector {
    retrievers: Vec<Arc<dyn Retriever>>,
    fetcher: Arc<dyn Fetcher>,
    max_search_results: usize,
    max_sources: usize,
}

impl EvidenceCollector {
    pub fn new(
        retrievers: Vec<Arc<dyn Retriever>>,
        fetcher: Arc<dyn Fetcher>,
        config: &ScoutConfig,
    ) -> Self {
        Self {
            retrievers,
            fetcher,
            max_search_results: config.research.max_search_results,
            max_sources: config.research.max_sources_per_query,
        }
    }

    /// Search all backends, then fetch up to the per-query source limit.
    ///
    /// Hit order follows backend configuration order; within a backend, the
    /// backend's own ranking. Fetch failures are skipped and the next hit is
    /// tried, so one dead URL does not cost a source slot.
    pub async fn collect(&self, query: &str) -> Vec<SourceDocument> {
        let hits = self.search_all(query).await;
        let mut documents = Vec::new();

        for hit in &hits {
            if documents.len() >= self.max_sources {
                break;
            }
            match self.fetcher.fetch(&hit.url).await {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    warn!(url = %hit.url, error = %e, "Skipping source: fetch failed");
                }
            }
        }

        debug!(
            query = %query,
            hits = hits.len(),
            fetched = documents.len(),
            "Evidence collection done"
        );
        documents
    }

    /// Query every backend in configured order, deduplicating by normalized
    /// URL (first occurrence wins). A failed backend is logged and skipped.
    async fn search_all(&self, query: &str) -> Vec<SearchHit> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut hits = Vec::new();

        for retriever in &self.retrievers {
            match retriever.search(query, self.max_search_results).await {
                Ok(backend_hits) => {
                    for hit in backend_hits {
                        if seen.insert(normalize_url(&hit.url)) {
                            hits.push(hit);
                        }
                    }
                }
                Err(e) => {
                    warn!(backend = %retriever.name(), error = %e, "Search backend failed");
                }
            }
        }
        hits
    }
}
