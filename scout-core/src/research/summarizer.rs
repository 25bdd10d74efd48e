//! Per-source summarization.
//!
//! Condenses one fetched document into at most one `EvidenceSnippet` for its
//! owning sub-query, on the fast tier. Irrelevant sources, malformed model
//! answers, and model failures all yield `None` — summarization is a soft
//! stage, like retrieval.

use crate::llm::{ModelPool, ModelTier};
use crate::research::parse::{parse_answer, ModelAnswer};
use crate::retrieve::SourceDocument;
use serde::Deserialize;
use tracing::{debug, warn};

/// A condensed, sub-query-scoped extract from one source.
///
/// Shares source identity with other snippets by normalized URL, not by
/// ownership: several sub-queries may each carry a snippet of the same page.
#[derive(Debug, Clone)]
pub struct EvidenceSnippet {
    pub url: String,
    pub title: Option<String>,
    pub text: String,
    /// Model-assigned relevance in 0.0-1.0, carried for ranking.
    pub relevance: f64,
    /// Submission index of the owning sub-query.
    pub sub_query: usize,
}

#[derive(Debug, Deserialize)]
struct SummaryAnswer {
    relevant: bool,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    relevance: f64,
}

const SUMMARIZE_SYSTEM_PROMPT: &str = "You extract evidence from web pages \
for a research question. Given a question and page content, respond with JSON \
only: {\"relevant\": bool, \"summary\": string, \"relevance\": number between \
0 and 1}. Set relevant to false if the page does not help answer the question.";

/// Summarizes fetched documents on the fast tier.
pub struct Summarizer<'a> {
    models: &'a ModelPool,
}

impl<'a> Summarizer<'a> {
    pub fn new(models: &'a ModelPool) -> Self {
        Self { models }
    }

    /// Summarize one document for its sub-query. Returns `None` when the
    /// source is irrelevant or the model answer is unusable.
    pub async fn summarize(
        &self,
        sub_query_index: usize,
        query: &str,
        document: &SourceDocument,
    ) -> Option<EvidenceSnippet> {
        let user = format!(
            "Question: {query}\n\nPage URL: {}\n\nPage content:\n{}",
            document.url, document.content
        );

        let text = match self
            .models
            .prompt(ModelTier::Fast, SUMMARIZE_SYSTEM_PROMPT, &user)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(url = %document.url, error = %e, "Summarization call failed; skipping source");
                return None;
            }
        };

        let answer = match parse_answer::<SummaryAnswer>(&text) {
            ModelAnswer::Valid(answer) => answer,
            ModelAnswer::Invalid { .. } => {
                warn!(url = %document.url, "Unusable summarization answer; skipping source");
                return None;
            }
        };

        if !answer.relevant || answer.summary.trim().is_empty() {
            debug!(url = %document.url, "Source judged irrelevant");
            return None;
        }

        Some(EvidenceSnippet {
            url: document.url.clone(),
            title: document.title.clone(),
            text: answer.summary,
            relevance: answer.relevance.clamp(0.0, 1.0),
            sub_query: sub_query_index,
        })
    }
}
