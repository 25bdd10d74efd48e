//! Sub-query planning.
//!
//! Decomposes the root query into independent sub-queries on the fast tier,
//! and plans subtopic sections for detailed reports. Planning never fails a
//! task: any model failure or malformed answer degrades to the root query as
//! the sole sub-query.

use crate::config::ScoutConfig;
use crate::llm::{ModelPool, ModelTier};
use crate::research::parse::{parse_answer, ModelAnswer};
use crate::research::synthesizer::ReportType;
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

/// One unit of parallel research. Never mutated after planning.
#[derive(Debug, Clone)]
pub struct SubQuery {
    pub id: Uuid,
    pub text: String,
    /// Index into the plan's subtopics, for detailed reports.
    pub subtopic: Option<usize>,
}

impl SubQuery {
    fn new(text: impl Into<String>, subtopic: Option<usize>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            subtopic,
        }
    }
}

/// A planned report section, for detailed reports only.
#[derive(Debug, Clone)]
pub struct Subtopic {
    pub title: String,
}

/// The complete research plan for a task.
#[derive(Debug, Clone)]
pub struct ResearchPlan {
    pub sub_queries: Vec<SubQuery>,
    pub subtopics: Vec<Subtopic>,
}

impl ResearchPlan {
    /// The degenerate plan: the root query as the sole sub-query.
    fn fallback(root_query: &str) -> Self {
        Self {
            sub_queries: vec![SubQuery::new(root_query, None)],
            subtopics: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlannedSubtopic {
    title: String,
    #[serde(default)]
    queries: Vec<String>,
}

const PLAN_SYSTEM_PROMPT: &str = "You are a research planner. Decompose the \
user's question into independent web search queries that together cover it. \
Respond with a JSON array of query strings and nothing else.";

const SUBTOPIC_SYSTEM_PROMPT: &str = "You are a research planner. Break the \
user's question into report subtopics, each with its own web search queries. \
Respond with a JSON array of objects {\"title\": string, \"queries\": \
[string]} and nothing else.";

/// Plans sub-queries (and subtopics, for detailed reports) on the fast tier.
pub struct Planner<'a> {
    models: &'a ModelPool,
    config: &'a ScoutConfig,
}

impl<'a> Planner<'a> {
    pub fn new(models: &'a ModelPool, config: &'a ScoutConfig) -> Self {
        Self { models, config }
    }

    pub async fn plan(&self, query: &str, report_type: &ReportType) -> ResearchPlan {
        let plan = if matches!(report_type, ReportType::Detailed)
            && self.config.research.max_subtopics > 0
        {
            self.plan_with_subtopics(query).await
        } else {
            self.plan_flat(query).await
        };
        debug!(
            sub_queries = plan.sub_queries.len(),
            subtopics = plan.subtopics.len(),
            "Research plan ready"
        );
        plan
    }

    /// Flat plan: a JSON array of search query strings.
    async fn plan_flat(&self, query: &str) -> ResearchPlan {
        let text = match self
            .models
            .prompt(ModelTier::Fast, PLAN_SYSTEM_PROMPT, query)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Planner model unavailable; using root query");
                return ResearchPlan::fallback(query);
            }
        };

        match parse_answer::<Vec<String>>(&text) {
            ModelAnswer::Valid(queries) => {
                let sub_queries: Vec<SubQuery> = queries
                    .into_iter()
                    .filter(|q| !q.trim().is_empty())
                    .map(|q| SubQuery::new(q, None))
                    .collect();
                if sub_queries.is_empty() {
                    warn!("Planner returned no usable queries; using root query");
                    ResearchPlan::fallback(query)
                } else {
                    ResearchPlan {
                        sub_queries,
                        subtopics: Vec::new(),
                    }
                }
            }
            ModelAnswer::Invalid { raw } => {
                warn!(
                    raw = %raw.chars().take(120).collect::<String>(),
                    "Planner answer was not valid JSON; using root query"
                );
                ResearchPlan::fallback(query)
            }
        }
    }

    /// Subtopic plan for detailed reports. Excess subtopics beyond
    /// `max_subtopics` are dropped, never re-planned.
    async fn plan_with_subtopics(&self, query: &str) -> ResearchPlan {
        let text = match self
            .models
            .prompt(ModelTier::Fast, SUBTOPIC_SYSTEM_PROMPT, query)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Planner model unavailable; using root query");
                return ResearchPlan::fallback(query);
            }
        };

        let planned = match parse_answer::<Vec<PlannedSubtopic>>(&text) {
            ModelAnswer::Valid(planned) => planned,
            ModelAnswer::Invalid { raw } => {
                warn!(
                    raw = %raw.chars().take(120).collect::<String>(),
                    "Subtopic answer was not valid JSON; using root query"
                );
                return ResearchPlan::fallback(query);
            }
        };

        let mut subtopics = Vec::new();
        let mut sub_queries = Vec::new();
        for planned_subtopic in planned
            .into_iter()
            .take(self.config.research.max_subtopics)
        {
            if planned_subtopic.title.trim().is_empty() {
                continue;
            }
            let index = subtopics.len();
            for q in &planned_subtopic.queries {
                if !q.trim().is_empty() {
                    sub_queries.push(SubQuery::new(q.clone(), Some(index)));
                }
            }
            // A subtopic without queries still gets searched by its title
            if planned_subtopic.queries.iter().all(|q| q.trim().is_empty()) {
                sub_queries.push(SubQuery::new(planned_subtopic.title.clone(), Some(index)));
            }
            subtopics.push(Subtopic {
                title: planned_subtopic.title,
            });
        }

        if sub_queries.is_empty() {
            warn!("Subtopic plan produced no queries; using root query");
            return ResearchPlan::fallback(query);
        }
        ResearchPlan {
            sub_queries,
            subtopics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::MockLlmProvider;
    use std::sync::Arc;

    fn pool_and_config(fast: Arc<MockLlmProvider>) -> (ModelPool, ScoutConfig) {
        let mut config = ScoutConfig::default();
        config.retry.max_retries = 0;
        let pool = ModelPool::new(fast, Arc::new(MockLlmProvider::new()), &config);
        (pool, config)
    }

    #[tokio::test]
    async fn test_plan_flat_from_json_array() {
        let fast = Arc::new(MockLlmProvider::new());
        fast.queue_text(r#"["history of rust", "rust adoption 2024"]"#);
        let (pool, config) = pool_and_config(fast);

        let plan = Planner::new(&pool, &config)
            .plan("the rust language", &ReportType::Summary)
            .await;
        assert_eq!(plan.sub_queries.len(), 2);
        assert_eq!(plan.sub_queries[0].text, "history of rust");
        assert!(plan.subtopics.is_empty());
        assert_ne!(plan.sub_queries[0].id, plan.sub_queries[1].id);
    }

    #[tokio::test]
    async fn test_plan_falls_back_on_malformed_answer() {
        let fast = Arc::new(MockLlmProvider::new());
        fast.queue_text("I'd suggest searching for several things.");
        let (pool, config) = pool_and_config(fast);

        let plan = Planner::new(&pool, &config)
            .plan("quantum computing", &ReportType::Summary)
            .await;
        assert_eq!(plan.sub_queries.len(), 1);
        assert_eq!(plan.sub_queries[0].text, "quantum computing");
    }

    #[tokio::test]
    async fn test_plan_falls_back_on_model_error() {
        let fast = Arc::new(MockLlmProvider::new());
        fast.queue_error(LlmError::AuthFailed {
            provider: "test".into(),
        });
        let (pool, config) = pool_and_config(fast);

        let plan = Planner::new(&pool, &config)
            .plan("quantum computing", &ReportType::Summary)
            .await;
        assert_eq!(plan.sub_queries.len(), 1);
        assert_eq!(plan.sub_queries[0].text, "quantum computing");
    }

    #[tokio::test]
    async fn test_detailed_plan_clamps_subtopics() {
        let fast = Arc::new(MockLlmProvider::new());
        fast.queue_text(
            r#"[
                {"title": "One", "queries": ["q1"]},
                {"title": "Two", "queries": ["q2"]},
                {"title": "Three", "queries": ["q3"]},
                {"title": "Four", "queries": ["q4"]},
                {"title": "Five", "queries": ["q5"]}
            ]"#,
        );
        let (pool, mut config) = pool_and_config(fast);
        config.research.max_subtopics = 3;

        let plan = Planner::new(&pool, &config)
            .plan("broad topic", &ReportType::Detailed)
            .await;
        assert_eq!(plan.subtopics.len(), 3);
        assert_eq!(plan.sub_queries.len(), 3);
        assert_eq!(plan.sub_queries[2].subtopic, Some(2));
    }

    #[tokio::test]
    async fn test_detailed_subtopic_without_queries_searches_title() {
        let fast = Arc::new(MockLlmProvider::new());
        fast.queue_text(r#"[{"title": "Market impact", "queries": []}]"#);
        let (pool, config) = pool_and_config(fast);

        let plan = Planner::new(&pool, &config)
            .plan("topic", &ReportType::Detailed)
            .await;
        assert_eq!(plan.subtopics.len(), 1);
        assert_eq!(plan.sub_queries.len(), 1);
        assert_eq!(plan.sub_queries[0].text, "Market impact");
    }
}
