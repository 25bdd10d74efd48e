//! Report synthesis.
//!
//! Drafts the report from the aggregated context on the smart tier, then
//! refines it for up to `max_iterations` total passes. Detailed reports draft
//! one section per subtopic before an integrated revision. The citation list
//! contains only context sources the body actually references.

use crate::config::ScoutConfig;
use crate::error::TaskError;
use crate::llm::{estimate_tokens, ModelPool, ModelTier};
use crate::research::aggregator::AggregatedContext;
use crate::research::planner::ResearchPlan;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Marker a refinement pass answers with when the draft needs no changes.
const NO_CHANGES_MARKER: &str = "NO_CHANGES";

/// The shape of report to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    /// A concise single-section answer.
    Summary,
    /// Subtopic-sectioned long-form report.
    Detailed,
    /// A structured outline without prose.
    Outline,
    /// Caller-supplied synthesis instructions.
    Custom,
}

impl std::str::FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(ReportType::Summary),
            "detailed" => Ok(ReportType::Detailed),
            "outline" => Ok(ReportType::Outline),
            "custom" => Ok(ReportType::Custom),
            other => Err(format!(
                "unknown report type '{other}' (expected summary, detailed, outline, or custom)"
            )),
        }
    }
}

impl std::fmt::Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportType::Summary => write!(f, "summary"),
            ReportType::Detailed => write!(f, "detailed"),
            ReportType::Outline => write!(f, "outline"),
            ReportType::Custom => write!(f, "custom"),
        }
    }
}

/// The terminal artifact of a research task.
#[derive(Debug, Clone)]
pub struct Report {
    pub body: String,
    /// Cited source URLs, in context order. Always a subset of the
    /// aggregated context's sources.
    pub sources: Vec<String>,
    pub report_type: ReportType,
}

/// Synthesizes reports on the smart tier.
pub struct Synthesizer<'a> {
    models: &'a ModelPool,
    config: &'a ScoutConfig,
}

impl<'a> Synthesizer<'a> {
    pub fn new(models: &'a ModelPool, config: &'a ScoutConfig) -> Self {
        Self { models, config }
    }

    /// Produce the report: one draft pass, then refinement passes up to the
    /// iteration cap. Empty evidence yields an explicit low-confidence report.
    pub async fn synthesize(
        &self,
        query: &str,
        report_type: &ReportType,
        custom_prompt: Option<&str>,
        plan: &ResearchPlan,
        context: &AggregatedContext,
    ) -> Result<Report, TaskError> {
        if context.is_empty() {
            return Ok(low_confidence_report(query, report_type.clone()));
        }

        let sources = context.source_urls();
        let numbered_context = render_context(context, &sources);

        let estimate = estimate_tokens(&[crate::types::Message::user(&numbered_context)]);
        let window = self.models.provider(ModelTier::Smart).context_window();
        if estimate > window {
            warn!(
                estimated_tokens = estimate,
                context_window = window,
                "Aggregated context may exceed the smart model's window"
            );
        }

        let mut body = self
            .draft(query, report_type, custom_prompt, plan, context, &numbered_context)
            .await?;

        for pass in 2..=self.config.research.max_iterations {
            match self.refine(query, &body, &numbered_context).await {
                Ok(answer) => {
                    let trimmed = answer.trim();
                    if trimmed == NO_CHANGES_MARKER || trimmed.is_empty() {
                        debug!(pass, "Draft converged");
                        break;
                    }
                    body = answer;
                }
                Err(e) => {
                    // A draft exists; a failed refinement is not worth the task
                    warn!(pass, error = %e, "Refinement pass failed; keeping current draft");
                    break;
                }
            }
        }

        let cited = cited_sources(&body, &sources);
        if !cited.is_empty() {
            body.push_str("\n\n## Sources\n\n");
            for (number, url) in &cited {
                body.push_str(&format!("[{number}]: {url}\n"));
            }
        }

        info!(
            sources = cited.len(),
            report_type = %report_type,
            "Report synthesized"
        );
        Ok(Report {
            body,
            sources: cited.into_iter().map(|(_, url)| url).collect(),
            report_type: report_type.clone(),
        })
    }

    async fn draft(
        &self,
        query: &str,
        report_type: &ReportType,
        custom_prompt: Option<&str>,
        plan: &ResearchPlan,
        context: &AggregatedContext,
        numbered_context: &str,
    ) -> Result<String, TaskError> {
        if matches!(report_type, ReportType::Detailed) && !plan.subtopics.is_empty() {
            return self.draft_detailed(query, plan, context, numbered_context).await;
        }

        let instructions = match report_type {
            ReportType::Summary => "Write a concise, factual markdown summary answering the \
                question."
                .to_string(),
            ReportType::Outline => "Write a structured markdown outline (headings and nested \
                bullet points, no prose paragraphs) covering the question."
                .to_string(),
            ReportType::Custom => custom_prompt
                .unwrap_or("Write a factual markdown report answering the question.")
                .to_string(),
            ReportType::Detailed => "Write a thorough, multi-section markdown report answering \
                the question."
                .to_string(),
        };
        let system = format!(
            "You are a research writer. {instructions} Use only the numbered sources provided \
             and cite them inline with [n] markers. Never invent sources or facts."
        );
        let user = format!("Question: {query}\n\nSources:\n{numbered_context}");

        self.models
            .prompt(ModelTier::Smart, &system, &user)
            .await
            .map_err(|e| TaskError::SynthesisFailed {
                attempts: 1,
                message: e.to_string(),
            })
    }

    /// Detailed reports: draft each subtopic section independently, then ask
    /// for an integrated revision. All of this is the first pass.
    async fn draft_detailed(
        &self,
        query: &str,
        plan: &ResearchPlan,
        context: &AggregatedContext,
        numbered_context: &str,
    ) -> Result<String, TaskError> {
        let mut sections = Vec::new();
        for (index, subtopic) in plan.subtopics.iter().enumerate() {
            let section_context = subtopic_context(plan, context, numbered_context, index);
            let system = format!(
                "You are a research writer. Write the markdown section \"{}\" of a report on \
                 the question below. Use only the numbered sources provided and cite them \
                 inline with [n] markers. Never invent sources or facts.",
                subtopic.title
            );
            let user = format!("Question: {query}\n\nSources:\n{section_context}");
            match self.models.prompt(ModelTier::Smart, &system, &user).await {
                Ok(text) => sections.push(format!("## {}\n\n{}", subtopic.title, text)),
                Err(e) => {
                    warn!(subtopic = %subtopic.title, error = %e, "Section draft failed; skipping");
                }
            }
        }
        if sections.is_empty() {
            return Err(TaskError::SynthesisFailed {
                attempts: 1,
                message: "every subtopic section draft failed".into(),
            });
        }

        let combined = sections.join("\n\n");
        let system = "You are a research editor. Integrate the draft sections below into one \
                      coherent markdown report: add a short introduction and conclusion, remove \
                      repetition between sections, and keep all inline [n] citation markers.";
        let user = format!("Question: {query}\n\nDraft sections:\n\n{combined}");
        match self.models.prompt(ModelTier::Smart, system, &user).await {
            Ok(text) if !text.trim().is_empty() => Ok(text),
            Ok(_) => Ok(combined),
            Err(e) => {
                // The concatenated sections are still a usable draft
                warn!(error = %e, "Integration pass failed; using concatenated sections");
                Ok(combined)
            }
        }
    }

    async fn refine(
        &self,
        query: &str,
        draft: &str,
        numbered_context: &str,
    ) -> Result<String, crate::error::LlmError> {
        let system = format!(
            "You are a research editor. Improve the draft report below: fix factual gaps using \
             the sources, tighten the prose, and keep inline [n] citation markers consistent \
             with the source numbering. If the draft needs no changes, respond with exactly \
             {NO_CHANGES_MARKER} and nothing else."
        );
        let user = format!(
            "Question: {query}\n\nSources:\n{numbered_context}\n\nDraft:\n{draft}"
        );
        self.models.prompt(ModelTier::Smart, &system, &user).await
    }
}

/// Render the context as a numbered source list for prompts.
fn render_context(context: &AggregatedContext, sources: &[String]) -> String {
    let mut out = String::new();
    for snippet in &context.snippets {
        let key = crate::retrieve::normalize_url(&snippet.url);
        let number = sources.iter().position(|u| *u == key).map(|i| i + 1);
        if let Some(number) = number {
            let title = snippet.title.as_deref().unwrap_or("");
            if title.is_empty() {
                out.push_str(&format!("[{number}] {}\n{}\n\n", snippet.url, snippet.text));
            } else {
                out.push_str(&format!(
                    "[{number}] {title} ({})\n{}\n\n",
                    snippet.url, snippet.text
                ));
            }
        }
    }
    out
}

/// Context restricted to one subtopic's snippets; the full context when the
/// subtopic gathered nothing of its own.
fn subtopic_context(
    plan: &ResearchPlan,
    context: &AggregatedContext,
    full: &str,
    subtopic_index: usize,
) -> String {
    let sources = context.source_urls();
    let restricted = AggregatedContext {
        snippets: context
            .snippets
            .iter()
            .filter(|s| {
                plan.sub_queries
                    .get(s.sub_query)
                    .map(|sq| sq.subtopic == Some(subtopic_index))
                    .unwrap_or(false)
            })
            .cloned()
            .collect(),
    };
    if restricted.is_empty() {
        full.to_string()
    } else {
        render_context(&restricted, &sources)
    }
}

/// Which context sources the body actually references, by `[n]` marker or by
/// URL occurrence. Numbers match the context's source numbering.
fn cited_sources(body: &str, sources: &[String]) -> Vec<(usize, String)> {
    sources
        .iter()
        .enumerate()
        .filter_map(|(i, url)| {
            let number = i + 1;
            let marker = format!("[{number}]");
            (body.contains(&marker) || body.contains(url.as_str()))
                .then(|| (number, url.clone()))
        })
        .collect()
}

fn low_confidence_report(query: &str, report_type: ReportType) -> Report {
    Report {
        body: format!(
            "# Research report\n\nNo usable evidence could be gathered for the question:\n\n\
             > {query}\n\nThis report is low-confidence and cites no sources. Consider \
             rephrasing the question or configuring additional search backends."
        ),
        sources: Vec::new(),
        report_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmProvider;
    use crate::research::planner::{SubQuery, Subtopic};
    use crate::research::summarizer::EvidenceSnippet;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use uuid::Uuid;

    fn snippet(url: &str, text: &str, sub_query: usize) -> EvidenceSnippet {
        EvidenceSnippet {
            url: url.to_string(),
            title: None,
            text: text.to_string(),
            relevance: 0.8,
            sub_query,
        }
    }

    fn flat_plan() -> ResearchPlan {
        ResearchPlan {
            sub_queries: vec![SubQuery {
                id: Uuid::new_v4(),
                text: "q".into(),
                subtopic: None,
            }],
            subtopics: Vec::new(),
        }
    }

    fn setup(max_iterations: usize) -> (Arc<MockLlmProvider>, ModelPool, ScoutConfig) {
        let smart = Arc::new(MockLlmProvider::new());
        let mut config = ScoutConfig::default();
        config.research.max_iterations = max_iterations;
        config.retry.max_retries = 0;
        let pool = ModelPool::new(Arc::new(MockLlmProvider::new()), smart.clone(), &config);
        (smart, pool, config)
    }

    fn context_with(snippets: Vec<EvidenceSnippet>) -> AggregatedContext {
        AggregatedContext { snippets }
    }

    #[tokio::test]
    async fn test_single_iteration_means_one_draft_call() {
        let (smart, pool, config) = setup(1);
        smart.queue_text("Answer citing [1].");

        let context = context_with(vec![snippet("https://a.example/1", "fact", 0)]);
        let report = Synthesizer::new(&pool, &config)
            .synthesize("q", &ReportType::Summary, None, &flat_plan(), &context)
            .await
            .unwrap();

        assert_eq!(smart.call_count(), 1);
        assert!(report.body.starts_with("Answer citing [1]."));
    }

    #[tokio::test]
    async fn test_refinement_runs_within_iteration_cap() {
        let (smart, pool, config) = setup(3);
        smart.queue_text("Draft citing [1].");
        smart.queue_text("Better draft citing [1].");
        smart.queue_text("Best draft citing [1].");

        let context = context_with(vec![snippet("https://a.example/1", "fact", 0)]);
        let report = Synthesizer::new(&pool, &config)
            .synthesize("q", &ReportType::Summary, None, &flat_plan(), &context)
            .await
            .unwrap();

        assert_eq!(smart.call_count(), 3);
        assert!(report.body.starts_with("Best draft citing [1]."));
    }

    #[tokio::test]
    async fn test_no_changes_marker_stops_refinement() {
        let (smart, pool, config) = setup(5);
        smart.queue_text("Draft citing [1].");
        smart.queue_text(NO_CHANGES_MARKER);
        smart.queue_text("never reached");

        let context = context_with(vec![snippet("https://a.example/1", "fact", 0)]);
        let report = Synthesizer::new(&pool, &config)
            .synthesize("q", &ReportType::Summary, None, &flat_plan(), &context)
            .await
            .unwrap();

        assert_eq!(smart.call_count(), 2);
        assert!(report.body.starts_with("Draft citing [1]."));
    }

    #[tokio::test]
    async fn test_citations_subset_of_context() {
        let (smart, pool, config) = setup(1);
        smart.queue_text("Only the first source matters [1]. See also https://fabricated.example/x.");

        let context = context_with(vec![
            snippet("https://a.example/1", "fact one", 0),
            snippet("https://b.example/2", "fact two", 0),
        ]);
        let report = Synthesizer::new(&pool, &config)
            .synthesize("q", &ReportType::Summary, None, &flat_plan(), &context)
            .await
            .unwrap();

        assert_eq!(report.sources, vec!["https://a.example/1".to_string()]);
        assert!(report.body.contains("## Sources"));
        assert!(report.body.contains("[1]: https://a.example/1"));
        assert!(!report.body.contains("[2]: https://b.example/2"));
    }

    #[tokio::test]
    async fn test_draft_failure_is_synthesis_failed() {
        let (smart, pool, config) = setup(2);
        smart.queue_error(crate::error::LlmError::ApiRequest {
            message: "boom".into(),
        });

        let context = context_with(vec![snippet("https://a.example/1", "fact", 0)]);
        let result = Synthesizer::new(&pool, &config)
            .synthesize("q", &ReportType::Summary, None, &flat_plan(), &context)
            .await;
        assert!(matches!(result, Err(TaskError::SynthesisFailed { .. })));
    }

    #[tokio::test]
    async fn test_refinement_failure_keeps_draft() {
        let (smart, pool, config) = setup(3);
        smart.queue_text("Draft citing [1].");
        smart.queue_error(crate::error::LlmError::ApiRequest {
            message: "boom".into(),
        });

        let context = context_with(vec![snippet("https://a.example/1", "fact", 0)]);
        let report = Synthesizer::new(&pool, &config)
            .synthesize("q", &ReportType::Summary, None, &flat_plan(), &context)
            .await
            .unwrap();
        assert!(report.body.starts_with("Draft citing [1]."));
    }

    #[tokio::test]
    async fn test_empty_context_is_low_confidence_report() {
        let (smart, pool, config) = setup(2);
        let report = Synthesizer::new(&pool, &config)
            .synthesize(
                "q",
                &ReportType::Summary,
                None,
                &flat_plan(),
                &AggregatedContext::default(),
            )
            .await
            .unwrap();

        assert_eq!(smart.call_count(), 0);
        assert!(report.sources.is_empty());
        assert!(report.body.contains("low-confidence"));
    }

    #[tokio::test]
    async fn test_detailed_report_drafts_sections_then_integrates() {
        let (smart, pool, config) = setup(1);
        smart.queue_text("Section one text [1].");
        smart.queue_text("Section two text [2].");
        smart.queue_text("Integrated report [1][2].");

        let plan = ResearchPlan {
            sub_queries: vec![
                SubQuery {
                    id: Uuid::new_v4(),
                    text: "q1".into(),
                    subtopic: Some(0),
                },
                SubQuery {
                    id: Uuid::new_v4(),
                    text: "q2".into(),
                    subtopic: Some(1),
                },
            ],
            subtopics: vec![
                Subtopic { title: "One".into() },
                Subtopic { title: "Two".into() },
            ],
        };
        let context = context_with(vec![
            snippet("https://a.example/1", "fact one", 0),
            snippet("https://b.example/2", "fact two", 1),
        ]);

        let report = Synthesizer::new(&pool, &config)
            .synthesize("q", &ReportType::Detailed, None, &plan, &context)
            .await
            .unwrap();

        assert_eq!(smart.call_count(), 3);
        assert!(report.body.starts_with("Integrated report"));
        assert_eq!(report.sources.len(), 2);
    }

    #[test]
    fn test_report_type_round_trip() {
        for (s, t) in [
            ("summary", ReportType::Summary),
            ("Detailed", ReportType::Detailed),
            ("outline", ReportType::Outline),
            ("custom", ReportType::Custom),
        ] {
            assert_eq!(s.parse::<ReportType>().unwrap(), t);
        }
        assert!("essay".parse::<ReportType>().is_err());
    }
}
