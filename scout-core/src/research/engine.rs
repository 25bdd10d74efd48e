//! Research task orchestration.
//!
//! Drives one task through the phase machine: Planning -> Collecting ->
//! Aggregating -> Synthesizing -> Done. Failed is reachable only from
//! Collecting (total evidence failure) or from configuration errors before
//! the pipeline starts; phases are never re-entered. Nothing is persisted:
//! the returned `Report` is the only artifact.

use crate::config::ScoutConfig;
use crate::error::TaskError;
use crate::llm::ModelPool;
use crate::providers::create_provider;
use crate::research::aggregator::{aggregate, AggregatedContext};
use crate::research::collector::EvidenceCollector;
use crate::research::dispatcher::{dispatch, SubQueryOutcome};
use crate::research::planner::Planner;
use crate::research::summarizer::Summarizer;
use crate::research::synthesizer::{Report, ReportType, Synthesizer};
use crate::retrieve::{create_retrievers, Fetcher, PageFetcher, Retriever};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Lifecycle phase of a research task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Planning,
    Collecting,
    Aggregating,
    Synthesizing,
    Done,
    Failed,
}

impl std::fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskPhase::Planning => "planning",
            TaskPhase::Collecting => "collecting",
            TaskPhase::Aggregating => "aggregating",
            TaskPhase::Synthesizing => "synthesizing",
            TaskPhase::Done => "done",
            TaskPhase::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// One research request. Immutable once started.
#[derive(Debug, Clone)]
pub struct ResearchTask {
    pub id: Uuid,
    pub query: String,
    pub report_type: ReportType,
    /// Synthesis instructions for `ReportType::Custom`.
    pub custom_prompt: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ResearchTask {
    pub fn new(query: impl Into<String>, report_type: ReportType) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            report_type,
            custom_prompt: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_custom_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.custom_prompt = Some(prompt.into());
        self
    }
}

/// The research orchestration engine.
///
/// Holds the configured model pool, retriever backends, and fetcher; `run`
/// executes one task end to end. The engine is stateless across tasks and
/// safe to share behind an `Arc`.
pub struct ResearchEngine {
    config: ScoutConfig,
    models: Arc<ModelPool>,
    retrievers: Vec<Arc<dyn Retriever>>,
    fetcher: Arc<dyn Fetcher>,
}

impl ResearchEngine {
    /// Build an engine from configuration, instantiating the configured
    /// providers and backends.
    pub fn new(config: ScoutConfig) -> crate::error::Result<Self> {
        for warning in config.validate()? {
            warn!("{warning}");
        }
        let fast = create_provider(&config.fast_llm)?;
        let smart = create_provider(&config.smart_llm)?;
        let models = Arc::new(ModelPool::new(fast, smart, &config));
        let retrievers = create_retrievers(&config)?;
        let fetcher: Arc<dyn Fetcher> =
            Arc::new(PageFetcher::new(config.research.fetch_timeout_secs));
        Ok(Self {
            config,
            models,
            retrievers,
            fetcher,
        })
    }

    /// Build an engine from pre-built components. Used by tests and by
    /// callers embedding custom backends.
    pub fn with_components(
        config: ScoutConfig,
        models: Arc<ModelPool>,
        retrievers: Vec<Arc<dyn Retriever>>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            config,
            models,
            retrievers,
            fetcher,
        }
    }

    /// Run one research task to completion.
    ///
    /// Soft failures (a search, fetch, summarization, or a whole sub-query
    /// producing nothing) are absorbed along the way. The hard outcomes are
    /// the `TaskError` variants: every sub-query failing, synthesis failing
    /// with no draft, cancellation, or a configuration rejected up front.
    /// Cancellation discards all partial work.
    pub async fn run(
        &self,
        task: &ResearchTask,
        cancel: CancellationToken,
    ) -> Result<Report, TaskError> {
        self.config.validate()?;

        let mut phase = TaskPhase::Planning;
        info!(task_id = %task.id, query = %task.query, phase = %phase, "Research task started");

        let plan = Planner::new(&self.models, &self.config)
            .plan(&task.query, &task.report_type)
            .await;
        if cancel.is_cancelled() {
            return Err(TaskError::Cancelled);
        }

        phase = transition(task, phase, TaskPhase::Collecting);
        let attempted = plan.sub_queries.len();
        let outcomes = self.collect_all(plan.sub_queries.clone(), &cancel).await?;
        if outcomes.iter().all(|o| !o.produced_evidence()) {
            transition(task, phase, TaskPhase::Failed);
            return Err(TaskError::TotalEvidenceFailure { attempted });
        }

        phase = transition(task, phase, TaskPhase::Aggregating);
        let context: AggregatedContext =
            aggregate(&outcomes, self.config.research.dedup_overlap_threshold);
        if cancel.is_cancelled() {
            return Err(TaskError::Cancelled);
        }

        phase = transition(task, phase, TaskPhase::Synthesizing);
        let report = Synthesizer::new(&self.models, &self.config)
            .synthesize(
                &task.query,
                &task.report_type,
                task.custom_prompt.as_deref(),
                &plan,
                &context,
            )
            .await?;
        if cancel.is_cancelled() {
            return Err(TaskError::Cancelled);
        }

        transition(task, phase, TaskPhase::Done);
        Ok(report)
    }

    /// Fan the sub-queries out through the bounded dispatcher. Each unit
    /// searches, fetches, and summarizes independently.
    async fn collect_all(
        &self,
        sub_queries: Vec<crate::research::planner::SubQuery>,
        cancel: &CancellationToken,
    ) -> Result<Vec<SubQueryOutcome>, TaskError> {
        let collector = Arc::new(EvidenceCollector::new(
            self.retrievers.clone(),
            self.fetcher.clone(),
            &self.config,
        ));

        dispatch(
            sub_queries,
            self.config.concurrency(),
            cancel,
            |index, sub_query| {
                let collector = collector.clone();
                let models = self.models.clone();
                async move {
                    let documents = collector.collect(&sub_query.text).await;
                    let summarizer = Summarizer::new(&models);
                    let mut snippets = Vec::new();
                    for document in &documents {
                        if let Some(snippet) =
                            summarizer.summarize(index, &sub_query.text, document).await
                        {
                            snippets.push(snippet);
                        }
                    }
                    if snippets.is_empty() {
                        warn!(sub_query = %sub_query.text, "Sub-query produced no evidence");
                    }
                    SubQueryOutcome {
                        index,
                        sub_query,
                        snippets,
                    }
                }
            },
        )
        .await
    }
}

fn transition(task: &ResearchTask, from: TaskPhase, to: TaskPhase) -> TaskPhase {
    info!(task_id = %task.id, from = %from, to = %to, "Phase transition");
    to
}
