//! The research orchestration pipeline.
//!
//! One task flows through planning, parallel evidence collection,
//! aggregation, and synthesis. `engine::ResearchEngine` is the public entry
//! point; the stage modules are exposed for embedding and testing.

pub mod aggregator;
pub mod collector;
pub mod dispatcher;
pub mod engine;
pub mod parse;
pub mod planner;
pub mod summarizer;
pub mod synthesizer;

pub use aggregator::{aggregate, AggregatedContext};
pub use collector::EvidenceCollector;
pub use dispatcher::{dispatch, SubQueryOutcome};
pub use engine::{ResearchEngine, ResearchTask, TaskPhase};
pub use planner::{Planner, ResearchPlan, SubQuery, Subtopic};
pub use summarizer::{EvidenceSnippet, Summarizer};
pub use synthesizer::{Report, ReportType, Synthesizer};
