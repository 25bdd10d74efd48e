//! Evidence aggregation and deduplication.
//!
//! Merges per-sub-query snippet lists in submission order into one read-only
//! context for synthesis. Two snippets collapse when they come from the same
//! normalized URL and their texts overlap beyond the configured threshold;
//! the survivor is the more relevant one, at the earlier position.

use crate::research::dispatcher::SubQueryOutcome;
use crate::research::summarizer::EvidenceSnippet;
use crate::retrieve::normalize_url;
use std::collections::HashSet;
use tracing::debug;

/// The deduplicated evidence context a report is synthesized from.
///
/// Built once per task; consumed read-only.
#[derive(Debug, Default)]
pub struct AggregatedContext {
    pub snippets: Vec<EvidenceSnippet>,
}

impl AggregatedContext {
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// Unique normalized source URLs, in snippet order.
    pub fn source_urls(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.snippets
            .iter()
            .map(|s| normalize_url(&s.url))
            .filter(|u| seen.insert(u.clone()))
            .collect()
    }
}

/// Word-set Jaccard overlap between two texts, in 0.0-1.0.
///
/// Case-insensitive; punctuation-attached words count as distinct tokens,
/// which is accurate enough for near-duplicate detection on summaries.
pub fn content_overlap(a: &str, b: &str) -> f64 {
    let words_a: HashSet<String> = a.split_whitespace().map(str::to_lowercase).collect();
    let words_b: HashSet<String> = b.split_whitespace().map(str::to_lowercase).collect();
    if words_a.is_empty() && words_b.is_empty() {
        return 1.0;
    }
    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    intersection as f64 / union as f64
}

/// Merge sub-query outcomes into one deduplicated context.
///
/// Outcomes must already be in submission order; within that order, the first
/// occurrence of a duplicate pair keeps its position and the higher-relevance
/// text wins. Overlap is not transitive, and a replacement can introduce new
/// overlap with snippets that survived the replaced text, so passes repeat
/// until a pass collapses nothing. Aggregating an already-aggregated context
/// changes nothing.
pub fn aggregate(outcomes: &[SubQueryOutcome], overlap_threshold: f64) -> AggregatedContext {
    let mut snippets: Vec<EvidenceSnippet> = outcomes
        .iter()
        .flat_map(|o| o.snippets.iter())
        .cloned()
        .collect();
    let incoming = snippets.len();

    loop {
        let (deduped, collapsed) = dedup_pass(snippets, overlap_threshold);
        snippets = deduped;
        if !collapsed {
            break;
        }
    }

    debug!(
        retained = snippets.len(),
        dropped = incoming - snippets.len(),
        "Evidence aggregation done"
    );
    AggregatedContext { snippets }
}

/// One dedup pass. Every collapse shortens the list, so repeating until
/// nothing collapses terminates.
fn dedup_pass(
    snippets: Vec<EvidenceSnippet>,
    overlap_threshold: f64,
) -> (Vec<EvidenceSnippet>, bool) {
    let mut retained: Vec<EvidenceSnippet> = Vec::new();
    let mut keys: Vec<String> = Vec::new();
    let mut collapsed = false;

    for snippet in snippets {
        let key = normalize_url(&snippet.url);
        let duplicate_of = keys.iter().enumerate().find_map(|(i, existing_key)| {
            (*existing_key == key
                && content_overlap(&retained[i].text, &snippet.text) > overlap_threshold)
                .then_some(i)
        });

        match duplicate_of {
            Some(i) => {
                collapsed = true;
                if snippet.relevance > retained[i].relevance {
                    // Better text, same (earlier) position
                    retained[i] = snippet;
                }
            }
            None => {
                keys.push(key);
                retained.push(snippet);
            }
        }
    }

    (retained, collapsed)
}
