//! Bounded parallel dispatch with deterministic result ordering.
//!
//! An explicit task-group/join-barrier: units run in a `JoinSet` bounded by a
//! semaphore at the configured concurrency limit, and results come back keyed
//! by submission index so downstream stages see the same order regardless of
//! completion order. Cancellation aborts all in-flight units and discards
//! every partial result.

use crate::error::TaskError;
use crate::research::planner::SubQuery;
use crate::research::summarizer::EvidenceSnippet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// What one sub-query unit produced.
///
/// A failed or empty unit is a recorded outcome, not an error: it contributes
/// zero snippets and the task proceeds on the rest.
#[derive(Debug)]
pub struct SubQueryOutcome {
    pub index: usize,
    pub sub_query: SubQuery,
    pub snippets: Vec<EvidenceSnippet>,
}

impl SubQueryOutcome {
    pub fn produced_evidence(&self) -> bool {
        !self.snippets.is_empty()
    }
}

/// Run `worker` over `items` with at most `concurrency` units in flight.
///
/// Results are returned in submission order. If `cancel` fires before every
/// unit has finished, all in-flight units are aborted and `TaskError::Cancelled`
/// is returned with no partial results.
pub async fn dispatch<I, T, F, Fut>(
    items: Vec<I>,
    concurrency: usize,
    cancel: &CancellationToken,
    worker: F,
) -> Result<Vec<T>, TaskError>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(usize, I) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut set = JoinSet::new();
    let count = items.len();

    for (index, item) in items.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let unit = worker(index, item);
        set.spawn(async move {
            // Held for the unit's whole lifetime
            let _permit = semaphore.acquire_owned().await.ok();
            (index, unit.await)
        });
    }

    let mut slots: Vec<Option<T>> = (0..count).map(|_| None).collect();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                set.abort_all();
                while set.join_next().await.is_some() {}
                return Err(TaskError::Cancelled);
            }
            joined = set.join_next() => {
                match joined {
                    None => break,
                    Some(Ok((index, value))) => slots[index] = Some(value),
                    Some(Err(e)) => {
                        // A panicked unit contributes nothing
                        error!(error = %e, "Dispatched unit failed to join");
                    }
                }
            }
        }
    }

    Ok(slots.into_iter().flatten().collect())
}
