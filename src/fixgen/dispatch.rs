//! Phase 2: concurrent fan-out of fix requests
//!
//! One in-flight call per task. The cap on tasks (≤ 10) is the concurrency
//! bound; no extra queue is needed on a CI runner. Each call owns its own
//! timeout and outcome, so a hung or failed request cannot delay or abort a
//! sibling. `join_all` yields results in submission order, which is what
//! keeps the final Fix Set deterministic under arbitrary completion
//! interleaving.

use crate::llm::client::{ChatBackend, ChatRequest};
use crate::llm::models::Usage;
use futures::future::join_all;
use std::time::Duration;
use tracing::{debug, warn};

/// Terminal failure of a single dispatched call.
#[derive(Debug, thiserror::Error)]
pub enum DispatchFailure {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Terminal state of a single dispatched call.
#[derive(Debug)]
pub enum Outcome {
    Completed {
        content: String,
        usage: Option<Usage>,
    },
    Failed(DispatchFailure),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// The complete result of phase 2: one outcome per dispatched slot, in
/// submission order, plus aggregate accounting for logging.
#[derive(Debug)]
pub struct DispatchReport {
    pub outcomes: Vec<(usize, Outcome)>,
    pub failure_count: usize,
    pub usage: Usage,
}

/// Dispatch every request concurrently and wait for all of them.
///
/// This is the pipeline's single synchronization barrier: the returned
/// report covers every submitted slot, and nothing is delivered until every
/// call has either completed or definitively failed.
pub async fn dispatch(
    backend: &dyn ChatBackend,
    requests: Vec<(usize, ChatRequest)>,
    timeout: Duration,
) -> DispatchReport {
    let total = requests.len();

    let calls = requests.into_iter().map(|(slot, request)| async move {
        let outcome = match tokio::time::timeout(timeout, backend.complete(&request)).await {
            Err(_) => {
                debug!(slot, ?timeout, "fix request timed out");
                Outcome::Failed(DispatchFailure::Timeout(timeout))
            }
            Ok(Err(err)) => {
                debug!(slot, error = %err, "fix request failed");
                Outcome::Failed(DispatchFailure::Transport(format!("{err:#}")))
            }
            Ok(Ok(response)) => {
                debug!(slot, "fix request completed");
                Outcome::Completed {
                    content: response.content,
                    usage: response.usage,
                }
            }
        };
        (slot, outcome)
    });

    let outcomes = join_all(calls).await;
    let failure_count = outcomes.iter().filter(|(_, o)| o.is_failure()).count();

    let mut usage = Usage::default();
    for (_, outcome) in &outcomes {
        if let Outcome::Completed { usage: call_usage, .. } = outcome {
            usage.absorb(call_usage.as_ref());
        }
    }

    if failure_count > 0 {
        warn!(failure_count, total, "some fix requests did not complete");
    }
    if usage.total_tokens > 0 {
        debug!(total_tokens = usage.total_tokens, "fix generation usage");
    }
    DispatchReport {
        outcomes,
        failure_count,
        usage,
    }
}
