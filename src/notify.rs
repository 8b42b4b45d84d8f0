//! Agent session notification
//!
//! After a run, a persistent agent session can be told that fresh review
//! output exists. Strictly best effort: the caller logs a failure and moves
//! on, a dead agent endpoint must never fail the run.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::time::Duration;

const NOTIFY_TIMEOUT_SECS: u64 = 10;

/// The event payload POSTed to the agent endpoint.
#[derive(Debug, Serialize)]
pub struct AgentEvent<'a> {
    pub session: &'a str,
    pub event: &'a str,
    pub summary: &'a str,
    pub fix_count: usize,
}

/// Tell the agent session a review run finished.
pub async fn send(endpoint: &str, session: &str, summary: &str, fix_count: usize) -> Result<()> {
    let event = AgentEvent {
        session,
        event: "review_complete",
        summary,
        fix_count,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(NOTIFY_TIMEOUT_SECS))
        .build()
        .context("failed to create HTTP client")?;

    let response = client
        .post(endpoint)
        .json(&event)
        .send()
        .await
        .with_context(|| format!("failed to reach agent endpoint {endpoint}"))?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(anyhow!("agent endpoint returned {status}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_payload_shape() {
        let event = AgentEvent {
            session: "pr-42",
            event: "review_complete",
            summary: "two bugs found",
            fix_count: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["session"], "pr-42");
        assert_eq!(json["event"], "review_complete");
        assert_eq!(json["summary"], "two bugs found");
        assert_eq!(json["fix_count"], 2);
    }
}
