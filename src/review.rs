//! Upstream review stage
//!
//! One chat call over the PR diff produces the findings document everything
//! downstream consumes. The model's output is untrusted free text and goes
//! through the same defensive parse ladder as the fix responses.

use crate::findings::ReviewDocument;
use crate::llm::client::{ChatBackend, ChatRequest};
use crate::llm::parse;
use crate::llm::prompts::REVIEW_SYSTEM;
use anyhow::{Context, Result};
use tracing::info;

/// Review sampling temperature. Slightly above the fix stage's: the review
/// benefits from a little judgment, the fix does not.
const REVIEW_TEMPERATURE: f32 = 0.2;

/// Ceiling on diff characters sent for review. Oversized diffs keep their
/// beginning and end; the middle is elided.
const MAX_DIFF_CHARS: usize = 80_000;

/// Review a pull-request diff and return the findings document.
pub async fn run(
    backend: &dyn ChatBackend,
    model: &str,
    diff_text: &str,
) -> Result<ReviewDocument> {
    let diff_view = parse::truncate_middle(diff_text, MAX_DIFF_CHARS);
    let user = format!("Review this pull-request diff:\n\n```diff\n{diff_view}\n```");
    let request = ChatRequest::json_mode(model, REVIEW_SYSTEM, &user, REVIEW_TEMPERATURE);

    let response = backend
        .complete(&request)
        .await
        .context("review request failed")?;

    if let Some(usage) = &response.usage {
        info!(total_tokens = usage.total_tokens, "review call usage");
    }

    let document: ReviewDocument = parse::parse_structured(&response.content, "code review")?;
    info!(
        findings = document.findings.len(),
        risk = %document.risk_level,
        "review complete"
    );
    Ok(document)
}
