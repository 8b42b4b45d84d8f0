//! Markdown report rendering and PR comment posting
//!
//! The report is the human-facing end of the run: the review summary, the
//! findings grouped by severity, and every generated fix with its diff.
//! Posting it as a GitHub PR comment is optional and best effort.

use crate::config::Config;
use crate::diff;
use crate::findings::{ReviewDocument, Severity};
use crate::fixgen::FixResult;
use crate::llm::parse::truncate_str;
use anyhow::{anyhow, Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::time::Duration;

const API_TIMEOUT_SECS: u64 = 30;

/// GitHub rejects issue comments over 65536 characters; stay clear of it.
const MAX_COMMENT_CHARS: usize = 60_000;

/// Maximum length for error body content in error messages.
const MAX_ERROR_BODY_LEN: usize = 200;

const SEVERITY_ORDER: &[Severity] = &[
    Severity::Critical,
    Severity::Bug,
    Severity::Warning,
    Severity::Info,
    Severity::Style,
];

/// Render the full markdown report for one run.
pub fn render(document: &ReviewDocument, fixes: &[FixResult]) -> String {
    let mut out = String::from("## Quasar review\n\n");

    if !document.summary.trim().is_empty() {
        out.push_str(&format!("> {}\n\n", document.summary.trim()));
    }

    out.push_str(&format!(
        "**Risk:** {} · **Findings:** {} · **Fixes generated:** {}\n",
        document.risk_level,
        document.findings.len(),
        fixes.len()
    ));

    if document.findings.is_empty() {
        out.push_str("\nNo issues found.\n");
    } else {
        out.push_str("\n### Findings\n");
        for severity in SEVERITY_ORDER {
            let group: Vec<_> = document
                .findings
                .iter()
                .filter(|f| f.severity == *severity)
                .collect();
            if group.is_empty() {
                continue;
            }
            out.push_str(&format!("\n**{}** ({})\n\n", severity, group.len()));
            for finding in group {
                let location = match finding.line {
                    Some(line) => format!("`{}:{}`", finding.file, line),
                    None => format!("`{}`", finding.file),
                };
                out.push_str(&format!("- {} — {}\n", location, finding.description));
            }
        }
    }

    if fixes.is_empty() {
        if document.eligible_count() > 0 {
            out.push_str("\nNo fixes were generated.\n");
        }
    } else {
        out.push_str("\n### Proposed fixes\n");
        for fix in fixes {
            let (adds, removes) = diff::stats(&fix.diff);
            out.push_str(&format!(
                "\n#### `{}` — {}\n\n{}\n\n{}\n\n```diff\n{}```\n_+{} −{}_\n",
                fix.file, fix.severity, fix.description, fix.explanation, fix.diff, adds, removes
            ));
        }
    }

    out.push_str(&format!(
        "\n---\n_Generated by quasar at {}_\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    out
}

#[derive(Serialize)]
struct CommentRequest<'a> {
    body: &'a str,
}

/// Post the report as a comment on the configured pull request.
pub async fn post_comment(config: &Config, markdown: &str) -> Result<()> {
    let (token, repository, pr_number) = match (
        &config.github_token,
        &config.github_repository,
        config.pr_number,
    ) {
        (Some(token), Some(repository), Some(pr_number)) => (token, repository, pr_number),
        _ => return Err(anyhow!("GitHub coordinates are not fully configured")),
    };

    let url = format!("https://api.github.com/repos/{repository}/issues/{pr_number}/comments");
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(API_TIMEOUT_SECS))
        .build()
        .context("failed to create HTTP client")?;

    let body = truncate_str(markdown, MAX_COMMENT_CHARS);
    let response = client
        .post(&url)
        .header("Accept", "application/vnd.github+json")
        .header("Authorization", format!("Bearer {token}"))
        .header("User-Agent", "quasar-ci")
        .header("X-GitHub-Api-Version", "2022-11-28")
        .json(&CommentRequest { body })
        .send()
        .await
        .context("failed to send PR comment")?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        let error_body = response.text().await.unwrap_or_default();
        Err(anyhow!(
            "GitHub API error ({}): {}",
            status,
            sanitize_error_body(&error_body)
        ))
    }
}

/// Sanitize an API error body to prevent credential leakage.
/// Truncates long responses and redacts potential secrets.
fn sanitize_error_body(body: &str) -> String {
    const SECRET_PATTERNS: &[&str] = &[
        "token",
        "secret",
        "password",
        "credential",
        "auth",
        "bearer",
        "ghp_",
        "gho_",
        "ghu_",
        "github_pat_",
    ];

    let truncated = if body.len() > MAX_ERROR_BODY_LEN {
        format!("{}... (truncated)", truncate_str(body, MAX_ERROR_BODY_LEN))
    } else {
        body.to_string()
    };

    let lower = truncated.to_lowercase();
    for pattern in SECRET_PATTERNS {
        if lower.contains(pattern) {
            return "(error details redacted - may contain sensitive data)".to_string();
        }
    }

    truncated
}
