//! Run configuration for quasar
//!
//! Everything network-facing is environment-supplied so the binary can run
//! unattended inside a CI job without a config file.

use crate::fixgen::HARD_MAX_FIXES;
use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use url::Url;

/// Default number of findings promoted to fix generation per run.
pub const DEFAULT_MAX_FIXES: usize = 5;

/// Default per-request timeout for outbound completion calls.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4.5";

/// Resolved run configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the chat-completion endpoint (`/chat/completions` is appended).
    pub api_base: Url,
    /// Bearer credential for the completion endpoint.
    pub api_key: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Cap on findings promoted to fix generation (never above [`HARD_MAX_FIXES`]).
    pub max_fixes: usize,
    /// Per-request timeout for outbound completion calls.
    pub request_timeout: Duration,
    /// GitHub credential for posting the report as a PR comment.
    pub github_token: Option<String>,
    /// `owner/repo` slug, as provided by Actions via `GITHUB_REPOSITORY`.
    pub github_repository: Option<String>,
    /// Pull request number to comment on.
    pub pr_number: Option<u64>,
    /// Endpoint of a persistent agent session to notify after the run.
    pub agent_endpoint: Option<String>,
    /// Session identifier passed through to the agent.
    pub agent_session: Option<String>,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Fails only for genuinely unusable values (missing credential, bad
    /// URL, unparsable numbers). An out-of-range `QUASAR_MAX_FIXES` is
    /// clamped rather than rejected.
    pub fn from_env() -> Result<Self> {
        let api_base = match env_var("QUASAR_API_BASE") {
            Some(raw) => Url::parse(raw.trim_end_matches('/'))
                .with_context(|| format!("QUASAR_API_BASE is not a valid URL: {raw}"))?,
            None => Url::parse(DEFAULT_API_BASE).expect("default API base parses"),
        };

        let api_key = env_var("QUASAR_API_KEY").ok_or_else(|| {
            anyhow!("QUASAR_API_KEY is not set; the review endpoint requires a bearer credential")
        })?;

        let model = env_var("QUASAR_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let max_fixes = match env_var("QUASAR_MAX_FIXES") {
            Some(raw) => {
                let requested: usize = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("QUASAR_MAX_FIXES is not an integer: {raw}"))?;
                if requested > HARD_MAX_FIXES {
                    tracing::warn!(
                        requested,
                        cap = HARD_MAX_FIXES,
                        "QUASAR_MAX_FIXES exceeds the hard cap; clamping"
                    );
                    HARD_MAX_FIXES
                } else {
                    requested
                }
            }
            None => DEFAULT_MAX_FIXES,
        };

        let timeout_secs = match env_var("QUASAR_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("QUASAR_TIMEOUT_SECS is not an integer: {raw}"))?;
                if secs == 0 {
                    return Err(anyhow!("QUASAR_TIMEOUT_SECS must be greater than zero"));
                }
                secs
            }
            None => DEFAULT_TIMEOUT_SECS,
        };

        let pr_number = match env_var("QUASAR_PR_NUMBER") {
            Some(raw) => Some(
                raw.trim()
                    .parse()
                    .with_context(|| format!("QUASAR_PR_NUMBER is not an integer: {raw}"))?,
            ),
            None => None,
        };

        Ok(Config {
            api_base,
            api_key,
            model,
            max_fixes,
            request_timeout: Duration::from_secs(timeout_secs),
            github_token: env_var("GITHUB_TOKEN"),
            github_repository: env_var("GITHUB_REPOSITORY"),
            pr_number,
            agent_endpoint: env_var("QUASAR_AGENT_ENDPOINT"),
            agent_session: env_var("QUASAR_AGENT_SESSION"),
        })
    }

    /// Whether enough GitHub coordinates are present to post a PR comment.
    pub fn can_post_comment(&self) -> bool {
        self.github_token.is_some() && self.github_repository.is_some() && self.pr_number.is_some()
    }
}

/// Read an environment variable, treating empty values as unset.
fn env_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}
