//! Chat-completion HTTP client
//!
//! One request shape for both stages: system + user message, JSON response
//! mode, explicit temperature. The outbound call sits behind [`ChatBackend`]
//! so the pipeline can be exercised without a network.

use super::models::{Usage, MAX_COMPLETION_TOKENS};
use super::parse::truncate_str;
use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

/// Retry budget for rate-limited calls. The dispatcher's per-call timeout
/// still bounds the total time spent here.
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 2000;
const BACKOFF_MULTIPLIER: u64 = 2;

/// A single chat-completion request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    /// Build a JSON-mode request with a system and a user message.
    pub fn json_mode(model: &str, system: &str, user: &str, temperature: f32) -> Self {
        ChatRequest {
            model: model.to_string(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens: MAX_COMPLETION_TOKENS,
            temperature,
            stream: false,
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

/// A completed call: the assistant text plus usage accounting.
#[derive(Debug)]
pub struct LlmResponse {
    pub content: String,
    pub usage: Option<Usage>,
    pub model: String,
}

/// The outbound completion call. Implemented over HTTP in production and by
/// scripted stubs in tests.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<LlmResponse>;
}

/// Production backend speaking the OpenAI-style chat-completions protocol.
pub struct HttpBackend {
    client: reqwest::Client,
    url: Url,
    api_key: String,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Result<Self> {
        let raw = format!(
            "{}/chat/completions",
            config.api_base.as_str().trim_end_matches('/')
        );
        let url = Url::parse(&raw).with_context(|| format!("bad completion URL: {raw}"))?;
        Ok(HttpBackend {
            client: reqwest::Client::new(),
            url,
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<LlmResponse> {
        let mut retry_count = 0;

        loop {
            let response = self
                .client
                .post(self.url.clone())
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(request)
                .send()
                .await?;

            let status = response.status();
            let text = response.text().await?;

            if status.is_success() {
                let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
                    anyhow!(
                        "failed to parse completion response: {e}\n{}",
                        truncate_str(&text, 400)
                    )
                })?;

                let content = parsed
                    .choices
                    .first()
                    .map(|c| c.message.content.clone())
                    .unwrap_or_default();

                return Ok(LlmResponse {
                    content,
                    usage: parsed.usage,
                    model: parsed.model.unwrap_or_default(),
                });
            }

            if status.as_u16() == 429 && retry_count < MAX_RETRIES {
                retry_count += 1;
                let backoff_secs = parse_retry_after(&text).unwrap_or_else(|| {
                    (INITIAL_BACKOFF_MS * BACKOFF_MULTIPLIER.pow(retry_count - 1)) / 1000
                });
                tracing::warn!(
                    backoff_secs,
                    attempt = retry_count,
                    max = MAX_RETRIES,
                    "completion endpoint rate limited; retrying"
                );
                tokio::time::sleep(tokio::time::Duration::from_secs(backoff_secs)).await;
                continue;
            }

            return Err(match status.as_u16() {
                401 => anyhow!("completion endpoint rejected the API credential (401)"),
                429 => anyhow!("rate limited after {retry_count} retries"),
                500..=599 => anyhow!("completion endpoint server error ({status})"),
                _ => anyhow!("API error {}: {}", status, truncate_str(&text, 200)),
            });
        }
    }
}

/// Extract a retry-after hint from a rate-limit response body, if present.
fn parse_retry_after(text: &str) -> Option<u64> {
    let text_lower = text.to_lowercase();
    let pos = text_lower.find("retry")?;
    for word in text_lower[pos..].split_whitespace().skip(1).take(5) {
        if let Ok(secs) = word
            .trim_matches(|c: char| !c.is_numeric())
            .parse::<u64>()
        {
            if secs > 0 && secs < 300 {
                return Some(secs);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_mode_request_shape() {
        let request = ChatRequest::json_mode("test-model", "sys", "usr", 0.1);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[1].role, "user");
        assert_eq!(request.temperature, 0.1);
        assert!(!request.stream);

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["model"], "test-model");
    }

    #[test]
    fn test_parse_retry_after_finds_seconds() {
        assert_eq!(
            parse_retry_after("rate limited, retry after 12 seconds"),
            Some(12)
        );
        assert_eq!(parse_retry_after("permanent failure"), None);
    }

    #[test]
    fn test_parse_retry_after_ignores_absurd_values() {
        assert_eq!(parse_retry_after("retry after 100000 seconds"), None);
    }
}
