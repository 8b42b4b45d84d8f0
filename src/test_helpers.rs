//! Shared test scaffolding
//!
//! A scripted stand-in for the completion endpoint so pipeline tests can
//! control latency and failure per request without a network.

use crate::llm::client::{ChatBackend, ChatRequest, LlmResponse};
use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One scripted response, selected by substring match against the request's
/// user message.
#[derive(Clone)]
pub enum Behavior {
    Reply { content: String, delay: Duration },
    Fail { message: String, delay: Duration },
}

impl Behavior {
    pub fn reply(content: &str) -> Self {
        Behavior::Reply {
            content: content.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn reply_after(content: &str, delay_ms: u64) -> Self {
        Behavior::Reply {
            content: content.to_string(),
            delay: Duration::from_millis(delay_ms),
        }
    }

    pub fn fail(message: &str) -> Self {
        Behavior::Fail {
            message: message.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn fail_after(message: &str, delay_ms: u64) -> Self {
        Behavior::Fail {
            message: message.to_string(),
            delay: Duration::from_millis(delay_ms),
        }
    }
}

/// Serialize a well-formed fix-generation reply body.
pub fn fixed_code_reply(code: &str) -> String {
    serde_json::json!({
        "fixed_code": code,
        "explanation": "test fix",
        "diff_description": "test diff",
    })
    .to_string()
}

#[derive(Default)]
pub struct ScriptedBackend {
    behaviors: Vec<(String, Behavior)>,
    call_count: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a behavior for requests whose user message contains `key`.
    pub fn on(mut self, key: &str, behavior: Behavior) -> Self {
        self.behaviors.push((key.to_string(), behavior));
        self
    }

    /// Total completed calls, successful or not.
    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<LlmResponse> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        let user = request
            .messages
            .iter()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("");

        let behavior = self
            .behaviors
            .iter()
            .find(|(key, _)| user.contains(key))
            .map(|(_, behavior)| behavior.clone())
            .unwrap_or_else(|| Behavior::fail("unscripted request"));

        match behavior {
            Behavior::Reply { content, delay } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(LlmResponse {
                    content,
                    usage: None,
                    model: "scripted".to_string(),
                })
            }
            Behavior::Fail { message, delay } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Err(anyhow!(message))
            }
        }
    }
}
