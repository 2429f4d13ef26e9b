//! The LLM Gateway abstraction: `SingleLlmCaller`.
//!
//! Adapted from `cloudllm::client_wrapper::ClientWrapper`'s
//! `async fn send_message(&self, messages: &[Message], tools: Option<Vec<ToolDefinition>>)
//! -> Result<Message, Box<dyn Error>>`, with an explicit `options` parameter
//! and a structured-output schema hint, and narrows the return type to a
//! `GatewayError` that distinguishes retriable provider failures from
//! malformed output — the driver needs that distinction to decide whether an
//! action retry applies.

use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use tokio::sync::Mutex;

use crate::runtime::message::{Message, Usage};
use crate::runtime::tool::ToolDefinition;

/// How to resolve a model identifier for a given call.
#[derive(Debug, Clone)]
pub enum ModelSelectionCriteria {
    ByName(String),
    ByRole(String),
    /// First reachable model in the list wins.
    FallbackByName(Vec<String>),
    /// Provider-level automatic selection.
    Auto,
    /// The platform default configured in `RuntimeConfig::default_model`.
    Default,
}

/// Per-call hyperparameters passed to the gateway.
#[derive(Debug, Clone, Default)]
pub struct LlmCallOptions {
    pub model: Option<ModelSelectionCriteria>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Capability probe result cached from a prior `supports_thinking()`
    /// check; `None` means "use the provider default."
    pub thinking_enabled: Option<bool>,
}

/// The assistant message plus any usage the provider reported.
#[derive(Debug, Clone)]
pub struct LlmCallResponse {
    pub assistant: Message,
    pub usage: Option<Usage>,
}

/// Failure modes specific to the gateway boundary. `retriable` on
/// `LlmCallFailed` mirrors the provider's own signal (e.g. HTTP 429/5xx vs
/// 4xx) and feeds directly into the action retry policy.
#[derive(Debug)]
pub enum GatewayError {
    LlmCallFailed {
        reason: String,
        retriable: bool,
    },
    InvalidLlmReturnFormat {
        reason: String,
    },
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::LlmCallFailed { reason, retriable } => {
                write!(f, "LLM call failed ({}): {}", if *retriable { "retriable" } else { "permanent" }, reason)
            }
            GatewayError::InvalidLlmReturnFormat { reason } => write!(f, "invalid LLM return format: {}", reason),
        }
    }
}

impl Error for GatewayError {}

/// A single, non-tool-executing LLM inference. Implementations translate
/// `messages`/`tools` into the provider wire format and must never dispatch
/// a tool themselves — that is the driver's sole responsibility.
#[async_trait]
pub trait SingleLlmCaller: Send + Sync {
    /// Execute exactly one inference. `schema_hint`, when present, is a
    /// JSON-Schema document the provider should be steered toward producing
    /// (structured output) by whatever mechanism it supports; providers
    /// without structured-output support may ignore it and rely on
    /// schema-in-prompt instead.
    async fn call(
        &self,
        messages: &[Message],
        tools: Option<Vec<ToolDefinition>>,
        options: &LlmCallOptions,
        schema_hint: Option<&serde_json::Value>,
    ) -> Result<LlmCallResponse, GatewayError>;

    /// The model identifier this caller is currently bound to.
    fn model_name(&self) -> &str;

    /// Usage captured from the most recent call, if the provider reports it.
    async fn get_last_usage(&self) -> Option<Usage> {
        if let Some(slot) = self.usage_slot() {
            *slot.lock().await
        } else {
            None
        }
    }

    /// Implementations that track usage should expose a slot here so the
    /// default `get_last_usage` can surface it.
    fn usage_slot(&self) -> Option<&Mutex<Option<Usage>>> {
        None
    }

    /// Capability probe, not wired into the tool loop (streaming is a
    /// non-goal, so `supports_streaming` is not even declared — only this
    /// probe remains, defaulting to `false`).
    fn supports_thinking(&self) -> bool {
        false
    }
}
