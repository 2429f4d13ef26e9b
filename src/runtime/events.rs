//! Structured observability events and the handler that consumes them.
//!
//! Adapted from `cloudllm::event`'s `AgentEvent`/`EventHandler` pattern,
//! narrowed to the six events the tool loop driver and HITL/replan
//! machinery actually emit.

use async_trait::async_trait;

use crate::runtime::message::Usage;

/// One of the six events the tool loop driver and HITL/replan machinery emit.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    LlmRequest {
        agent_process_id: String,
        interaction_id: Option<String>,
        model_name: String,
        prompt_tokens_estimate: Option<u64>,
    },
    LlmResponse {
        agent_process_id: String,
        interaction_id: Option<String>,
        model_name: String,
        usage: Option<Usage>,
        duration_ms: u64,
    },
    ToolCall {
        tool_name: String,
        /// A short, non-reversible digest of the call arguments — the full
        /// arguments are not carried onto the event bus.
        args_digest: String,
        result_kind: ToolResultKind,
    },
    ToolsInjected {
        strategy: String,
        new_tools: Vec<String>,
    },
    AwaitableBound {
        awaitable_id: String,
    },
    ReplanRequested {
        reason: String,
    },
}

/// The shape of a tool's outcome, as surfaced on [`RuntimeEvent::ToolCall`]
/// without carrying the (potentially large) result payload itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolResultKind {
    Text,
    WithArtifact,
    Error,
}

/// Consumer of [`RuntimeEvent`]s. Every method defaults to a no-op so callers
/// only override what they care about, matching `cloudllm::event`'s
/// `EventHandler` trait.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_event(&self, _event: &RuntimeEvent) {}
}

/// An [`EventHandler`] that drops every event; the default when a caller
/// does not care about observability.
pub struct NoopEventHandler;

#[async_trait]
impl EventHandler for NoopEventHandler {
    async fn on_event(&self, _event: &RuntimeEvent) {}
}

/// A short, stable digest of a tool call's JSON arguments for logging and
/// `ToolCallEvent::args_digest`, without echoing potentially sensitive or
/// oversized argument payloads verbatim onto the event bus.
pub fn digest_args(value: &serde_json::Value) -> String {
    let rendered = value.to_string();
    if rendered.len() <= 64 {
        rendered
    } else {
        format!("{}...({} bytes)", &rendered[..64], rendered.len())
    }
}
