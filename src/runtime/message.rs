//! Conversation messages and tool-call requests.

use std::sync::Arc;

/// A tool call requested by the LLM in an assistant message.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Provider-assigned call id, used to correlate the eventual tool result message.
    pub id: String,
    /// Tool name, matching one of the tools offered in the same request.
    pub name: String,
    /// Raw JSON arguments supplied by the LLM for this call.
    pub arguments: serde_json::Value,
}

/// The role a [`Message`] was authored under.
#[derive(Debug, Clone)]
pub enum Role {
    System,
    User,
    Assistant,
    /// A tool-result message correlating with a prior assistant [`ToolCall`].
    Tool { call_id: String },
}

/// A single message in a conversation history.
///
/// `content` is stored as `Arc<str>` so that histories can be cheaply cloned
/// across tool-loop iterations and by the typed object creator's retry path.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: Arc<str>,
    /// Non-empty only on assistant messages that requested tool calls.
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    pub fn system(content: impl Into<Arc<str>>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn user(content: impl Into<Arc<str>>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<Arc<str>>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant_with_tool_calls(content: impl Into<Arc<str>>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<Arc<str>>) -> Self {
        Self {
            role: Role::Tool {
                call_id: call_id.into(),
            },
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// Token accounting for a single LLM call, or a cumulative total.
///
/// Componentwise-additive: `a + b` sums present fields and treats `None` as
/// the additive identity only when both sides are `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

impl Usage {
    pub fn add(self, other: Usage) -> Usage {
        Usage {
            prompt_tokens: add_optional(self.prompt_tokens, other.prompt_tokens),
            completion_tokens: add_optional(self.completion_tokens, other.completion_tokens),
        }
    }
}

fn add_optional(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
    }
}
