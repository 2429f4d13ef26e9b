//! The flat tool contract: `Tool = {Definition, call(inputJson) -> Result}`.
//!
//! Nothing here needs a tool to be backed by more than one provider at a
//! time, so there is no separate protocol-routing layer — a tool's
//! execution collapses into a single `async fn call` on the tool itself.

use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::runtime::hitl::{Awaitable, ReplanRequested};
use crate::runtime::schema::InputSchema;

/// Stable metadata describing a tool's name, purpose, and input shape.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: InputSchema) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Validate the declared name against the tool-name character set
    /// (`[a-zA-Z0-9_]+`); registration rejects a bad name rather than
    /// silently sanitizing it.
    pub fn validate_name(&self) -> Result<(), crate::runtime::error::RuntimeError> {
        let valid = !self.name.is_empty()
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid {
            Ok(())
        } else {
            Err(crate::runtime::error::RuntimeError::InvalidToolName {
                name: self.name.clone(),
            })
        }
    }
}

/// A reserved artifact kind recognized by the driver's built-in injection
/// strategy: an explicit signal rather than reflection over returned
/// objects.
#[derive(Debug, Clone)]
pub struct ToolsInjected {
    pub tools: Vec<Tool>,
}

/// The outcome of a single tool invocation.
#[derive(Debug, Clone)]
pub enum ToolCallResult {
    /// Plain text result fed back to the LLM as the tool-result message content.
    Text(String),
    /// Text plus an opaque artifact retained in-process for downstream actions.
    /// A `ToolsInjected` artifact is special-cased by the driver's default
    /// injection strategy.
    WithArtifact(String, Arc<ToolArtifact>),
    /// An application-level failure, reported back to the LLM as-is so it can
    /// adjust its next tool call.
    Error(String),
}

/// Type-erased artifact payload. `ToolsInjected` is the one variant the
/// driver itself understands; anything else is opaque and only meaningful to
/// the caller that inspects it after the loop returns.
#[derive(Debug, Clone)]
pub enum ToolArtifact {
    ToolsInjected(ToolsInjected),
    Opaque(serde_json::Value),
}

/// Signals a tool dispatch may raise instead of returning a plain
/// [`ToolCallResult`]. `Awaitable` and `Replan` are control flow and must
/// never be treated as a generic [`ToolCallResult::Error`] — the `match`
/// the driver performs on this enum is what makes that structural rather
/// than a matter of discipline.
pub enum ToolDispatchSignal {
    Awaitable(Awaitable),
    Replan(ReplanRequested),
    Fatal(Box<dyn Error + Send + Sync>),
}

impl fmt::Debug for ToolDispatchSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolDispatchSignal::Awaitable(a) => f.debug_tuple("Awaitable").field(a).finish(),
            ToolDispatchSignal::Replan(r) => f.debug_tuple("Replan").field(r).finish(),
            ToolDispatchSignal::Fatal(e) => write!(f, "Fatal({})", e),
        }
    }
}

/// A callable capability exposed to the LLM. It owns its execution
/// directly: there is no separate protocol to look up by name.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, input: serde_json::Value) -> Result<ToolCallResult, ToolDispatchSignal>;
}

/// A named, schema-described tool bound to its handler.
#[derive(Clone)]
pub struct Tool {
    definition: Arc<ToolDefinition>,
    handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool").field("definition", &self.definition).finish()
    }
}

impl Tool {
    pub fn new(definition: ToolDefinition, handler: Arc<dyn ToolHandler>) -> Self {
        Self {
            definition: Arc::new(definition),
            handler,
        }
    }

    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub async fn call(&self, input: serde_json::Value) -> Result<ToolCallResult, ToolDispatchSignal> {
        self.handler.call(input).await
    }

    /// Rebind this tool under a new name, keeping its description, schema,
    /// and handler. Used by `PromptRunner::resolve_tools` to apply a
    /// reference's naming strategy (identity, prefix, or custom transform)
    /// without re-implementing the handler.
    pub fn renamed(self, new_name: impl Into<String>) -> Self {
        let mut definition = (*self.definition).clone();
        definition.name = new_name.into();
        Self {
            definition: Arc::new(definition),
            handler: self.handler,
        }
    }
}

/// Adapter that wraps a plain closure as a [`ToolHandler`], for tools that
/// don't need their own struct.
pub struct FnToolHandler<F>(pub F);

#[async_trait]
impl<F> ToolHandler for FnToolHandler<F>
where
    F: Fn(serde_json::Value) -> Result<ToolCallResult, ToolDispatchSignal> + Send + Sync,
{
    async fn call(&self, input: serde_json::Value) -> Result<ToolCallResult, ToolDispatchSignal> {
        (self.0)(input)
    }
}
