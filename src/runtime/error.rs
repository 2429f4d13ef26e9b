//! Error taxonomy for the agent execution runtime.
//!
//! Every outcome that is a genuine *failure* (as opposed to the control-flow
//! signals in [`crate::runtime::hitl`]) is a variant of [`RuntimeError`]:
//! input-shape, value-validity, tool-resolution, budget, and provider
//! errors. Tool-execution errors are not part of this enum — they are fed
//! back to the LLM as a [`crate::runtime::tool::ToolCallResult::Error`]
//! and only escalate to a `RuntimeError` if a tool is marked fatal-on-error.

use std::error::Error;
use std::fmt;

/// Failures surfaced by the tool loop driver, the typed object creator, or the
/// LLM gateway. Control-flow signals (`AwaitableRequested`, `ReplanRequested`)
/// are deliberately not variants here; see [`crate::runtime::hitl::ToolLoopSignal`].
#[derive(Debug, Clone)]
pub enum RuntimeError {
    /// The LLM requested a tool name absent from the currently available set.
    ToolNotFound { name: String, known: Vec<String> },
    /// The tool loop exhausted its iteration budget without a final response.
    MaxIterationsExceeded { max: usize },
    /// The terminal assistant message could not be parsed as the requested type.
    InvalidLlmReturnFormat { reason: String },
    /// The parsed object failed its own validation.
    InvalidLlmReturnType { reason: String },
    /// The LLM gateway call failed; `retriable` mirrors the provider's own signal.
    LlmCallFailed {
        reason: String,
        retriable: bool,
    },
    /// A tool name failed registration-time validation; tool names must
    /// match `[a-zA-Z0-9_]+`.
    InvalidToolName { name: String },
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::ToolNotFound { name, known } => write!(
                f,
                "tool not found: {} (known tools: {})",
                name,
                known.join(", ")
            ),
            RuntimeError::MaxIterationsExceeded { max } => {
                write!(f, "tool loop exceeded max iterations ({})", max)
            }
            RuntimeError::InvalidLlmReturnFormat { reason } => {
                write!(f, "invalid LLM return format: {}", reason)
            }
            RuntimeError::InvalidLlmReturnType { reason } => {
                write!(f, "invalid LLM return type: {}", reason)
            }
            RuntimeError::LlmCallFailed { reason, retriable } => write!(
                f,
                "LLM call failed ({}): {}",
                if *retriable { "retriable" } else { "permanent" },
                reason
            ),
            RuntimeError::InvalidToolName { name } => {
                write!(f, "invalid tool name: {:?} (must match [a-zA-Z0-9_]+)", name)
            }
        }
    }
}

impl Error for RuntimeError {}
