//! The tool loop driver: the framework-agnostic engine that alternates
//! single LLM inferences with local tool dispatches.
//!
//! The loop itself knows nothing about a concrete LLM client — it speaks
//! only to a [`SingleLlmCaller`] and a flat `Vec<Tool>` — so that dynamic
//! tool injection and the HITL/replan control-flow signals are first-class
//! instead of bolted onto one agent implementation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::runtime::cancellation::CancellationToken;
use crate::runtime::error::RuntimeError;
use crate::runtime::events::{digest_args, EventHandler, NoopEventHandler, RuntimeEvent, ToolResultKind};
use crate::runtime::hitl::ToolLoopSignal;
use crate::runtime::llm_gateway::{GatewayError, LlmCallOptions, SingleLlmCaller};
use crate::runtime::message::{Message, Role, Usage};
use crate::runtime::tool::{Tool, ToolArtifact, ToolCallResult, ToolDispatchSignal};

/// Context handed to a [`ToolInjectionStrategy`] after each tool dispatch.
pub struct InjectionContext<'a> {
    pub history: &'a [Message],
    pub current_tools: &'a [Tool],
    pub last_tool_name: &'a str,
    pub last_tool_input: &'a serde_json::Value,
    pub last_tool_result: &'a ToolCallResult,
    pub iteration: usize,
}

/// A post-dispatch hook that may contribute new tools for the next iteration.
/// The driver ships one built-in strategy, [`ToolsInjectedStrategy`],
/// recognizing the reserved `ToolsInjected` artifact; callers may register
/// additional strategies of their own.
pub trait ToolInjectionStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn propose(&self, ctx: &InjectionContext<'_>) -> Vec<Tool>;
}

/// The built-in strategy: a tool result carrying a `ToolsInjected` artifact
/// contributes exactly those tools, regardless of which tool produced it.
pub struct ToolsInjectedStrategy;

impl ToolInjectionStrategy for ToolsInjectedStrategy {
    fn name(&self) -> &str {
        "tools-injected-artifact"
    }

    fn propose(&self, ctx: &InjectionContext<'_>) -> Vec<Tool> {
        match ctx.last_tool_result {
            ToolCallResult::WithArtifact(_, artifact) => match artifact.as_ref() {
                ToolArtifact::ToolsInjected(injected) => injected.tools.clone(),
                ToolArtifact::Opaque(_) => Vec::new(),
            },
            _ => Vec::new(),
        }
    }
}

/// Everything a tool loop invocation needs, gathered up front so the driver
/// function itself stays a straightforward loop.
pub struct ToolLoopRequest<'a> {
    pub agent_process_id: String,
    pub interaction_id: Option<String>,
    pub llm: &'a dyn SingleLlmCaller,
    pub initial_messages: Vec<Message>,
    pub initial_tools: Vec<Tool>,
    pub options: LlmCallOptions,
    pub max_iterations: usize,
    pub injection_strategies: Vec<Arc<dyn ToolInjectionStrategy>>,
    pub events: Option<Arc<dyn EventHandler>>,
    pub cancellation: Option<CancellationToken>,
    /// Per-tool-call timeout; `None` means no timeout is applied.
    pub tool_timeout: Option<Duration>,
    /// JSON-Schema hint forwarded to the gateway for structured output, used
    /// by the typed object creator; `None` for plain text generation.
    pub schema_hint: Option<serde_json::Value>,
}

/// What a successful tool loop invocation returns.
pub struct ToolLoopOutcome {
    pub final_message: Message,
    pub history: Vec<Message>,
    pub iterations: usize,
    pub injected_tools: Vec<String>,
    pub total_usage: Usage,
}

/// Every way a tool loop invocation can end other than returning
/// [`ToolLoopOutcome`]. `Signal` is a dedicated variant (rather than folding
/// `AwaitableRequested`/`ReplanRequested` into `RuntimeError`) so a caller is
/// forced to match on it explicitly and re-throw rather than silently
/// swallow it.
#[derive(Debug)]
pub enum ToolLoopFailure {
    Error(RuntimeError),
    Signal(ToolLoopSignal),
}

impl From<RuntimeError> for ToolLoopFailure {
    fn from(err: RuntimeError) -> Self {
        ToolLoopFailure::Error(err)
    }
}

fn dedup_push(tools: &mut Vec<Tool>, names: &mut HashSet<String>, new_tools: Vec<Tool>) -> Vec<String> {
    let mut added = Vec::new();
    for tool in new_tools {
        if names.insert(tool.name().to_string()) {
            added.push(tool.name().to_string());
            tools.push(tool);
        }
    }
    added
}

/// Drive the tool-calling loop to completion. The sole executor of tool
/// calls; `request.llm` is never asked to run one itself.
pub async fn run_tool_loop(request: ToolLoopRequest<'_>) -> Result<ToolLoopOutcome, ToolLoopFailure> {
    let events: Arc<dyn EventHandler> = request.events.unwrap_or_else(|| Arc::new(NoopEventHandler));
    let mut history = request.initial_messages;
    let mut available_tools = Vec::new();
    let mut known_names = HashSet::new();
    dedup_push(&mut available_tools, &mut known_names, request.initial_tools);

    let mut injected = Vec::new();
    let mut iteration = 0usize;
    let mut total_usage = Usage::default();

    let mut strategies = request.injection_strategies;
    strategies.push(Arc::new(ToolsInjectedStrategy));

    loop {
        if let Some(token) = &request.cancellation {
            if token.is_cancelled() {
                return Err(ToolLoopFailure::Error(RuntimeError::MaxIterationsExceeded {
                    max: request.max_iterations,
                }));
            }
        }

        if iteration >= request.max_iterations {
            return Err(ToolLoopFailure::Error(RuntimeError::MaxIterationsExceeded {
                max: request.max_iterations,
            }));
        }

        let tool_definitions: Vec<_> = available_tools.iter().map(|t| t.definition().clone()).collect();

        events
            .on_event(&RuntimeEvent::LlmRequest {
                agent_process_id: request.agent_process_id.clone(),
                interaction_id: request.interaction_id.clone(),
                model_name: request.llm.model_name().to_string(),
                prompt_tokens_estimate: None,
            })
            .await;

        let call_started = Instant::now();
        let response = request
            .llm
            .call(
                &history,
                Some(tool_definitions),
                &request.options,
                request.schema_hint.as_ref(),
            )
            .await
            .map_err(|err| match err {
                GatewayError::LlmCallFailed { reason, retriable } => {
                    ToolLoopFailure::Error(RuntimeError::LlmCallFailed { reason, retriable })
                }
                GatewayError::InvalidLlmReturnFormat { reason } => {
                    ToolLoopFailure::Error(RuntimeError::InvalidLlmReturnFormat { reason })
                }
            })?;

        events
            .on_event(&RuntimeEvent::LlmResponse {
                agent_process_id: request.agent_process_id.clone(),
                interaction_id: request.interaction_id.clone(),
                model_name: request.llm.model_name().to_string(),
                usage: response.usage,
                duration_ms: call_started.elapsed().as_millis() as u64,
            })
            .await;

        if let Some(usage) = response.usage {
            total_usage = total_usage.add(usage);
        }

        iteration += 1;
        let assistant = response.assistant;
        history.push(assistant.clone());

        if assistant.tool_calls.is_empty() {
            return Ok(ToolLoopOutcome {
                final_message: assistant,
                history,
                iterations: iteration,
                injected_tools: injected,
                total_usage,
            });
        }

        for call in &assistant.tool_calls {
            let tool = available_tools
                .iter()
                .find(|t| t.name() == call.name)
                .cloned()
                .ok_or_else(|| {
                    ToolLoopFailure::Error(RuntimeError::ToolNotFound {
                        name: call.name.clone(),
                        known: available_tools.iter().map(|t| t.name().to_string()).collect(),
                    })
                })?;

            let dispatch = match request.tool_timeout {
                Some(timeout) => match tokio::time::timeout(timeout, tool.call(call.arguments.clone())).await {
                    Ok(result) => result,
                    Err(_) => Ok(ToolCallResult::Error("timeout".to_string())),
                },
                None => tool.call(call.arguments.clone()).await,
            };

            let result = match dispatch {
                Ok(result) => result,
                Err(ToolDispatchSignal::Awaitable(awaitable)) => {
                    log::debug!("tool '{}' bound an awaitable ({})", call.name, awaitable.id);
                    events
                        .on_event(&RuntimeEvent::AwaitableBound {
                            awaitable_id: awaitable.id.clone(),
                        })
                        .await;
                    return Err(ToolLoopFailure::Signal(ToolLoopSignal::AwaitableRequested(awaitable)));
                }
                Err(ToolDispatchSignal::Replan(replan)) => {
                    log::debug!("tool '{}' requested a replan: {}", call.name, replan.reason);
                    events
                        .on_event(&RuntimeEvent::ReplanRequested {
                            reason: replan.reason.clone(),
                        })
                        .await;
                    return Err(ToolLoopFailure::Signal(ToolLoopSignal::ReplanRequested(replan)));
                }
                Err(ToolDispatchSignal::Fatal(err)) => {
                    return Err(ToolLoopFailure::Error(RuntimeError::InvalidLlmReturnFormat {
                        reason: format!("tool '{}' failed fatally: {}", call.name, err),
                    }))
                }
            };

            let result_kind = match &result {
                ToolCallResult::Text(_) => ToolResultKind::Text,
                ToolCallResult::WithArtifact(_, _) => ToolResultKind::WithArtifact,
                ToolCallResult::Error(_) => ToolResultKind::Error,
            };
            events
                .on_event(&RuntimeEvent::ToolCall {
                    tool_name: call.name.clone(),
                    args_digest: digest_args(&call.arguments),
                    result_kind,
                })
                .await;

            let result_text = match &result {
                ToolCallResult::Text(text) => text.clone(),
                ToolCallResult::WithArtifact(text, _) => text.clone(),
                ToolCallResult::Error(message) => message.clone(),
            };

            for strategy in &strategies {
                let ctx = InjectionContext {
                    history: &history,
                    current_tools: &available_tools,
                    last_tool_name: &call.name,
                    last_tool_input: &call.arguments,
                    last_tool_result: &result,
                    iteration,
                };
                let proposed = strategy.propose(&ctx);
                if !proposed.is_empty() {
                    let added = dedup_push(&mut available_tools, &mut known_names, proposed);
                    if !added.is_empty() {
                        events
                            .on_event(&RuntimeEvent::ToolsInjected {
                                strategy: strategy.name().to_string(),
                                new_tools: added.clone(),
                            })
                            .await;
                        injected.extend(added);
                    }
                }
            }

            history.push(Message {
                role: Role::Tool {
                    call_id: call.id.clone(),
                },
                content: result_text.into(),
                tool_calls: Vec::new(),
            });
        }
    }
}
