//! Progressive tool visibility: `UnfoldingTool` and `StateMachineTool`.
//!
//! Both are themselves `Tool`s — façades that, when invoked, reveal other
//! tools rather than doing application work directly.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::runtime::schema::{InputSchema, Parameter, ParameterType};
use crate::runtime::tool::{Tool, ToolArtifact, ToolCallResult, ToolDispatchSignal, ToolHandler, ToolsInjected};

/// How an [`UnfoldingTool`] decides which inner tools to reveal on invocation.
pub enum UnfoldingMode {
    /// Reveal every inner tool regardless of input.
    AllReveal,
    /// Reveal a subset chosen by a selector function over the call's JSON input.
    Selector(Box<dyn Fn(&serde_json::Value, &[Tool]) -> Vec<Tool> + Send + Sync>),
    /// Reveal tools whose declared category (an inner metadata tag) matches a
    /// single required `category` string parameter, whose enum lists the
    /// known categories.
    ByCategory(HashMap<String, Vec<Tool>>),
}

/// A façade tool carrying a fixed inner set, exposed to the LLM as one
/// callable tool that "unfolds" into several.
pub struct UnfoldingTool {
    definition_name: String,
    definition_description: String,
    inner_tools: Vec<Tool>,
    mode: UnfoldingMode,
    /// If true (the default), the façade is removed from `availableTools`
    /// once its children appear, so the LLM is not re-offered it. If false,
    /// the façade remains callable (useful for `ByCategory` re-invocation
    /// with a different category).
    pub remove_on_invoke: bool,
    child_tool_usage_notes: Option<String>,
}

impl UnfoldingTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, inner_tools: Vec<Tool>, mode: UnfoldingMode) -> Self {
        Self {
            definition_name: name.into(),
            definition_description: description.into(),
            inner_tools,
            mode,
            remove_on_invoke: true,
            child_tool_usage_notes: None,
        }
    }

    pub fn with_remove_on_invoke(mut self, remove_on_invoke: bool) -> Self {
        self.remove_on_invoke = remove_on_invoke;
        self
    }

    pub fn with_child_tool_usage_notes(mut self, notes: impl Into<String>) -> Self {
        self.child_tool_usage_notes = Some(notes.into());
        self
    }

    fn select(&self, input: &serde_json::Value) -> Vec<Tool> {
        match &self.mode {
            UnfoldingMode::AllReveal => self.inner_tools.clone(),
            UnfoldingMode::Selector(select_fn) => select_fn(input, &self.inner_tools),
            UnfoldingMode::ByCategory(categories) => input
                .get("category")
                .and_then(|v| v.as_str())
                .and_then(|cat| categories.get(cat))
                .cloned()
                .unwrap_or_default(),
        }
    }

    fn input_schema(&self) -> InputSchema {
        match &self.mode {
            UnfoldingMode::AllReveal | UnfoldingMode::Selector(_) => InputSchema::new(),
            UnfoldingMode::ByCategory(categories) => InputSchema::new().with_parameter(
                Parameter::new("category", ParameterType::String)
                    .required()
                    .with_enum_values(categories.keys().cloned().collect()),
            ),
        }
    }

    /// Build the `Tool` the driver will register. Invocation returns a
    /// `ToolCallResult::WithArtifact` carrying a reserved `ToolsInjected`
    /// artifact; the driver's default injection strategy recognizes it and
    /// publishes the revealed tools into `available_tools` for the next
    /// iteration.
    pub fn into_tool(self) -> Tool {
        let definition = crate::runtime::tool::ToolDefinition::new(
            self.definition_name.clone(),
            self.definition_description.clone(),
            self.input_schema(),
        );
        let facade = Arc::new(self);
        Tool::new(definition, facade)
    }
}

#[async_trait]
impl ToolHandler for UnfoldingTool {
    async fn call(&self, input: serde_json::Value) -> Result<ToolCallResult, ToolDispatchSignal> {
        let revealed = self.select(&input);
        let names: Vec<&str> = revealed.iter().map(|t| t.name()).collect();
        let mut message = format!("Enabled {} tools: {}", revealed.len(), names.join(", "));
        if let Some(notes) = &self.child_tool_usage_notes {
            message.push_str("\n");
            message.push_str(notes);
        }
        Ok(ToolCallResult::WithArtifact(
            message,
            Arc::new(ToolArtifact::ToolsInjected(ToolsInjected { tools: revealed })),
        ))
    }
}

/// A tool registered with a [`StateMachineTool`]: the states it is callable
/// in, and the state it transitions to on success (if any).
pub struct StateScopedTool {
    pub tool: Tool,
    pub available_in: Vec<String>,
    pub transition_on_success: Option<String>,
}

/// Tracks the current state for one `StateMachineTool` invocation. Kept
/// separate from the façade definition itself so the same façade
/// configuration can be reused across invocations with independent state.
pub struct StateHolder {
    state: Mutex<String>,
}

impl StateHolder {
    pub fn new(initial_state: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(initial_state.into()),
        })
    }

    pub fn current(&self) -> String {
        self.state.lock().expect("state mutex poisoned").clone()
    }

    fn transition_to(&self, new_state: &str) {
        *self.state.lock().expect("state mutex poisoned") = new_state.to_string();
    }
}

/// A façade whose available inner tools depend on a finite named state, with
/// optional per-tool transitions on successful execution. Tools outside the
/// current state return a structured error and do not transition.
pub struct StateMachineTool {
    state_holder: Arc<StateHolder>,
    scoped_tools: HashMap<String, StateScopedTool>,
    global_tool_names: Vec<String>,
}

impl StateMachineTool {
    pub fn new(state_holder: Arc<StateHolder>) -> Self {
        Self {
            state_holder,
            scoped_tools: HashMap::new(),
            global_tool_names: Vec::new(),
        }
    }

    pub fn with_state_scoped_tool(mut self, scoped: StateScopedTool) -> Self {
        self.scoped_tools.insert(scoped.tool.name().to_string(), scoped);
        self
    }

    pub fn with_global_tool(mut self, name: impl Into<String>) -> Self {
        self.global_tool_names.push(name.into());
        self
    }

    fn is_available(&self, name: &str, state: &str) -> bool {
        if self.global_tool_names.iter().any(|n| n == name) {
            return true;
        }
        self.scoped_tools
            .get(name)
            .map(|t| t.available_in.iter().any(|s| s == state))
            .unwrap_or(false)
    }

    /// Dispatch a call to one of the state-scoped tools by name, enforcing
    /// the state invariant before delegating.
    pub async fn dispatch(&self, tool_name: &str, input: serde_json::Value) -> Result<ToolCallResult, ToolDispatchSignal> {
        let current = self.state_holder.current();
        if !self.is_available(tool_name, &current) {
            let available: Vec<&str> = self
                .scoped_tools
                .values()
                .filter(|t| t.available_in.iter().any(|s| s == &current))
                .map(|t| t.tool.name())
                .collect();
            return Ok(ToolCallResult::Error(format!(
                "tool '{}' not available in state '{}'; available: {}",
                tool_name,
                current,
                available.join(", ")
            )));
        }

        let scoped = self.scoped_tools.get(tool_name);
        let result = match scoped {
            Some(scoped) => scoped.tool.call(input).await?,
            None => {
                // Global tool: caller is responsible for resolving it; this
                // façade only enforces state-scoped availability.
                return Ok(ToolCallResult::Error(format!(
                    "tool '{}' is global and must be dispatched directly",
                    tool_name
                )));
            }
        };

        if let (Some(scoped), ToolCallResult::Text(_) | ToolCallResult::WithArtifact(_, _)) = (scoped, &result) {
            if let Some(next_state) = &scoped.transition_on_success {
                self.state_holder.transition_to(next_state);
            }
        }
        Ok(result)
    }

    /// Augment an inner tool's advertised description with its available
    /// states and transition, as the LLM-facing text should reflect.
    pub fn describe(&self, tool_name: &str) -> Option<String> {
        let scoped = self.scoped_tools.get(tool_name)?;
        let mut description = format!(
            "{} (Available in: {})",
            scoped.tool.definition().description,
            scoped.available_in.join(", ")
        );
        if let Some(next) = &scoped.transition_on_success {
            description.push_str(&format!(" (Transitions to: {})", next));
        }
        Some(description)
    }

    /// Build one registrable [`Tool`] per state-scoped tool name, each routed
    /// back through [`StateMachineTool::dispatch`] so the state check applies
    /// no matter which tool the driver's flat `available_tools` list invokes —
    /// a caller is no longer required to hold the facade directly to get the
    /// state invariant enforced.
    pub fn into_tools(self) -> Vec<Tool> {
        let machine = Arc::new(self);
        machine
            .scoped_tools
            .keys()
            .cloned()
            .map(|name| {
                let mut definition = machine.scoped_tools[&name].tool.definition().clone();
                if let Some(description) = machine.describe(&name) {
                    definition.description = description;
                }
                Tool::new(
                    definition,
                    Arc::new(StateScopedToolHandler {
                        machine: machine.clone(),
                        tool_name: name,
                    }),
                )
            })
            .collect()
    }
}

/// Routes a single scoped tool name back through its owning
/// [`StateMachineTool::dispatch`].
struct StateScopedToolHandler {
    machine: Arc<StateMachineTool>,
    tool_name: String,
}

#[async_trait]
impl ToolHandler for StateScopedToolHandler {
    async fn call(&self, input: serde_json::Value) -> Result<ToolCallResult, ToolDispatchSignal> {
        self.machine.dispatch(&self.tool_name, input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::schema::InputSchema;
    use crate::runtime::tool::{FnToolHandler, ToolDefinition};

    fn dummy_tool(name: &str) -> Tool {
        Tool::new(
            ToolDefinition::new(name, "dummy", InputSchema::new()),
            Arc::new(FnToolHandler(|_| Ok(ToolCallResult::Text("ok".to_string())))),
        )
    }

    #[tokio::test]
    async fn unfolding_all_reveal_returns_every_inner_tool() {
        let facade = UnfoldingTool::new(
            "db_ops",
            "database operations",
            vec![dummy_tool("db_query"), dummy_tool("db_insert")],
            UnfoldingMode::AllReveal,
        );
        let result = facade.call(serde_json::json!({})).await.unwrap();
        match result {
            ToolCallResult::WithArtifact(text, artifact) => {
                assert!(text.contains("db_query"));
                assert!(text.contains("db_insert"));
                match artifact.as_ref() {
                    ToolArtifact::ToolsInjected(injected) => assert_eq!(injected.tools.len(), 2),
                    _ => panic!("expected ToolsInjected artifact"),
                }
            }
            _ => panic!("expected WithArtifact result"),
        }
    }

    #[tokio::test]
    async fn state_machine_rejects_tool_outside_its_state() {
        let holder = StateHolder::new("DRAFT");
        let machine = StateMachineTool::new(holder.clone()).with_state_scoped_tool(StateScopedTool {
            tool: dummy_tool("ship"),
            available_in: vec!["CONFIRMED".to_string()],
            transition_on_success: None,
        });

        let result = machine.dispatch("ship", serde_json::json!({})).await.unwrap();
        match result {
            ToolCallResult::Error(msg) => assert!(msg.contains("DRAFT")),
            _ => panic!("expected a structured error"),
        }
        assert_eq!(holder.current(), "DRAFT");
    }

    #[tokio::test]
    async fn state_machine_transitions_on_success() {
        let holder = StateHolder::new("DRAFT");
        let machine = StateMachineTool::new(holder.clone()).with_state_scoped_tool(StateScopedTool {
            tool: dummy_tool("confirm"),
            available_in: vec!["DRAFT".to_string()],
            transition_on_success: Some("CONFIRMED".to_string()),
        });

        machine.dispatch("confirm", serde_json::json!({})).await.unwrap();
        assert_eq!(holder.current(), "CONFIRMED");
    }
}
