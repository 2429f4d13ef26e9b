//! The Typed Object Creator: turns an LLM text response into a
//! strongly-typed object with schema-guided prompting, examples, a
//! property-filter predicate chain, and bounded malformed-JSON retry.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::runtime::driver::{run_tool_loop, ToolLoopFailure, ToolLoopRequest};
use crate::runtime::error::RuntimeError;
use crate::runtime::events::EventHandler;
use crate::runtime::hitl::ToolLoopSignal;
use crate::runtime::llm_gateway::{LlmCallOptions, SingleLlmCaller};
use crate::runtime::message::Message;
use crate::runtime::tool::Tool;

/// Bean-validation-style checks, rendered as a trait the target type may
/// optionally implement. The default is a no-op, which is the Rust-native
/// equivalent of "types that don't implement it skip validation" — there is
/// no way to conditionally require a trait bound only for types that opt
/// in, so instead every type implements it, and most inherit the no-op.
pub trait Validate {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Blanket no-op so a plain `#[derive(Deserialize)]` struct compiles against
/// `create_object` without writing an explicit `impl Validate`.
impl<T> Validate for T where T: DeserializeOwned {}

/// A predicate chain over a JSON-Schema `object`'s property names. Multiple
/// predicates registered via `with_properties`/`without_properties`/
/// `with_predicate` compose by conjunction, in registration order.
#[derive(Clone, Default)]
pub struct PropertyFilter {
    predicates: Vec<Arc<dyn Fn(&str) -> bool + Send + Sync>>,
}

impl PropertyFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to exactly the named properties (and whatever later
    /// predicates further narrow).
    pub fn with_properties(mut self, names: Vec<String>) -> Self {
        self.predicates.push(Arc::new(move |name: &str| names.iter().any(|n| n == name)));
        self
    }

    /// Exclude the named properties.
    pub fn without_properties(mut self, names: Vec<String>) -> Self {
        self.predicates.push(Arc::new(move |name: &str| !names.iter().any(|n| n == name)));
        self
    }

    pub fn with_predicate(mut self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.predicates.push(Arc::new(predicate));
        self
    }

    fn keep(&self, name: &str) -> bool {
        self.predicates.iter().all(|p| p(name))
    }

    /// Apply the filter in place to a `{"type":"object","properties":{...},"required":[...]}`
    /// schema, dropping filtered-out properties from both maps.
    pub fn apply(&self, schema: &mut serde_json::Value) {
        if self.predicates.is_empty() {
            return;
        }
        if let Some(properties) = schema.get_mut("properties").and_then(|v| v.as_object_mut()) {
            let dropped: Vec<String> = properties
                .keys()
                .filter(|name| !self.keep(name))
                .cloned()
                .collect();
            for name in &dropped {
                properties.remove(name);
            }
            if let Some(required) = schema.get_mut("required").and_then(|v| v.as_array_mut()) {
                required.retain(|v| v.as_str().map(|s| !dropped.iter().any(|d| d == s)).unwrap_or(true));
            }
        }
    }
}

/// Everything the typed object creator needs for one `create_object` call.
pub struct ObjectCreationRequest<'a> {
    pub agent_process_id: String,
    pub interaction_id: Option<String>,
    pub llm: &'a dyn SingleLlmCaller,
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
    pub options: LlmCallOptions,
    pub max_iterations: usize,
    pub events: Option<Arc<dyn EventHandler>>,
    /// The JSON-Schema for the target type, typically produced by
    /// [`crate::runtime::schema::DomainType::to_json_schema`].
    pub schema: serde_json::Value,
    pub property_filter: Option<PropertyFilter>,
    /// Explicit examples always override `generate_examples`.
    pub examples: Vec<serde_json::Value>,
    pub generate_examples: bool,
    /// Bounded retry count for malformed JSON (default 2).
    pub retry_attempts: u32,
}

/// Every way `create_object` can fail to produce `T`.
#[derive(Debug)]
pub enum TypedObjectFailure {
    Error(RuntimeError),
    Signal(ToolLoopSignal),
}

impl From<RuntimeError> for TypedObjectFailure {
    fn from(err: RuntimeError) -> Self {
        TypedObjectFailure::Error(err)
    }
}

fn schema_instruction(schema: &serde_json::Value, examples: &[serde_json::Value]) -> String {
    let mut text = format!(
        "Respond with a single JSON object conforming exactly to this JSON Schema:\n{}",
        serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string())
    );
    if !examples.is_empty() {
        text.push_str("\n\nExamples of valid responses:\n");
        for example in examples {
            text.push_str(&serde_json::to_string(example).unwrap_or_else(|_| example.to_string()));
            text.push('\n');
        }
    }
    text
}

/// Drive the tool loop, then parse the terminal assistant message as `T`,
/// retrying on malformed JSON up to `request.retry_attempts` times and
/// failing immediately (no retry) if `T::validate` rejects a well-formed
/// parse.
pub async fn create_object<T>(request: ObjectCreationRequest<'_>) -> Result<T, TypedObjectFailure>
where
    T: DeserializeOwned + Validate,
{
    let mut schema = request.schema.clone();
    if let Some(filter) = &request.property_filter {
        filter.apply(&mut schema);
    }

    let examples = if !request.examples.is_empty() {
        request.examples.clone()
    } else {
        Vec::new()
    };

    let mut messages = request.messages.clone();
    let mut instruction = schema_instruction(&schema, &examples);
    if request.generate_examples && examples.is_empty() {
        instruction.push_str("\n\nThink through a realistic example internally before answering, but respond with only the final JSON object.");
    }
    messages.push(Message::system(instruction));

    let mut attempt = 0u32;
    loop {
        let outcome = run_tool_loop(ToolLoopRequest {
            agent_process_id: request.agent_process_id.clone(),
            interaction_id: request.interaction_id.clone(),
            llm: request.llm,
            initial_messages: messages.clone(),
            initial_tools: request.tools.clone(),
            options: request.options.clone(),
            max_iterations: request.max_iterations,
            injection_strategies: Vec::new(),
            events: request.events.clone(),
            cancellation: None,
            tool_timeout: None,
            schema_hint: Some(schema.clone()),
        })
        .await
        .map_err(|failure| match failure {
            ToolLoopFailure::Error(err) => TypedObjectFailure::Error(err),
            ToolLoopFailure::Signal(signal) => TypedObjectFailure::Signal(signal),
        })?;

        match serde_json::from_str::<T>(&outcome.final_message.content) {
            Ok(parsed) => {
                if let Err(reason) = parsed.validate() {
                    return Err(TypedObjectFailure::Error(RuntimeError::InvalidLlmReturnType { reason }));
                }
                return Ok(parsed);
            }
            Err(parse_err) => {
                if attempt >= request.retry_attempts {
                    return Err(TypedObjectFailure::Error(RuntimeError::InvalidLlmReturnFormat {
                        reason: parse_err.to_string(),
                    }));
                }
                attempt += 1;
                messages.push(outcome.final_message.clone());
                messages.push(Message::user(format!(
                    "Your previous response was not valid JSON for the schema {}; please retry.",
                    schema
                )));
            }
        }
    }
}

/// The `T = string` special case: bypasses JSON parsing entirely and
/// returns the terminal assistant message verbatim.
pub async fn generate_text(
    agent_process_id: String,
    interaction_id: Option<String>,
    llm: &dyn SingleLlmCaller,
    messages: Vec<Message>,
    tools: Vec<Tool>,
    options: LlmCallOptions,
    max_iterations: usize,
    events: Option<Arc<dyn EventHandler>>,
) -> Result<String, TypedObjectFailure> {
    let outcome = run_tool_loop(ToolLoopRequest {
        agent_process_id,
        interaction_id,
        llm,
        initial_messages: messages,
        initial_tools: tools,
        options,
        max_iterations,
        injection_strategies: Vec::new(),
        events,
        cancellation: None,
        tool_timeout: None,
        schema_hint: None,
    })
    .await
    .map_err(|failure| match failure {
        ToolLoopFailure::Error(err) => TypedObjectFailure::Error(err),
        ToolLoopFailure::Signal(signal) => TypedObjectFailure::Signal(signal),
    })?;
    Ok(outcome.final_message.content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_filter_composes_by_conjunction() {
        let mut schema = serde_json::json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "internal_id": {"type": "string"},
                "age": {"type": "integer"},
            },
            "required": ["name", "internal_id"],
        });
        let filter = PropertyFilter::new()
            .without_properties(vec!["internal_id".to_string()])
            .with_predicate(|name| name != "age");
        filter.apply(&mut schema);

        let properties = schema["properties"].as_object().unwrap();
        assert!(properties.contains_key("name"));
        assert!(!properties.contains_key("internal_id"));
        assert!(!properties.contains_key("age"));
        let required: Vec<&str> = schema["required"].as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();
        assert_eq!(required, vec!["name"]);
    }
}
