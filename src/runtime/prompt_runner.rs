//! `PromptRunner`: the immutable config object that assembles a prompt,
//! tools, references, and guardrails, then drives either a plain text
//! generation or a typed object creation.
//!
//! Every `with_x` consumes `self` by value and returns a new `PromptRunner`,
//! matching `cloudllm::agent::Agent`'s builder idiom
//! (`with_expertise`/`with_tools`/`with_event_handler`). Collection fields
//! are `Arc`-wrapped so an unrelated `with_x` call clones only the `Arc`,
//! not the underlying `Vec`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::runtime::blackboard::Blackboard;
use crate::runtime::driver::ToolLoopFailure;
use crate::runtime::events::EventHandler;
use crate::runtime::llm_gateway::{LlmCallOptions, SingleLlmCaller};
use crate::runtime::message::Message;
use crate::runtime::reference::LlmReference;
use crate::runtime::registry::{ToolGroupRegistry, ToolRegistry};
use crate::runtime::schema::{InputSchema, Parameter, ParameterType};
use crate::runtime::tool::Tool;
use crate::runtime::typed_object::{create_object, generate_text as generate_text_impl, ObjectCreationRequest, PropertyFilter, TypedObjectFailure, Validate};

/// A multi-modal image part, carried alongside `messages`.
#[derive(Debug, Clone)]
pub struct ImagePart {
    pub url_or_base64: String,
    pub description: Option<String>,
}

/// A static prompt fragment, or one evaluated against the blackboard at
/// execution time (a "contextual prompt contributor").
#[derive(Clone)]
pub enum PromptContributor {
    Static(Arc<str>),
    Contextual(Arc<dyn Fn(&Blackboard) -> String + Send + Sync>),
}

/// How a reference's tools are renamed to stay unique within a `PromptRunner`
/// scope when merged.
#[derive(Clone)]
pub enum NamingStrategy {
    Identity,
    Prefix(String),
    Custom(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl NamingStrategy {
    fn rename(&self, name: &str) -> String {
        match self {
            NamingStrategy::Identity => name.to_string(),
            NamingStrategy::Prefix(prefix) => format!("{}_{}", prefix, name),
            NamingStrategy::Custom(f) => f(name),
        }
    }
}

/// The immutable configuration object. Constructed with [`PromptRunner::new`]
/// and transformed by value through the `with_*` methods.
#[derive(Clone)]
pub struct PromptRunner {
    agent_process_id: Arc<str>,
    llm: Arc<dyn SingleLlmCaller>,
    options: LlmCallOptions,
    tools: Arc<Vec<Tool>>,
    tool_group_names: Arc<Vec<String>>,
    references: Arc<Vec<Arc<LlmReference>>>,
    prompt_contributors: Arc<Vec<PromptContributor>>,
    messages: Arc<Vec<Message>>,
    images: Arc<Vec<ImagePart>>,
    generate_examples: bool,
    guardrails: Arc<Vec<Arc<str>>>,
    interaction_id: Option<Arc<str>>,
    max_iterations: usize,
    events: Option<Arc<dyn EventHandler>>,
}

impl PromptRunner {
    pub fn new(agent_process_id: impl Into<String>, llm: Arc<dyn SingleLlmCaller>) -> Self {
        Self {
            agent_process_id: agent_process_id.into().into(),
            llm,
            options: LlmCallOptions::default(),
            tools: Arc::new(Vec::new()),
            tool_group_names: Arc::new(Vec::new()),
            references: Arc::new(Vec::new()),
            prompt_contributors: Arc::new(Vec::new()),
            messages: Arc::new(Vec::new()),
            images: Arc::new(Vec::new()),
            generate_examples: false,
            guardrails: Arc::new(Vec::new()),
            interaction_id: None,
            max_iterations: crate::runtime::config::DEFAULT_MAX_ITERATIONS,
            events: None,
        }
    }

    pub fn with_options(mut self, options: LlmCallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tool(mut self, tool: Tool) -> Self {
        Arc::make_mut(&mut self.tools).push(tool);
        self
    }

    pub fn with_tool_group(mut self, group_name: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.tool_group_names).push(group_name.into());
        self
    }

    pub fn with_reference(mut self, reference: Arc<LlmReference>) -> Self {
        Arc::make_mut(&mut self.references).push(reference);
        self
    }

    pub fn with_prompt_contributor(mut self, fragment: impl Into<Arc<str>>) -> Self {
        Arc::make_mut(&mut self.prompt_contributors).push(PromptContributor::Static(fragment.into()));
        self
    }

    pub fn with_contextual_prompt_contributor(mut self, f: impl Fn(&Blackboard) -> String + Send + Sync + 'static) -> Self {
        Arc::make_mut(&mut self.prompt_contributors).push(PromptContributor::Contextual(Arc::new(f)));
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        Arc::make_mut(&mut self.messages).push(message);
        self
    }

    pub fn with_image(mut self, image: ImagePart) -> Self {
        Arc::make_mut(&mut self.images).push(image);
        self
    }

    pub fn with_generate_examples(mut self, generate_examples: bool) -> Self {
        self.generate_examples = generate_examples;
        self
    }

    pub fn with_guardrail(mut self, guardrail: impl Into<Arc<str>>) -> Self {
        Arc::make_mut(&mut self.guardrails).push(guardrail.into());
        self
    }

    pub fn with_interaction_id(mut self, interaction_id: impl Into<Arc<str>>) -> Self {
        self.interaction_id = Some(interaction_id.into());
        self
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.events = Some(handler);
        self
    }

    /// Merge direct tools, resolved tool groups, and reference-contributed
    /// tools (renamed by each reference's naming strategy) into one
    /// name-deduplicated set; the last registration of a given name wins.
    pub fn resolve_tools(&self, tool_registry: &ToolRegistry, group_registry: &ToolGroupRegistry, naming: &NamingStrategy) -> Vec<Tool> {
        let mut merged = ToolRegistry::new();
        for name in self.tool_group_names.iter() {
            for tool in group_registry.resolve(name, tool_registry) {
                let _ = merged.register(tool);
            }
        }
        for reference in self.references.iter() {
            for tool in reference.tools() {
                let renamed_name = naming.rename(tool.name());
                let renamed = tool.clone().renamed(renamed_name);
                let _ = merged.register(renamed);
            }
        }
        for tool in self.tools.iter() {
            let _ = merged.register(tool.clone());
        }
        merged.list().into_iter().cloned().collect()
    }

    /// Render the static + reference + guardrail prompt fragments, evaluating
    /// any contextual contributors against the supplied blackboard.
    pub fn build_prompt(&self, blackboard: &Blackboard) -> String {
        let mut sections = Vec::new();
        for reference in self.references.iter() {
            sections.push(reference.contribution());
        }
        for contributor in self.prompt_contributors.iter() {
            match contributor {
                PromptContributor::Static(text) => sections.push(text.to_string()),
                PromptContributor::Contextual(f) => sections.push(f(blackboard)),
            }
        }
        if !self.guardrails.is_empty() {
            let mut guardrail_section = String::from("# Guardrails\n");
            for guardrail in self.guardrails.iter() {
                guardrail_section.push_str("- ");
                guardrail_section.push_str(guardrail);
                guardrail_section.push('\n');
            }
            sections.push(guardrail_section);
        }
        sections.join("\n\n")
    }

    fn messages_with_prompt(&self, blackboard: &Blackboard, prompt: Option<String>) -> Vec<Message> {
        let mut messages = Vec::new();
        let contributed = self.build_prompt(blackboard);
        if !contributed.is_empty() {
            messages.push(Message::system(contributed));
        }
        messages.extend(self.messages.iter().cloned());
        if let Some(prompt) = prompt {
            messages.push(Message::user(prompt));
        }
        messages
    }

    /// Drives the typed object creator with this runner's assembled prompt,
    /// tools, and options.
    pub async fn create_object<T>(
        &self,
        blackboard: &Blackboard,
        prompt: Option<String>,
        schema: serde_json::Value,
        property_filter: Option<PropertyFilter>,
        examples: Vec<serde_json::Value>,
    ) -> Result<T, TypedObjectFailure>
    where
        T: serde::de::DeserializeOwned + Validate,
    {
        let messages = self.messages_with_prompt(blackboard, prompt);
        create_object(ObjectCreationRequest {
            agent_process_id: self.agent_process_id.to_string(),
            interaction_id: self.interaction_id.as_ref().map(|s| s.to_string()),
            llm: self.llm.as_ref(),
            messages,
            tools: self.tools.as_ref().clone(),
            options: self.options.clone(),
            max_iterations: self.max_iterations,
            events: self.events.clone(),
            schema,
            property_filter,
            examples,
            generate_examples: self.generate_examples,
            retry_attempts: 2,
        })
        .await
    }

    /// Like [`Self::create_object`] but never surfaces a `RuntimeError`,
    /// carrying it instead as `Ok(Err(failure))`. Control-flow signals still
    /// propagate — they are not failures this method is meant to absorb.
    pub async fn create_object_if_possible<T>(
        &self,
        blackboard: &Blackboard,
        prompt: Option<String>,
        schema: serde_json::Value,
        property_filter: Option<PropertyFilter>,
        examples: Vec<serde_json::Value>,
    ) -> Result<Result<T, TypedObjectFailure>, TypedObjectFailure>
    where
        T: serde::de::DeserializeOwned + Validate,
    {
        match self.create_object(blackboard, prompt, schema, property_filter, examples).await {
            Ok(value) => Ok(Ok(value)),
            Err(TypedObjectFailure::Signal(signal)) => Err(TypedObjectFailure::Signal(signal)),
            Err(err @ TypedObjectFailure::Error(_)) => Ok(Err(err)),
        }
    }

    /// Generate plain text without a typed schema.
    pub async fn generate_text(&self, blackboard: &Blackboard, prompt: String) -> Result<String, TypedObjectFailure> {
        let messages = self.messages_with_prompt(blackboard, Some(prompt));
        generate_text_impl(
            self.agent_process_id.to_string(),
            self.interaction_id.as_ref().map(|s| s.to_string()),
            self.llm.as_ref(),
            messages,
            self.tools.as_ref().clone(),
            self.options.clone(),
            self.max_iterations,
            self.events.clone(),
        )
        .await
    }

    /// Produces a single assistant message without requiring a typed schema.
    pub async fn respond(&self, blackboard: &Blackboard, messages: Vec<Message>) -> Result<String, TypedObjectFailure> {
        let mut full_messages = self.messages_with_prompt(blackboard, None);
        full_messages.extend(messages);
        generate_text_impl(
            self.agent_process_id.to_string(),
            self.interaction_id.as_ref().map(|s| s.to_string()),
            self.llm.as_ref(),
            full_messages,
            self.tools.as_ref().clone(),
            self.options.clone(),
            self.max_iterations,
            self.events.clone(),
        )
        .await
    }

    /// Asks the LLM for a structured `{result, confidence, explanation}` and
    /// returns `result ∧ confidence ≥ threshold`.
    pub async fn evaluate_condition(
        &self,
        blackboard: &Blackboard,
        condition: &str,
        context: &str,
        confidence_threshold: f64,
    ) -> Result<bool, TypedObjectFailure> {
        let prompt = format!(
            "Evaluate whether the following condition holds given the context.\n\nCondition: {}\n\nContext: {}",
            condition, context
        );
        let evaluation: ConditionEvaluation = self
            .create_object(blackboard, Some(prompt), condition_evaluation_schema(), None, Vec::new())
            .await?;
        Ok(evaluation.result && evaluation.confidence >= confidence_threshold)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConditionEvaluation {
    result: bool,
    confidence: f64,
    explanation: String,
}

impl Validate for ConditionEvaluation {
    fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.confidence) {
            Err(format!("confidence {} out of range [0,1]", self.confidence))
        } else {
            Ok(())
        }
    }
}

fn condition_evaluation_schema() -> serde_json::Value {
    InputSchema::new()
        .with_parameter(Parameter::new("result", ParameterType::Boolean).required())
        .with_parameter(Parameter::new("confidence", ParameterType::Number).required())
        .with_parameter(Parameter::new("explanation", ParameterType::String).required())
        .to_json_schema()
}

/// Surface a [`ToolLoopFailure`] the same way [`TypedObjectFailure`] does, so
/// callers that mix plain tool-loop invocations with `PromptRunner` calls can
/// match on one shape.
impl From<ToolLoopFailure> for TypedObjectFailure {
    fn from(failure: ToolLoopFailure) -> Self {
        match failure {
            ToolLoopFailure::Error(err) => TypedObjectFailure::Error(err),
            ToolLoopFailure::Signal(signal) => TypedObjectFailure::Signal(signal),
        }
    }
}
