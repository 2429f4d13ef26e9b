//! An OpenAI-compatible `SingleLlmCaller`.
//!
//! Adapted directly from `cloudllm::clients::openai::OpenAIClient` and its
//! `send_with_native_tools` wire-format helper: a pooled `reqwest::Client`
//! built once via `lazy_static!`, a raw HTTP POST to `{base_url}/chat/completions`
//! with a Bearer auth header (rather than going through the `openai-rust2`
//! SDK, which does not expose the native tool-calling wire format this
//! gateway needs), and the same message/tool-call JSON mapping.

use async_trait::async_trait;
use lazy_static::lazy_static;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::runtime::config::RuntimeConfig;
use crate::runtime::llm_gateway::{GatewayError, LlmCallOptions, LlmCallResponse, ModelSelectionCriteria, SingleLlmCaller};
use crate::runtime::message::{Message, Role, ToolCall, Usage};
use crate::runtime::tool::ToolDefinition;

lazy_static! {
    /// Shared HTTP client with persistent connection pooling, reused across
    /// every `OpenAiCaller` instance in a process.
    static ref SHARED_HTTP_CLIENT: reqwest::Client = {
        reqwest::ClientBuilder::new()
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .pool_max_idle_per_host(10)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build shared HTTP client")
    };
}

/// Well-known OpenAI model identifiers. Exists so callers can select a model
/// without typo-risking a raw string; `new_with_model_string` remains
/// available for providers or model names this enum doesn't enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    Gpt41,
    Gpt41Mini,
    Gpt41Nano,
    Gpt4o,
    Gpt4oMini,
    O3Mini,
    O4Mini,
}

impl Model {
    fn as_str(&self) -> &'static str {
        match self {
            Model::Gpt41 => "gpt-4.1",
            Model::Gpt41Mini => "gpt-4.1-mini",
            Model::Gpt41Nano => "gpt-4.1-nano",
            Model::Gpt4o => "gpt-4o",
            Model::Gpt4oMini => "gpt-4o-mini",
            Model::O3Mini => "o3-mini",
            Model::O4Mini => "o4-mini",
        }
    }
}

/// A [`SingleLlmCaller`] talking to an OpenAI-compatible Chat Completions
/// endpoint. Works against OpenAI itself as well as any OpenAI-compatible
/// proxy (Anthropic's compatibility endpoint, xAI Grok, local vLLM/Ollama
/// gateways) by overriding `base_url`.
pub struct OpenAiCaller {
    http_client: &'static reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    config: RuntimeConfig,
    usage: Mutex<Option<Usage>>,
}

impl OpenAiCaller {
    pub fn new_with_model_enum(api_key: impl Into<String>, model: Model) -> Self {
        Self::new_with_base_url_and_model(api_key, "https://api.openai.com/v1", model.as_str())
    }

    pub fn new_with_model_string(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new_with_base_url_and_model(api_key, "https://api.openai.com/v1", model)
    }

    pub fn new_with_base_url_and_model(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let model = model.into();
        let config = RuntimeConfig {
            default_model: model.clone(),
            ..RuntimeConfig::default()
        };
        Self {
            http_client: &SHARED_HTTP_CLIENT,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model,
            config,
            usage: Mutex::new(None),
        }
    }

    /// Replace the runtime config this caller resolves `ByRole`/`Auto`/`Default`
    /// model-selection criteria against, e.g. to supply `model_roles`.
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }
}

/// Resolve an `Option<ModelSelectionCriteria>` to a concrete model identifier.
/// `None` keeps the caller's own fixed `model`; `ByRole` falls back to
/// `config.default_model` if the role is unconfigured; `FallbackByName` takes
/// the first candidate (no provider reachability probe is implemented).
fn resolve_model(config: &RuntimeConfig, criteria: Option<&ModelSelectionCriteria>, default: &str) -> String {
    match criteria {
        None => default.to_string(),
        Some(ModelSelectionCriteria::ByName(name)) => name.clone(),
        Some(ModelSelectionCriteria::ByRole(role)) => config
            .model_for_role(role)
            .map(|s| s.to_string())
            .unwrap_or_else(|| config.default_model.clone()),
        Some(ModelSelectionCriteria::FallbackByName(names)) => {
            names.first().cloned().unwrap_or_else(|| config.default_model.clone())
        }
        Some(ModelSelectionCriteria::Auto) | Some(ModelSelectionCriteria::Default) => config.default_model.clone(),
    }
}

#[async_trait]
impl SingleLlmCaller for OpenAiCaller {
    async fn call(
        &self,
        messages: &[Message],
        tools: Option<Vec<ToolDefinition>>,
        options: &LlmCallOptions,
        _schema_hint: Option<&serde_json::Value>,
    ) -> Result<LlmCallResponse, GatewayError> {
        let wire_messages: Vec<serde_json::Value> = messages.iter().map(message_to_wire).collect();
        let wire_tools: Vec<serde_json::Value> = tools
            .unwrap_or_default()
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema.to_json_schema(),
                    }
                })
            })
            .collect();

        let model = resolve_model(&self.config, options.model.as_ref(), &self.model);
        let mut body = serde_json::json!({
            "model": model,
            "messages": wire_messages,
        });
        if !wire_tools.is_empty() {
            body["tools"] = serde_json::Value::Array(wire_tools);
        }
        if let Some(temperature) = options.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(true) = options.thinking_enabled {
            body["reasoning_effort"] = serde_json::json!("high");
        }

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let resp = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::LlmCallFailed {
                reason: e.to_string(),
                retriable: true,
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| GatewayError::LlmCallFailed {
            reason: e.to_string(),
            retriable: true,
        })?;

        if !status.is_success() {
            if log::log_enabled!(log::Level::Error) {
                log::error!("OpenAiCaller::call: HTTP {} from {}: {}", status, url, text);
            }
            return Err(GatewayError::LlmCallFailed {
                reason: format!("HTTP {} — {}", status, text),
                retriable: status.is_server_error() || status.as_u16() == 429,
            });
        }

        let parsed: serde_json::Value = serde_json::from_str(&text).map_err(|e| GatewayError::InvalidLlmReturnFormat {
            reason: e.to_string(),
        })?;

        let usage = parsed.get("usage").map(|usage_obj| Usage {
            prompt_tokens: usage_obj.get("prompt_tokens").and_then(|v| v.as_u64()),
            completion_tokens: usage_obj.get("completion_tokens").and_then(|v| v.as_u64()),
        });
        if let Some(usage) = usage {
            *self.usage.lock().await = Some(usage);
        }

        let choice_msg = parsed
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| GatewayError::InvalidLlmReturnFormat {
                reason: "no choices in response".to_string(),
            })?;

        let content: Arc<str> = choice_msg
            .get("content")
            .and_then(|c| c.as_str())
            .map(Arc::from)
            .unwrap_or_else(|| Arc::from(""));

        let tool_calls: Vec<ToolCall> = choice_msg
            .get("tool_calls")
            .and_then(|tc| tc.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|tc| {
                        let id = tc.get("id")?.as_str()?.to_string();
                        let func = tc.get("function")?;
                        let name = func.get("name")?.as_str()?.to_string();
                        let args_str = func.get("arguments")?.as_str().unwrap_or("{}");
                        let arguments: serde_json::Value =
                            serde_json::from_str(args_str).unwrap_or_else(|_| serde_json::json!({}));
                        Some(ToolCall { id, name, arguments })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(LlmCallResponse {
            assistant: Message::assistant_with_tool_calls(content, tool_calls),
            usage,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<Usage>>> {
        Some(&self.usage)
    }
}

fn message_to_wire(msg: &Message) -> serde_json::Value {
    match &msg.role {
        Role::System => serde_json::json!({ "role": "system", "content": msg.content.as_ref() }),
        Role::User => serde_json::json!({ "role": "user", "content": msg.content.as_ref() }),
        Role::Assistant => {
            if msg.tool_calls.is_empty() {
                serde_json::json!({ "role": "assistant", "content": msg.content.as_ref() })
            } else {
                let tool_calls: Vec<serde_json::Value> = msg
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        serde_json::json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": serde_json::to_string(&tc.arguments).unwrap_or_else(|_| "{}".to_string()),
                            }
                        })
                    })
                    .collect();
                serde_json::json!({
                    "role": "assistant",
                    "content": serde_json::Value::Null,
                    "tool_calls": tool_calls,
                })
            }
        }
        Role::Tool { call_id } => serde_json::json!({
            "role": "tool",
            "tool_call_id": call_id,
            "content": msg.content.as_ref(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_criteria_keeps_the_caller_default() {
        let config = RuntimeConfig::default();
        assert_eq!(resolve_model(&config, None, "gpt-4.1-mini"), "gpt-4.1-mini");
    }

    #[test]
    fn by_name_overrides_the_default() {
        let config = RuntimeConfig::default();
        let criteria = ModelSelectionCriteria::ByName("gpt-4o".to_string());
        assert_eq!(resolve_model(&config, Some(&criteria), "gpt-4.1-mini"), "gpt-4o");
    }

    #[test]
    fn by_role_resolves_against_configured_roles() {
        let mut config = RuntimeConfig::default();
        config.model_roles.insert("summarizer".to_string(), "gpt-4.1-nano".to_string());
        let criteria = ModelSelectionCriteria::ByRole("summarizer".to_string());
        assert_eq!(resolve_model(&config, Some(&criteria), "gpt-4.1-mini"), "gpt-4.1-nano");
    }

    #[test]
    fn by_role_falls_back_to_default_model_when_role_unconfigured() {
        let config = RuntimeConfig::default();
        let criteria = ModelSelectionCriteria::ByRole("planner".to_string());
        assert_eq!(resolve_model(&config, Some(&criteria), "gpt-4.1-mini"), config.default_model);
    }

    #[test]
    fn fallback_by_name_takes_the_first_candidate() {
        let config = RuntimeConfig::default();
        let criteria = ModelSelectionCriteria::FallbackByName(vec!["gpt-4o".to_string(), "gpt-4.1".to_string()]);
        assert_eq!(resolve_model(&config, Some(&criteria), "gpt-4.1-mini"), "gpt-4o");
    }

    #[test]
    fn auto_and_default_resolve_to_the_configured_default_model() {
        let config = RuntimeConfig::default();
        assert_eq!(resolve_model(&config, Some(&ModelSelectionCriteria::Auto), "gpt-4.1-mini"), config.default_model);
        assert_eq!(resolve_model(&config, Some(&ModelSelectionCriteria::Default), "gpt-4.1-mini"), config.default_model);
    }

    #[test]
    fn with_config_overrides_role_resolution() {
        let mut config = RuntimeConfig::default();
        config.model_roles.insert("planner".to_string(), "gpt-4.1".to_string());
        let caller = OpenAiCaller::new_with_model_string("key", "gpt-4.1-mini").with_config(config);
        let criteria = ModelSelectionCriteria::ByRole("planner".to_string());
        assert_eq!(resolve_model(&caller.config, Some(&criteria), &caller.model), "gpt-4.1");
    }
}
