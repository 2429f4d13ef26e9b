//! A TTL-aware key-value memory [`Tool`], wrapping `cloudllm::tools::memory::Memory`
//! so agents can persist scratch state across tool-loop iterations.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::cloudllm::tools::memory::Memory;
use crate::runtime::schema::{InputSchema, Parameter, ParameterType};
use crate::runtime::tool::{Tool, ToolCallResult, ToolDefinition, ToolDispatchSignal, ToolHandler};

/// A tool wrapping the TTL key-value [`Memory`] store behind a single
/// `action`-dispatched `Tool`, rather than the store's own token-efficient
/// wire protocol (`P`/`G`/`L`/`D`/`C`) — the runtime's tool wire format is
/// already JSON, so that protocol's terseness has no reason to leak into
/// this tool's input schema.
pub struct MemoryTool {
    store: Memory,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Action {
    Put,
    Get,
    Delete,
    List,
    Clear,
}

impl MemoryTool {
    pub fn new() -> Self {
        Self { store: Memory::new() }
    }

    fn input_schema() -> InputSchema {
        InputSchema::new()
            .with_parameter(
                Parameter::new("action", ParameterType::String)
                    .required()
                    .with_enum_values(vec!["put".into(), "get".into(), "delete".into(), "list".into(), "clear".into()]),
            )
            .with_parameter(Parameter::new("key", ParameterType::String))
            .with_parameter(Parameter::new("value", ParameterType::String))
            .with_parameter(Parameter::new("ttl_seconds", ParameterType::Integer))
    }

    pub fn into_tool(self) -> Tool {
        let definition = ToolDefinition::new(
            "memory",
            "Persist or retrieve scratch key-value state across tool calls, with an optional TTL.",
            Self::input_schema(),
        );
        Tool::new(definition, Arc::new(self))
    }
}

impl Default for MemoryTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolHandler for MemoryTool {
    async fn call(&self, input: serde_json::Value) -> Result<ToolCallResult, ToolDispatchSignal> {
        let action: Action = match input.get("action").and_then(|v| v.as_str()) {
            Some(raw) => match serde_json::from_value(serde_json::Value::String(raw.to_string())) {
                Ok(action) => action,
                Err(_) => return Ok(ToolCallResult::Error(format!("unknown action '{}'", raw))),
            },
            None => return Ok(ToolCallResult::Error("missing required field 'action'".to_string())),
        };

        match action {
            Action::Put => {
                let key = match input.get("key").and_then(|v| v.as_str()) {
                    Some(k) => k.to_string(),
                    None => return Ok(ToolCallResult::Error("put requires 'key'".to_string())),
                };
                let value = match input.get("value").and_then(|v| v.as_str()) {
                    Some(v) => v.to_string(),
                    None => return Ok(ToolCallResult::Error("put requires 'value'".to_string())),
                };
                let ttl = input.get("ttl_seconds").and_then(|v| v.as_u64());
                self.store.put(key, value, ttl);
                Ok(ToolCallResult::Text("OK".to_string()))
            }
            Action::Get => {
                let key = match input.get("key").and_then(|v| v.as_str()) {
                    Some(k) => k,
                    None => return Ok(ToolCallResult::Error("get requires 'key'".to_string())),
                };
                match self.store.get(key, false) {
                    Some((value, _)) => Ok(ToolCallResult::Text(value)),
                    None => Ok(ToolCallResult::Error(format!("no value for key '{}'", key))),
                }
            }
            Action::Delete => {
                let key = match input.get("key").and_then(|v| v.as_str()) {
                    Some(k) => k,
                    None => return Ok(ToolCallResult::Error("delete requires 'key'".to_string())),
                };
                if self.store.delete(key) {
                    Ok(ToolCallResult::Text("OK".to_string()))
                } else {
                    Ok(ToolCallResult::Error(format!("no value for key '{}'", key)))
                }
            }
            Action::List => {
                let keys = self.store.list_keys();
                Ok(ToolCallResult::Text(keys.join(",")))
            }
            Action::Clear => {
                self.store.clear();
                Ok(ToolCallResult::Text("OK".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let tool = MemoryTool::new().into_tool();
        tool.call(serde_json::json!({"action": "put", "key": "task", "value": "refund"}))
            .await
            .unwrap();
        let result = tool.call(serde_json::json!({"action": "get", "key": "task"})).await.unwrap();
        match result {
            ToolCallResult::Text(text) => assert_eq!(text, "refund"),
            other => panic!("expected Text, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn get_missing_key_is_a_tool_error() {
        let tool = MemoryTool::new().into_tool();
        let result = tool.call(serde_json::json!({"action": "get", "key": "missing"})).await.unwrap();
        assert!(matches!(result, ToolCallResult::Error(_)));
    }

    #[tokio::test]
    async fn clear_empties_the_store() {
        let tool = MemoryTool::new().into_tool();
        tool.call(serde_json::json!({"action": "put", "key": "a", "value": "1"})).await.unwrap();
        tool.call(serde_json::json!({"action": "clear"})).await.unwrap();
        let result = tool.call(serde_json::json!({"action": "list"})).await.unwrap();
        match result {
            ToolCallResult::Text(text) => assert_eq!(text, ""),
            other => panic!("expected Text, got {:?}", other),
        }
    }
}
