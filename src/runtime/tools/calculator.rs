//! A calculator [`Tool`], wrapping `cloudllm::tools::calculator::Calculator`
//! so the tool loop has a concrete, real arithmetic tool to drive in tests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cloudllm::tools::calculator::Calculator;
use crate::runtime::schema::{InputSchema, Parameter, ParameterType};
use crate::runtime::tool::{Tool, ToolCallResult, ToolDefinition, ToolDispatchSignal, ToolHandler};

/// A tool wrapping the stateless [`Calculator`] engine behind the runtime's
/// flat `Tool` contract.
pub struct CalculatorTool {
    engine: Calculator,
}

impl CalculatorTool {
    pub fn new() -> Self {
        Self { engine: Calculator::new() }
    }

    fn input_schema() -> InputSchema {
        InputSchema::new().with_parameter(
            Parameter::new("expression", ParameterType::String)
                .with_description("A mathematical expression, e.g. \"sqrt(16) + mean([1,2,3])\"")
                .required(),
        )
    }

    /// Build the registrable [`Tool`] value.
    pub fn into_tool(self) -> Tool {
        let definition = ToolDefinition::new(
            "calculator",
            "Evaluate a mathematical expression (arithmetic, trigonometric, logarithmic, and statistical functions).",
            Self::input_schema(),
        );
        Tool::new(definition, Arc::new(self))
    }
}

impl Default for CalculatorTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolHandler for CalculatorTool {
    async fn call(&self, input: serde_json::Value) -> Result<ToolCallResult, ToolDispatchSignal> {
        let expression = match input.get("expression").and_then(|v| v.as_str()) {
            Some(expr) => expr,
            None => return Ok(ToolCallResult::Error("missing required field 'expression'".to_string())),
        };
        match self.engine.evaluate(expression).await {
            Ok(value) => Ok(ToolCallResult::Text(value.to_string())),
            Err(err) => Ok(ToolCallResult::Error(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn evaluates_a_simple_expression() {
        let tool = CalculatorTool::new().into_tool();
        let result = tool.call(serde_json::json!({"expression": "3 + 5"})).await.unwrap();
        match result {
            ToolCallResult::Text(text) => assert_eq!(text, "8"),
            other => panic!("expected Text, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_expression_is_a_tool_error_not_a_panic() {
        let tool = CalculatorTool::new().into_tool();
        let result = tool.call(serde_json::json!({})).await.unwrap();
        assert!(matches!(result, ToolCallResult::Error(_)));
    }
}
