//! Integration tests for the tool loop driver, typed object creator, and
//! progressive tool façades: a plain no-tool response, a tool round trip, an
//! unfolding façade reveal, a state-scoped rejection, a HITL suspension, a
//! replan, and malformed-JSON retry behavior.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use agentcore::runtime::driver::{run_tool_loop, ToolLoopFailure, ToolLoopRequest};
use agentcore::runtime::hitl::{Awaitable, ReplanRequested, ToolLoopSignal};
use agentcore::runtime::llm_gateway::{GatewayError, LlmCallOptions, LlmCallResponse, SingleLlmCaller};
use agentcore::runtime::message::{Message, ToolCall, Usage};
use agentcore::runtime::tool::{FnToolHandler, Tool, ToolCallResult, ToolDefinition, ToolDispatchSignal};
use agentcore::runtime::typed_object::{create_object, ObjectCreationRequest, Validate};
use agentcore::runtime::facade::{StateHolder, StateMachineTool, StateScopedTool};
use agentcore::runtime::schema::InputSchema;

/// A scripted `SingleLlmCaller` that hands back one queued response per call,
/// ignoring the messages/tools it is actually offered — tests only care that
/// the driver reacts correctly to what comes back.
struct ScriptedLlm {
    responses: Mutex<Vec<LlmCallResponse>>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    fn new(mut responses: Vec<LlmCallResponse>) -> Self {
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl SingleLlmCaller for ScriptedLlm {
    async fn call(
        &self,
        _messages: &[Message],
        _tools: Option<Vec<ToolDefinition>>,
        _options: &LlmCallOptions,
        _schema_hint: Option<&serde_json::Value>,
    ) -> Result<LlmCallResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| GatewayError::LlmCallFailed {
                reason: "scripted responses exhausted".to_string(),
                retriable: false,
            })
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn text_response(content: &str) -> LlmCallResponse {
    LlmCallResponse {
        assistant: Message::assistant(content.to_string()),
        usage: Some(Usage {
            prompt_tokens: Some(10),
            completion_tokens: Some(5),
        }),
    }
}

fn tool_call_response(call_id: &str, tool_name: &str, args: serde_json::Value) -> LlmCallResponse {
    LlmCallResponse {
        assistant: Message::assistant_with_tool_calls(
            "",
            vec![ToolCall {
                id: call_id.to_string(),
                name: tool_name.to_string(),
                arguments: args,
            }],
        ),
        usage: None,
    }
}

fn add_tool() -> Tool {
    Tool::new(
        ToolDefinition::new("add", "add two integers", InputSchema::new()),
        Arc::new(FnToolHandler(|input: serde_json::Value| {
            let a = input.get("a").and_then(|v| v.as_i64()).unwrap_or(0);
            let b = input.get("b").and_then(|v| v.as_i64()).unwrap_or(0);
            Ok(ToolCallResult::Text((a + b).to_string()))
        })),
    )
}

fn base_request<'a>(llm: &'a dyn SingleLlmCaller, tools: Vec<Tool>) -> ToolLoopRequest<'a> {
    ToolLoopRequest {
        agent_process_id: "proc-1".to_string(),
        interaction_id: None,
        llm,
        initial_messages: vec![Message::user("go")],
        initial_tools: tools,
        options: LlmCallOptions::default(),
        max_iterations: 10,
        injection_strategies: Vec::new(),
        events: None,
        cancellation: None,
        tool_timeout: None,
        schema_hint: None,
    }
}

#[tokio::test]
async fn no_tool_response_returns_on_first_iteration() {
    let llm = ScriptedLlm::new(vec![text_response("{\"summary\":\"hi\"}")]);
    let outcome = run_tool_loop(base_request(&llm, Vec::new())).await.unwrap();

    assert_eq!(outcome.iterations, 1);
    assert!(outcome.injected_tools.is_empty());
    assert_eq!(outcome.final_message.content.as_ref(), "{\"summary\":\"hi\"}");
}

#[tokio::test]
async fn one_tool_round_trip() {
    let llm = ScriptedLlm::new(vec![
        tool_call_response("call-1", "add", serde_json::json!({"a": 3, "b": 5})),
        text_response("{\"answer\":8}"),
    ]);
    let outcome = run_tool_loop(base_request(&llm, vec![add_tool()])).await.unwrap();

    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.final_message.content.as_ref(), "{\"answer\":8}");

    // history: user, assistant(toolCalls=[add]), tool-result("8"), assistant(final)
    assert_eq!(outcome.history.len(), 4);
    assert_eq!(outcome.history[1].tool_calls.len(), 1);
    assert_eq!(outcome.history[1].tool_calls[0].name, "add");
    assert_eq!(outcome.history[2].content.as_ref(), "8");
}

#[tokio::test]
async fn unfolding_tool_reveals_inner_tools_then_they_become_callable() {
    use agentcore::runtime::facade::{UnfoldingMode, UnfoldingTool};

    let db_query = Tool::new(
        ToolDefinition::new("db_query", "query the database", InputSchema::new()),
        Arc::new(FnToolHandler(|_| Ok(ToolCallResult::Text("[]".to_string())))),
    );
    let db_insert = Tool::new(
        ToolDefinition::new("db_insert", "insert into the database", InputSchema::new()),
        Arc::new(FnToolHandler(|_| Ok(ToolCallResult::Text("inserted".to_string())))),
    );
    let facade = UnfoldingTool::new(
        "db_ops_facade",
        "database operations",
        vec![db_query, db_insert],
        UnfoldingMode::AllReveal,
    )
    .into_tool();

    let llm = ScriptedLlm::new(vec![
        tool_call_response("call-1", "db_ops_facade", serde_json::json!({})),
        tool_call_response("call-2", "db_query", serde_json::json!({})),
        text_response("done"),
    ]);
    let outcome = run_tool_loop(base_request(&llm, vec![facade])).await.unwrap();

    assert_eq!(outcome.iterations, 3);
    assert!(outcome.injected_tools.contains(&"db_query".to_string()));
    assert!(outcome.injected_tools.contains(&"db_insert".to_string()));
    // façade's own tool-result message names what it enabled.
    assert!(outcome.history[2].content.contains("Enabled 2 tools"));
}

#[tokio::test]
async fn state_machine_rejects_tool_outside_its_state_but_keeps_running() {
    let ship = Tool::new(
        ToolDefinition::new("ship", "ship the order", InputSchema::new()),
        Arc::new(FnToolHandler(|_| Ok(ToolCallResult::Text("shipped".to_string())))),
    );
    let holder = StateHolder::new("DRAFT");
    let machine = StateMachineTool::new(holder.clone()).with_state_scoped_tool(StateScopedTool {
        tool: ship,
        available_in: vec!["CONFIRMED".to_string()],
        transition_on_success: None,
    });
    // Registered in the driver's flat `available_tools`, not dispatched
    // directly — the state check must hold from inside a running tool loop.
    let tools = machine.into_tools();

    let llm = ScriptedLlm::new(vec![
        tool_call_response("call-1", "ship", serde_json::json!({})),
        text_response("noted, still in draft"),
    ]);
    let outcome = run_tool_loop(base_request(&llm, tools)).await.unwrap();

    assert_eq!(outcome.iterations, 2);
    assert!(outcome.history[2].content.contains("DRAFT"));
    assert_eq!(outcome.final_message.content.as_ref(), "noted, still in draft");
    assert_eq!(holder.current(), "DRAFT");
}

#[tokio::test]
async fn hitl_suspension_does_not_run_the_guarded_action() {
    let performed = Arc::new(AtomicUsize::new(0));
    let performed_clone = performed.clone();
    let delete_file = Tool::new(
        ToolDefinition::new("delete_file", "delete a file, optionally with confirmation", InputSchema::new()),
        Arc::new(FnToolHandler(move |input: serde_json::Value| {
            let force = input.get("force").and_then(|v| v.as_bool()).unwrap_or(false);
            if force {
                performed_clone.fetch_add(1, Ordering::SeqCst);
                Ok(ToolCallResult::Text("deleted".to_string()))
            } else {
                Err(ToolDispatchSignal::Awaitable(Awaitable::new(
                    "aw-delete-1",
                    "confirmation",
                    serde_json::json!({"path": "/x"}),
                    "Confirm deleting /x?",
                )))
            }
        })),
    );

    let llm = ScriptedLlm::new(vec![tool_call_response(
        "call-1",
        "delete_file",
        serde_json::json!({"path": "/x", "force": false}),
    )]);
    let failure = run_tool_loop(base_request(&llm, vec![delete_file])).await.unwrap_err();

    match failure {
        ToolLoopFailure::Signal(ToolLoopSignal::AwaitableRequested(awaitable)) => {
            assert_eq!(awaitable.id, "aw-delete-1");
            assert!(awaitable.is_pending());
        }
        other => panic!("expected an AwaitableRequested signal, got {:?}", other),
    }
    assert_eq!(performed.load(Ordering::SeqCst), 0, "the file must not have been deleted");
}

#[tokio::test]
async fn replan_unwinds_the_loop_without_failing_it() {
    let route_user = Tool::new(
        ToolDefinition::new("route_user", "route the user to the right flow", InputSchema::new()),
        Arc::new(FnToolHandler(|_| {
            Err(ToolDispatchSignal::Replan(ReplanRequested::new(
                "intent=refund",
                Box::new(|bb: &mut agentcore::runtime::blackboard::Blackboard| {
                    bb.add_object("Intent.REFUND".to_string());
                }),
            )))
        })),
    );

    let llm = ScriptedLlm::new(vec![tool_call_response("call-1", "route_user", serde_json::json!({}))]);
    let failure = run_tool_loop(base_request(&llm, vec![route_user])).await.unwrap_err();

    let mut blackboard = agentcore::runtime::blackboard::Blackboard::new();
    match failure {
        ToolLoopFailure::Signal(ToolLoopSignal::ReplanRequested(replan)) => {
            assert_eq!(replan.reason, "intent=refund");
            replan.apply(&mut blackboard);
        }
        other => panic!("expected a ReplanRequested signal, got {:?}", other),
    }
    assert_eq!(*blackboard.last::<String>().unwrap(), "Intent.REFUND");
}

#[derive(Debug, serde::Deserialize)]
struct Summary {
    summary: String,
}

impl Validate for Summary {}

#[tokio::test]
async fn malformed_json_is_retried_once_then_succeeds() {
    let llm = ScriptedLlm::new(vec![text_response("not json"), text_response("{\"summary\":\"ok\"}")]);

    let result: Summary = create_object(ObjectCreationRequest {
        agent_process_id: "proc-1".to_string(),
        interaction_id: None,
        llm: &llm,
        messages: vec![Message::user("summarize")],
        tools: Vec::new(),
        options: LlmCallOptions::default(),
        max_iterations: 10,
        events: None,
        schema: serde_json::json!({"type": "object", "properties": {"summary": {"type": "string"}}, "required": ["summary"]}),
        property_filter: None,
        examples: Vec::new(),
        generate_examples: false,
        retry_attempts: 2,
    })
    .await
    .unwrap();

    assert_eq!(result.summary, "ok");
    // one retry consumed: first call malformed, second call parses.
    assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn malformed_json_exhausts_retry_budget_and_surfaces_a_runtime_error() {
    let llm = ScriptedLlm::new(vec![text_response("not json"), text_response("still not json")]);

    let result: Result<Summary, _> = create_object(ObjectCreationRequest {
        agent_process_id: "proc-1".to_string(),
        interaction_id: None,
        llm: &llm,
        messages: vec![Message::user("summarize")],
        tools: Vec::new(),
        options: LlmCallOptions::default(),
        max_iterations: 10,
        events: None,
        schema: serde_json::json!({"type": "object", "properties": {"summary": {"type": "string"}}, "required": ["summary"]}),
        property_filter: None,
        examples: Vec::new(),
        generate_examples: false,
        retry_attempts: 1,
    })
    .await;

    assert!(result.is_err());
}
