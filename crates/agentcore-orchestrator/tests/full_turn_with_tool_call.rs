//! End-to-end: a turn that drives one tool call through the full
//! `EventEmitting -> Permission -> Sandbox -> Tool` middleware chain,
//! wired behind the `SessionOrchestrator`'s receive loop / turn processor
//! split, and a turn denied by the default action.
//!
//! The orchestrator's own `RunStarted`/`RunCompleted` events and the tool
//! middleware's `ToolCall`/`ToolResult` events travel over two independent
//! sinks - exactly as `agentcore-cli` wires them - so this test reads each
//! from where it's actually emitted rather than assuming one shared stream.

use agentcore_orchestrator::{SessionOrchestratorBuilder, Transport, TurnInput};
use agentcore_pipeline::Step;
use agentcore_tools::{AutoDeny, EventEmittingMiddleware, PermissionMiddleware, SandboxMiddleware, Tool, ToolPipeline, ToolResult};
use agentcore_types::{
    DefaultAction, EventSink, PermissionConfiguration, PermissionRule, RunEvent, RunRequest,
    SandboxConfig, SessionId, ToolContext, TransportError, TurnId, TurnStatus,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "Read"
    }
    fn description(&self) -> &str {
        "reads a fixed file"
    }
    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }
    async fn execute(&self, _args: Value) -> ToolResult {
        ToolResult::text("hello")
    }
}

/// Drives a `RunRequest::Text` straight through a `ToolPipeline` that wraps
/// a single `Read` tool, then returns a fixed final response - a minimal
/// stand-in for a pipeline whose terminal stage is a tool-calling model.
struct ToolCallingPipeline {
    tool: Arc<dyn Tool>,
    middleware: Arc<ToolPipeline>,
}

#[async_trait]
impl Step<TurnInput, String> for ToolCallingPipeline {
    async fn run(&self, input: TurnInput) -> Result<String, agentcore_types::Error> {
        let ctx = ToolContext {
            session_id: Some(input.session_id),
            turn_id: Some(input.turn_id),
            tool_use_id: None,
            tool_name: self.tool.name().to_string(),
            arguments: "{}".to_string(),
        };
        self.middleware.run(ctx, &self.tool, CancellationToken::new()).await?;
        Ok("done".to_string())
    }
}

struct MockTransport {
    requests: Mutex<Vec<RunRequest>>,
    events: AsyncMutex<Vec<RunEvent>>,
}

impl MockTransport {
    fn new(requests: Vec<RunRequest>) -> Self {
        Self { requests: Mutex::new(requests), events: AsyncMutex::new(Vec::new()) }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn supports_background_receive(&self) -> bool {
        true
    }

    async fn receive(&self) -> Result<RunRequest, TransportError> {
        let mut requests = self.requests.lock().unwrap();
        if requests.is_empty() {
            Err(TransportError::InputClosed)
        } else {
            Ok(requests.remove(0))
        }
    }

    async fn send(&self, event: RunEvent) -> Result<(), TransportError> {
        self.events.lock().await.push(event);
        Ok(())
    }

    async fn close_input(&self) {}
    async fn close(&self) {}
}

/// The sink the tool middleware chain reports through, independent of the
/// transport the orchestrator itself sends `RunStarted`/`RunCompleted` on.
struct RecordingSink {
    events: AsyncMutex<Vec<RunEvent>>,
}

impl RecordingSink {
    fn new() -> Self {
        Self { events: AsyncMutex::new(Vec::new()) }
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn emit(&self, event: RunEvent) {
        self.events.lock().await.push(event);
    }
}

fn build_pipeline(config: PermissionConfiguration, sink: Arc<RecordingSink>) -> Arc<ToolCallingPipeline> {
    let sink: Arc<dyn EventSink> = sink;
    let event_mw = Arc::new(EventEmittingMiddleware::new(sink.clone()));
    let permission_mw = Arc::new(PermissionMiddleware::new(config, Arc::new(AutoDeny), sink));
    let sandbox_mw = Arc::new(SandboxMiddleware::new(["Read".to_string()], SandboxConfig::default()));
    let middleware = Arc::new(ToolPipeline::standard(event_mw, permission_mw, sandbox_mw));
    Arc::new(ToolCallingPipeline { tool: Arc::new(EchoTool), middleware })
}

#[tokio::test]
async fn completed_turn_runs_one_allowed_tool_call() {
    let config = PermissionConfiguration {
        allow: vec![PermissionRule::tool_only("Read")],
        default_action: DefaultAction::Deny,
        ..PermissionConfiguration::default()
    };
    let tool_events = Arc::new(RecordingSink::new());
    let pipeline = build_pipeline(config, tool_events.clone());

    let request = RunRequest::text(SessionId::new("s1"), TurnId::new("t1"), "show README");
    let transport = Arc::new(MockTransport::new(vec![request]));
    let orchestrator = Arc::new(SessionOrchestratorBuilder::new(transport.clone(), pipeline).build());
    orchestrator.run().await;

    let run_events = transport.events.lock().await;
    assert!(matches!(run_events[0], RunEvent::RunStarted { .. }));
    assert!(matches!(
        run_events.last().unwrap(),
        RunEvent::RunCompleted { status: TurnStatus::Completed, .. }
    ));

    let tool_events = tool_events.events.lock().await;
    assert!(tool_events.iter().any(|e| matches!(e, RunEvent::ToolCall { tool_name, .. } if tool_name == "Read")));
    assert!(tool_events
        .iter()
        .any(|e| matches!(e, RunEvent::ToolResult { success: true, output, .. } if output == "hello")));
}

#[tokio::test]
async fn default_deny_surfaces_as_a_failed_turn() {
    let config = PermissionConfiguration { default_action: DefaultAction::Deny, ..PermissionConfiguration::default() };
    let tool_events = Arc::new(RecordingSink::new());
    let pipeline = build_pipeline(config, tool_events.clone());

    let request = RunRequest::text(SessionId::new("s1"), TurnId::new("t1"), "show README");
    let transport = Arc::new(MockTransport::new(vec![request]));
    let orchestrator = Arc::new(SessionOrchestratorBuilder::new(transport.clone(), pipeline).build());
    orchestrator.run().await;

    let run_events = transport.events.lock().await;
    assert!(matches!(run_events.iter().find(|e| matches!(e, RunEvent::Error { .. })), Some(_)));
    assert!(matches!(
        run_events.last().unwrap(),
        RunEvent::RunCompleted { status: TurnStatus::Failed, .. }
    ));

    let tool_events = tool_events.events.lock().await;
    assert!(tool_events.iter().any(|e| matches!(e, RunEvent::ToolResult { success: false, .. })));
}
