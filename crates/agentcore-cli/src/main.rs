//! Thin host binary wiring a stdio transport, an in-process model session,
//! the demo tool middleware pipeline, and the Context Manager into one
//! running `SessionOrchestrator`: parse args, init tracing, build the
//! runtime, run it.

mod conversation;
mod model;
mod tool_route;
mod transport;

use agentcore_context::{ContextManager, ContextManagerConfig, SlidingWindow};
use agentcore_orchestrator::{SessionOrchestratorBuilder, TransportApprovalHandler};
use agentcore_pipeline::{Conditional, Step};
use agentcore_tools::{
    demo::{BashTool, ReadFileTool, WriteFileTool},
    AutoDeny, EventEmittingMiddleware, PermissionMiddleware, SandboxMiddleware, ToolPipeline, ToolRegistry,
};
use agentcore_types::{EventSink, NullSink, PermissionConfiguration, SandboxConfig, SessionId};
use clap::Parser;
use conversation::ConversationStep;
use model::EchoSession;
use std::sync::Arc;
use tool_route::ToolInvocationStep;
use transport::StdioTransport;

#[derive(Parser, Debug)]
#[command(name = "agentcore", about = "Runs one interactive agent session over stdin/stdout")]
struct Args {
    /// Identifier for this session; a fresh one is generated if omitted.
    #[arg(long)]
    session_id: Option<String>,

    /// Directory the demo Bash/Read/Write tools operate within.
    #[arg(long, default_value = ".")]
    workspace: String,

    /// Skip interactive approval prompts and deny every `Ask` tool call
    /// outright - useful for non-interactive smoke tests.
    #[arg(long)]
    no_interactive_approval: bool,

    /// Permit the demo Bash tool to spawn subprocesses under the sandbox's
    /// working-directory-only file policy. Off by default.
    #[arg(long)]
    allow_subprocesses: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let session_id = SessionId::new(args.session_id.unwrap_or_else(|| "local".to_string()));

    let sink: Arc<dyn EventSink> = Arc::new(NullSink);

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(BashTool::new(&args.workspace)));
    registry.register(Arc::new(ReadFileTool::new(args.workspace.clone())));
    registry.register(Arc::new(WriteFileTool::new(args.workspace.clone())));

    // Interactive approval is resolved over the same stdin/stdout channel as
    // ordinary turns, so it rides the transport rather than prompting on a
    // second, independent reader - see `transport::StdioTransport`'s
    // `pending_approval` handling.
    let transport_approval = Arc::new(TransportApprovalHandler::new());
    let approval_handler: Arc<dyn agentcore_tools::ApprovalHandler> = if args.no_interactive_approval {
        Arc::new(AutoDeny)
    } else {
        transport_approval.clone()
    };

    let permission = Arc::new(PermissionMiddleware::new(
        PermissionConfiguration::default(),
        approval_handler,
        sink.clone(),
    ));
    let sandbox_config = SandboxConfig { allow_subprocesses: args.allow_subprocesses, ..SandboxConfig::default() };
    let sandbox = Arc::new(SandboxMiddleware::new(["bash".to_string()], sandbox_config));
    let event = Arc::new(EventEmittingMiddleware::new(sink.clone()));
    let tool_pipeline = Arc::new(ToolPipeline::standard(event, permission, sandbox));
    let tool_registry = Arc::new(registry);
    // A full tool-calling agent loop (model decides when to call a tool,
    // observes the result, decides again) is out of scope for this runtime;
    // what's in scope is the Tool Middleware Pipeline itself, so the CLI
    // exposes it directly: a line starting with `!` runs a tool by name
    // through the complete `EventEmitting -> Permission -> Sandbox -> Tool`
    // chain instead of going to the model.

    let context_manager = Arc::new(
        ContextManager::new(
            ContextManagerConfig {
                context_window_size: 32_000,
                reserved_response_tokens: 1_000,
                warning_threshold: 0.7,
                compaction_threshold: 0.85,
            },
            Box::new(SlidingWindow { window_size: 40 }),
        )
        .expect("static context manager configuration is valid"),
    );

    let model_session = Arc::new(EchoSession);
    let conversation_step =
        ConversationStep::new(model_session, context_manager, "You are a helpful terminal assistant.");
    let tool_step = ToolInvocationStep::new(tool_pipeline, tool_registry);
    let pipeline: Arc<dyn Step<agentcore_orchestrator::TurnInput, String>> = Arc::new(Conditional::new(
        |input: &agentcore_orchestrator::TurnInput| input.text.trim_start().starts_with('!'),
        tool_step,
        conversation_step,
    ));

    let transport = Arc::new(StdioTransport::new(session_id));
    let orchestrator = Arc::new(
        SessionOrchestratorBuilder::new(transport.clone(), pipeline)
            .with_transport_approval(transport_approval)
            .build(),
    );

    let ctrl_c_orchestrator = orchestrator.clone();
    let ctrl_c_transport = transport.clone();
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                break;
            }
            if let Some(turn_id) = ctrl_c_transport.current_turn_id() {
                ctrl_c_orchestrator.cancel(&turn_id);
            }
        }
    });

    orchestrator.run().await;
    Ok(())
}
