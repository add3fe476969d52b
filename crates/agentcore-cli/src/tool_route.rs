//! Routes a `!tool {json args}` line straight through the Tool Middleware
//! Pipeline, bypassing the model entirely - the CLI's way of exercising
//! `EventEmitting -> Permission -> Sandbox -> Tool` end to end without
//! building a full tool-calling agent loop (out of scope here; see the
//! non-goal on implementing an agent loop itself).

use agentcore_orchestrator::TurnInput;
use agentcore_pipeline::Step;
use agentcore_tools::{Tool, ToolPipeline, ToolRegistry};
use agentcore_types::{scope, Error, ToolContext};
use async_trait::async_trait;
use std::sync::Arc;

pub struct ToolInvocationStep {
    pipeline: Arc<ToolPipeline>,
    registry: Arc<ToolRegistry>,
}

impl ToolInvocationStep {
    pub fn new(pipeline: Arc<ToolPipeline>, registry: Arc<ToolRegistry>) -> Self {
        Self { pipeline, registry }
    }
}

#[async_trait]
impl Step<TurnInput, String> for ToolInvocationStep {
    async fn run(&self, input: TurnInput) -> Result<String, Error> {
        let rest = input.text.trim_start().trim_start_matches('!');
        let mut parts = rest.trim().splitn(2, ' ');
        let tool_name = parts.next().unwrap_or_default().to_string();
        let arguments = parts.next().unwrap_or("{}").trim().to_string();
        let arguments = if arguments.is_empty() { "{}".to_string() } else { arguments };

        let tool: Arc<dyn Tool> = self
            .registry
            .get(&tool_name)
            .ok_or_else(|| Error::Internal(format!("unknown tool '{tool_name}'")))?;

        let ctx = ToolContext {
            session_id: Some(input.session_id),
            turn_id: Some(input.turn_id),
            tool_use_id: None,
            tool_name,
            arguments,
        };

        let result = self.pipeline.run(ctx, &tool, scope::current_cancel()).await?;
        Ok(result.to_content_string())
    }
}
