//! EventEmitting middleware.

use super::{Next, ToolMiddleware};
use crate::registry::ToolResult;
use agentcore_types::{EventSink, RunEvent, ToolContext, ToolUseId};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

pub struct EventEmittingMiddleware {
    sink: Arc<dyn EventSink>,
}

impl EventEmittingMiddleware {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl ToolMiddleware for EventEmittingMiddleware {
    async fn handle(
        &self,
        mut ctx: ToolContext,
        next: Next<'_>,
    ) -> Result<ToolResult, agentcore_types::Error> {
        let tool_use_id = ctx.tool_use_id.clone().unwrap_or_else(ToolUseId::generate);
        ctx.tool_use_id = Some(tool_use_id.clone());

        let session_id = ctx.session_id.clone().unwrap_or_else(|| "unknown".into());
        let turn_id = ctx.turn_id.clone().unwrap_or_else(|| "unknown".into());

        self.sink
            .emit(RunEvent::ToolCall {
                session_id: session_id.clone(),
                turn_id: turn_id.clone(),
                timestamp: Utc::now(),
                tool_use_id: tool_use_id.clone(),
                tool_name: ctx.tool_name.clone(),
                arguments: ctx.arguments.clone(),
            })
            .await;

        let started = Instant::now();
        let result = next.call(ctx).await;
        let duration_secs = started.elapsed().as_secs_f64();

        let (output, success, exit_code) = match &result {
            Ok(tool_result) => {
                let exit_code = exit_code_of(tool_result);
                (tool_result.to_content_string(), !tool_result.is_error(), exit_code)
            }
            Err(err) => (err.to_string(), false, None),
        };

        self.sink
            .emit(RunEvent::ToolResult {
                session_id,
                turn_id,
                timestamp: Utc::now(),
                tool_use_id,
                output,
                success,
                duration_secs,
                exit_code,
            })
            .await;

        result
    }
}

fn exit_code_of(_result: &ToolResult) -> Option<i32> {
    // Concrete tools (e.g. the bash-style demo tool) encode exit codes in
    // their textual output rather than a structured field, so non-process
    // tools simply report none.
    None
}
