//! Tool trait and registry: `{ name, description, parameters,
//! call(arguments) -> Output }`, the shape the middleware pipeline wraps
//! transparently.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub enum ToolResult {
    Text(String),
    Json(Value),
    Error(String),
}

impl ToolResult {
    pub fn text(s: impl Into<String>) -> Self {
        ToolResult::Text(s.into())
    }

    pub fn json(v: Value) -> Self {
        ToolResult::Json(v)
    }

    pub fn error(s: impl Into<String>) -> Self {
        ToolResult::Error(s.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolResult::Error(_))
    }

    pub fn to_content_string(&self) -> String {
        match self {
            ToolResult::Text(s) => s.clone(),
            ToolResult::Json(v) => v.to_string(),
            ToolResult::Error(s) => s.clone(),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    /// Guidance injected into the model's system prompt about how to use
    /// this tool well; empty string if none.
    fn prompt(&self) -> &str {
        ""
    }

    fn input_schema(&self) -> Value;

    fn is_read_only(&self) -> bool {
        false
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value) -> ToolResult;

    /// Cancellation-aware execution. The default implementation races the
    /// ordinary `execute` future against the token so tools that don't
    /// override this still get the outer cancellation contract; only
    /// process-spawning tools (`bash`) need a bespoke cancellable path.
    async fn execute_cancellable(&self, args: Value, cancel: CancellationToken) -> ToolResult {
        tokio::select! {
            result = self.execute(args) => result,
            _ = cancel.cancelled() => ToolResult::text("[cancelled]"),
        }
    }

    fn to_llm_tool(&self) -> Value {
        serde_json::json!({
            "name": self.name(),
            "description": self.description(),
            "input_schema": self.input_schema(),
        })
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn to_llm_tools(&self) -> Vec<Value> {
        self.tools
            .values()
            .filter(|t| t.is_enabled())
            .map(|t| t.to_llm_tool())
            .collect()
    }
}
