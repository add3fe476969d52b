//! Audit-trace recorder.

use crate::tool::ToolTrace;
use async_trait::async_trait;

#[async_trait]
pub trait TraceRecorder: Send + Sync {
    async fn record(&self, trace: ToolTrace);
}

/// Accumulates traces in memory for the current turn; drained into
/// `RunResult.tool_trace` at turn completion.
#[derive(Default)]
pub struct TurnTraceBuffer {
    traces: tokio::sync::Mutex<Vec<ToolTrace>>,
}

#[async_trait]
impl TraceRecorder for TurnTraceBuffer {
    async fn record(&self, trace: ToolTrace) {
        self.traces.lock().await.push(trace);
    }
}

impl TurnTraceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn drain(&self) -> Vec<ToolTrace> {
        std::mem::take(&mut *self.traces.lock().await)
    }
}
