//! Event sink abstraction.
//!
//! Scoped (task-local) state per the orchestrator's design notes:
//! never mutated by children, installed once per turn, used by both the
//! orchestrator's own lifecycle events and the tool middleware chain so
//! `ToolCall`/`ToolResult` interleave correctly with everything else.

use crate::events::RunEvent;
use async_trait::async_trait;

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: RunEvent);
}

/// A sink that drops everything; useful in tests and as a safe default.
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn emit(&self, _event: RunEvent) {}
}
