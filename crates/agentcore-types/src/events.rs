//! Request/event wire model.

use crate::ids::{ApprovalId, SessionId, ToolUseId, TurnId};
use crate::permission::{PermissionResponse, RiskLevel};
use crate::tool::ToolTrace;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RequestInput {
    Text(String),
    ApprovalResponse {
        approval_id: ApprovalId,
        decision: PermissionResponse,
    },
    Cancel,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnContext {
    /// Steering strings applied to the conversation before the pipeline runs.
    pub steering: Vec<String>,
    pub system_override: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnPolicy {
    pub timeout_secs: Option<u64>,
    pub max_tool_calls: Option<u32>,
    pub allow_interactive_approval: bool,
}

impl Default for TurnPolicy {
    fn default() -> Self {
        Self { timeout_secs: None, max_tool_calls: None, allow_interactive_approval: true }
    }
}

/// One client message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub session_id: SessionId,
    /// The idempotency key.
    pub turn_id: TurnId,
    pub input: RequestInput,
    pub context: Option<TurnContext>,
    pub policy: Option<TurnPolicy>,
    pub metadata: Option<HashMap<String, String>>,
}

impl RunRequest {
    pub fn text(session_id: SessionId, turn_id: TurnId, text: impl Into<String>) -> Self {
        Self {
            session_id,
            turn_id,
            input: RequestInput::Text(text.into()),
            context: None,
            policy: None,
            metadata: None,
        }
    }

    pub fn cancel(session_id: SessionId, turn_id: TurnId) -> Self {
        Self {
            session_id,
            turn_id,
            input: RequestInput::Cancel,
            context: None,
            policy: None,
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TurnStatus {
    Completed,
    Failed,
    Cancelled,
    Denied,
    TimedOut,
}

impl TurnStatus {
    pub fn is_terminal_non_cancelled(self) -> bool {
        !matches!(self, TurnStatus::Cancelled)
    }
}

/// One of nine tagged variants emitted in order per turn. Every variant
/// carries `session_id`, `turn_id`, `timestamp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum RunEvent {
    #[serde(rename = "runStarted")]
    RunStarted {
        session_id: SessionId,
        turn_id: TurnId,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "tokenDelta")]
    TokenDelta {
        session_id: SessionId,
        turn_id: TurnId,
        timestamp: DateTime<Utc>,
        delta: String,
        accumulated: String,
        is_complete: bool,
    },
    #[serde(rename = "toolCall")]
    ToolCall {
        session_id: SessionId,
        turn_id: TurnId,
        timestamp: DateTime<Utc>,
        tool_use_id: ToolUseId,
        tool_name: String,
        arguments: String,
    },
    #[serde(rename = "toolResult")]
    ToolResult {
        session_id: SessionId,
        turn_id: TurnId,
        timestamp: DateTime<Utc>,
        tool_use_id: ToolUseId,
        output: String,
        success: bool,
        duration_secs: f64,
        exit_code: Option<i32>,
    },
    #[serde(rename = "approvalRequired")]
    ApprovalRequired {
        session_id: SessionId,
        turn_id: TurnId,
        timestamp: DateTime<Utc>,
        approval_id: ApprovalId,
        tool_name: String,
        arguments: String,
        operation_description: String,
        risk_level: RiskLevel,
    },
    #[serde(rename = "approvalResolved")]
    ApprovalResolved {
        session_id: SessionId,
        turn_id: TurnId,
        timestamp: DateTime<Utc>,
        approval_id: ApprovalId,
        decision: PermissionResponse,
    },
    #[serde(rename = "warning")]
    Warning {
        session_id: SessionId,
        turn_id: TurnId,
        timestamp: DateTime<Utc>,
        message: String,
    },
    #[serde(rename = "error")]
    Error {
        session_id: SessionId,
        turn_id: TurnId,
        timestamp: DateTime<Utc>,
        message: String,
        is_fatal: bool,
    },
    #[serde(rename = "runCompleted")]
    RunCompleted {
        session_id: SessionId,
        turn_id: TurnId,
        timestamp: DateTime<Utc>,
        status: TurnStatus,
    },
}

impl RunEvent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            RunEvent::RunStarted { session_id, .. }
            | RunEvent::TokenDelta { session_id, .. }
            | RunEvent::ToolCall { session_id, .. }
            | RunEvent::ToolResult { session_id, .. }
            | RunEvent::ApprovalRequired { session_id, .. }
            | RunEvent::ApprovalResolved { session_id, .. }
            | RunEvent::Warning { session_id, .. }
            | RunEvent::Error { session_id, .. }
            | RunEvent::RunCompleted { session_id, .. } => session_id,
        }
    }

    pub fn turn_id(&self) -> &TurnId {
        match self {
            RunEvent::RunStarted { turn_id, .. }
            | RunEvent::TokenDelta { turn_id, .. }
            | RunEvent::ToolCall { turn_id, .. }
            | RunEvent::ToolResult { turn_id, .. }
            | RunEvent::ApprovalRequired { turn_id, .. }
            | RunEvent::ApprovalResolved { turn_id, .. }
            | RunEvent::Warning { turn_id, .. }
            | RunEvent::Error { turn_id, .. }
            | RunEvent::RunCompleted { turn_id, .. } => turn_id,
        }
    }
}

/// Terminal summary of a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub status: TurnStatus,
    pub final_output: Option<String>,
    pub usage: Option<crate::context_usage::ContextUsage>,
    pub tool_trace: Vec<ToolTrace>,
    pub error: Option<String>,
    pub duration_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> RunEvent {
        RunEvent::TokenDelta {
            session_id: SessionId::new("s1"),
            turn_id: TurnId::new("t1"),
            timestamp: Utc::now(),
            delta: "a".into(),
            accumulated: "a".into(),
            is_complete: false,
        }
    }

    #[test]
    fn round_trips_through_json() {
        // decode(encode(e)) == e must hold for every RunEvent variant.
        let event = sample_event();
        let encoded = serde_json::to_string(&event).unwrap();
        let decoded: RunEvent = serde_json::from_str(&encoded).unwrap();
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::to_value(&decoded).unwrap()
        );
    }

    #[test]
    fn wire_tag_is_kebab_not_pascal() {
        let event = RunEvent::RunStarted {
            session_id: SessionId::new("s1"),
            turn_id: TurnId::new("t1"),
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "runStarted");
        assert!(value.get("payload").is_some());
    }
}
