//! Tool invocation context and audit trace.

use crate::ids::{SessionId, ToolUseId, TurnId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Input to the middleware pipeline for one tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolContext {
    pub session_id: Option<SessionId>,
    pub turn_id: Option<TurnId>,
    pub tool_use_id: Option<ToolUseId>,
    pub tool_name: String,
    /// Arguments as a JSON string, parsed to `serde_json::Value` lazily by
    /// middleware that needs structure.
    pub arguments: String,
}

impl ToolContext {
    pub fn arguments_value(&self) -> serde_json::Value {
        serde_json::from_str(&self.arguments).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolDecision {
    Allowed,
    Denied,
    FinalDenied,
    ApprovedByUser,
    DeniedByUser,
    TransportDenied,
}

/// Audit record produced once per tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolTrace {
    pub tool_use_id: ToolUseId,
    pub tool_name: String,
    /// 16 hex characters of the SHA-256 digest of the argument string.
    pub arguments_digest: String,
    pub decision: ToolDecision,
    pub duration_secs: Option<f64>,
    pub exit_code: Option<i32>,
    pub timestamp: DateTime<Utc>,
}

/// 16-hex-char SHA-256 digest of a tool call's argument string. An
/// audit-trail fingerprint, not a security boundary, but reuses `ring`'s
/// digest rather than hand-rolling the hash.
pub fn digest_arguments(arguments: &str) -> String {
    let digest = ring::digest::digest(&ring::digest::SHA256, arguments.as_bytes());
    digest.as_ref()[..8]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_arguments_is_16_hex_chars() {
        let d = digest_arguments(r#"{"command":"ls"}"#);
        assert_eq!(d.len(), 16);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
