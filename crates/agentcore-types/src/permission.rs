//! Permission configuration data model.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A permission rule pattern: `ToolName[(argument_pattern)]`.
///
/// `*` is a wildcard in tool names; inside an argument pattern, `prefix:*`
/// matches the prefix exactly or followed by one of
/// `[space, -, \t, ;, |, &, \n, /]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRule {
    pub tool_pattern: String,
    pub argument_pattern: Option<String>,
}

impl PermissionRule {
    pub fn new(tool_pattern: impl Into<String>, argument_pattern: Option<String>) -> Self {
        Self { tool_pattern: tool_pattern.into(), argument_pattern }
    }

    pub fn tool_only(tool_pattern: impl Into<String>) -> Self {
        Self::new(tool_pattern, None)
    }

    /// Parses the `ToolName(pattern)` textual form used in configuration files.
    pub fn parse(src: &str) -> Self {
        if let Some(open) = src.find('(') {
            if let Some(close) = src.rfind(')') {
                if close > open {
                    let tool = &src[..open];
                    let arg = &src[open + 1..close];
                    return Self::new(tool.to_string(), Some(arg.to_string()));
                }
            }
        }
        Self::tool_only(src.to_string())
    }

    /// Renders back to the textual rule form, used when recording which
    /// rule matched.
    pub fn display(&self) -> String {
        match &self.argument_pattern {
            Some(arg) => format!("{}({})", self.tool_pattern, arg),
            None => self.tool_pattern.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DefaultAction {
    Allow,
    Deny,
    Ask,
}

/// Decision returned by an approval handler in response to an `Ask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionResponse {
    AllowOnce,
    AlwaysAllow,
    Deny,
    DenyAndBlock,
}

/// Session memory: the pair of string sets keyed by
/// `tool_name + ":" + (first word of command | directory of path | ε)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMemory {
    pub always_allowed: HashSet<String>,
    pub blocked: HashSet<String>,
}

impl SessionMemory {
    pub fn is_always_allowed(&self, key: &str) -> bool {
        self.always_allowed.contains(key)
    }

    pub fn is_blocked(&self, key: &str) -> bool {
        self.blocked.contains(key)
    }

    pub fn record(&mut self, key: String, response: PermissionResponse) {
        match response {
            PermissionResponse::AlwaysAllow => {
                self.blocked.remove(&key);
                self.always_allowed.insert(key);
            }
            PermissionResponse::DenyAndBlock => {
                self.always_allowed.remove(&key);
                self.blocked.insert(key);
            }
            PermissionResponse::AllowOnce | PermissionResponse::Deny => {}
        }
    }
}

/// `{ allow[], deny[], finalDeny[], overrides[], default_action, enable_session_memory }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionConfiguration {
    pub allow: Vec<PermissionRule>,
    pub deny: Vec<PermissionRule>,
    #[serde(rename = "finalDeny")]
    pub final_deny: Vec<PermissionRule>,
    pub overrides: Vec<PermissionRule>,
    pub default_action: DefaultAction,
    pub enable_session_memory: bool,
}

impl Default for PermissionConfiguration {
    fn default() -> Self {
        Self {
            allow: Vec::new(),
            deny: Vec::new(),
            final_deny: Vec::new(),
            overrides: Vec::new(),
            default_action: DefaultAction::Ask,
            enable_session_memory: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}
