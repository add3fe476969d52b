//! Sandbox middleware: for shell-class tools only, injects the
//! effective sandbox configuration via a task-local binding so the concrete
//! tool executes under it - `kill_on_drop`, manual pipe reading, cancellation
//! racing, and a SIGTERM-then-SIGKILL escalation on timeout or cancellation.

use super::{Next, ToolMiddleware};
use crate::registry::ToolResult;
use agentcore_types::{SandboxConfig, ToolContext};
use async_trait::async_trait;
use std::collections::HashSet;

tokio::task_local! {
    pub static SANDBOX_CONFIG: SandboxConfig;
}

/// Reads the sandbox configuration bound for the current task, if any.
/// Concrete shell-class tools call this instead of receiving the config as
/// an explicit parameter.
pub fn current_sandbox_config() -> Option<SandboxConfig> {
    SANDBOX_CONFIG.try_with(Clone::clone).ok()
}

pub struct SandboxMiddleware {
    shell_class_tools: HashSet<String>,
    default_config: SandboxConfig,
    guardrail_override: tokio::sync::RwLock<Option<SandboxConfig>>,
}

impl SandboxMiddleware {
    pub fn new(shell_class_tools: impl IntoIterator<Item = String>, default_config: SandboxConfig) -> Self {
        Self {
            shell_class_tools: shell_class_tools.into_iter().collect(),
            default_config,
            guardrail_override: tokio::sync::RwLock::new(None),
        }
    }

    pub async fn set_guardrail_override(&self, config: Option<SandboxConfig>) {
        *self.guardrail_override.write().await = config;
    }

    async fn effective_config(&self) -> SandboxConfig {
        match &*self.guardrail_override.read().await {
            Some(config) => clone_config(config),
            None => clone_config(&self.default_config),
        }
    }
}

fn clone_config(c: &SandboxConfig) -> SandboxConfig {
    SandboxConfig {
        network_policy: c.network_policy,
        file_policy: c.file_policy.clone(),
        allow_subprocesses: c.allow_subprocesses,
        timeout_secs: c.timeout_secs,
    }
}

#[async_trait]
impl ToolMiddleware for SandboxMiddleware {
    async fn handle(&self, ctx: ToolContext, next: Next<'_>) -> Result<ToolResult, agentcore_types::Error> {
        if !self.shell_class_tools.contains(&ctx.tool_name) {
            return next.call(ctx).await;
        }

        let config = self.effective_config().await;
        if config.is_disabled() {
            return next.call(ctx).await;
        }

        if let Err(reason) = config.validated_timeout_secs() {
            return Err(agentcore_types::SandboxError(reason).into());
        }

        SANDBOX_CONFIG.scope(config, next.call(ctx)).await
    }
}
