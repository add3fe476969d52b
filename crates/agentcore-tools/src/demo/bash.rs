//! Demo shell tool, with SIGTERM-then-SIGKILL timeout/cancellation
//! escalation: on timeout or cancellation the child is sent SIGTERM first
//! and only killed outright if it is still alive after a short grace
//! window.
//!
//! This is an example tool, not a core subsystem — it exists so the CLI
//! binary has something real to route through the middleware pipeline.

use crate::middleware::sandbox::current_sandbox_config;
use crate::registry::{Tool, ToolResult};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct BashTool {
    workspace_root: PathBuf,
    default_timeout_secs: u64,
}

impl BashTool {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self { workspace_root: workspace_root.as_ref().to_path_buf(), default_timeout_secs: 120 }
    }
}

#[async_trait::async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a bash command in the workspace. Captures stdout and stderr."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "The bash command to execute" },
                "timeout": { "type": "integer", "description": "Timeout in seconds (default 120, max 86400)" }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        self.execute_cancellable(args, CancellationToken::new()).await
    }

    async fn execute_cancellable(&self, args: Value, cancel: CancellationToken) -> ToolResult {
        let command = match args["command"].as_str() {
            Some(c) => c,
            None => return ToolResult::error("Missing required parameter: command"),
        };

        let configured_timeout = current_sandbox_config()
            .map(|c| c.timeout_secs)
            .unwrap_or(self.default_timeout_secs);
        let timeout_secs = args["timeout"].as_u64().unwrap_or(configured_timeout).min(86_400);

        debug!("bash: {}", &command[..command.len().min(80)]);

        let mut child = match Command::new("bash")
            .arg("-c")
            .arg(command)
            .current_dir(&self.workspace_root)
            .kill_on_drop(true)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return ToolResult::error(format!("Failed to spawn: {}", e)),
        };

        let timeout_duration = Duration::from_secs(timeout_secs);

        tokio::select! {
            result = tokio::time::timeout(timeout_duration, child.wait()) => {
                match result {
                    Ok(Ok(status)) => {
                        let stdout = read_pipe(child.stdout.take()).await;
                        let stderr = read_pipe(child.stderr.take()).await;
                        format_output(status, &stdout, &stderr)
                    }
                    Ok(Err(e)) => ToolResult::error(format!("Failed to wait: {}", e)),
                    Err(_) => {
                        escalate_kill(&mut child).await;
                        ToolResult::error(format!("Command timed out after {}s", timeout_secs))
                    }
                }
            }
            _ = cancel.cancelled() => {
                escalate_kill(&mut child).await;
                ToolResult::text("[process killed by interrupt]")
            }
        }
    }
}

/// SIGTERM first, then SIGKILL after a short grace period if the process is
/// still alive.
async fn escalate_kill(child: &mut tokio::process::Child) {
    if let Some(pid) = child.id() {
        send_signal(pid, Signal::Term);
        let graced = tokio::time::timeout(Duration::from_secs(2), child.wait()).await;
        if graced.is_err() {
            warn!(pid, "process ignored SIGTERM, escalating to SIGKILL");
            let _ = child.kill().await;
        }
    } else {
        let _ = child.kill().await;
    }
}

enum Signal {
    Term,
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: Signal) {
    // SAFETY: kill(2) on a pid owned by this process group; failure (e.g.
    // the process already exited) is not actionable here.
    let sig = match signal {
        Signal::Term => libc::SIGTERM,
    };
    unsafe {
        libc::kill(pid as libc::pid_t, sig);
    }
}

#[cfg(not(unix))]
fn send_signal(_pid: u32, _signal: Signal) {}

async fn read_pipe(pipe: Option<impl tokio::io::AsyncRead + Unpin>) -> String {
    use tokio::io::AsyncReadExt;
    match pipe {
        Some(mut p) => {
            let mut buf = Vec::new();
            let _ = p.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).to_string()
        }
        None => String::new(),
    }
}

fn format_output(status: std::process::ExitStatus, stdout: &str, stderr: &str) -> ToolResult {
    let result = if status.success() {
        if stderr.is_empty() {
            stdout.trim().to_string()
        } else {
            format!("{}\n{}", stdout.trim(), stderr.trim())
        }
    } else {
        format!("Exit code: {}\n{}\n{}", status.code().unwrap_or(-1), stdout.trim(), stderr.trim())
    };

    if result.is_empty() {
        ToolResult::text("(no output)")
    } else if result.len() > 30_000 {
        ToolResult::text(format!("{}\n... [truncated, {} total chars]", &result[..30_000], result.len()))
    } else {
        ToolResult::text(result)
    }
}
