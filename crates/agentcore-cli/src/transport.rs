//! A console `Transport` over stdin/stdout, the concrete case that forces
//! `supports_background_receive = false`: the same stdin byte stream also
//! backs any interactive approval prompt the tool middleware pipeline
//! raises mid-turn, so the orchestrator's `TurnGate` must hold the receive
//! loop off it for the duration of a turn.
//!
//! Reading happens on a single background task so a stdin line typed while
//! the gate is closed queues instead of blocking the task that owns it -
//! deliberately the *only* reader of stdin, so an approval prompt can never
//! race the ordinary input loop for the next typed line. `send` tracks the
//! most recent unresolved `approvalRequired` it rendered; while one is
//! outstanding, the next line out of the queue is parsed as the operator's
//! decision and surfaced as `RequestInput::ApprovalResponse` instead of
//! ordinary text. Writing renders each `RunEvent` as one formatted line, so
//! the operator always has at least a readable line-oriented view of it.

use agentcore_orchestrator::Transport;
use agentcore_types::{ApprovalId, PermissionResponse, RequestInput, RunEvent, RunRequest, SessionId, TransportError, TurnId};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

pub struct StdioTransport {
    session_id: SessionId,
    lines: StdMutex<mpsc::Receiver<String>>,
    next_turn: AtomicU64,
    last_turn: StdMutex<Option<TurnId>>,
    pending_approval: StdMutex<Option<ApprovalId>>,
}

impl StdioTransport {
    pub fn new(session_id: SessionId) -> Self {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let mut reader = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
        });
        Self {
            session_id,
            lines: StdMutex::new(rx),
            next_turn: AtomicU64::new(0),
            last_turn: StdMutex::new(None),
            pending_approval: StdMutex::new(None),
        }
    }

    /// The `turn_id` most recently handed to the orchestrator, if one is
    /// outstanding - used by a `Ctrl-C` handler to target a cancellation
    /// without waiting for the gate to open.
    pub fn current_turn_id(&self) -> Option<TurnId> {
        self.last_turn.lock().unwrap().clone()
    }

    fn next_turn_id(&self) -> TurnId {
        let n = self.next_turn.fetch_add(1, Ordering::SeqCst);
        TurnId::new(format!("turn-{n}"))
    }

    fn parse_decision(line: &str) -> PermissionResponse {
        match line.trim().to_ascii_lowercase().as_str() {
            "allow-once" | "allow" | "a" => PermissionResponse::AllowOnce,
            "always-allow" | "always" => PermissionResponse::AlwaysAllow,
            "deny-and-block" | "block" => PermissionResponse::DenyAndBlock,
            _ => PermissionResponse::Deny,
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    fn supports_background_receive(&self) -> bool {
        false
    }

    async fn receive(&self) -> Result<RunRequest, TransportError> {
        let line = {
            let mut rx = self.lines.lock().unwrap();
            rx.recv().await
        };
        let text = match line {
            Some(text) if text.trim() == "/exit" => return Err(TransportError::InputClosed),
            Some(text) => text,
            None => return Err(TransportError::InputClosed),
        };

        let pending = self.pending_approval.lock().unwrap().take();
        if let Some(approval_id) = pending {
            let turn_id = self.current_turn_id().unwrap_or_else(|| TurnId::new("approval"));
            return Ok(RunRequest {
                session_id: self.session_id.clone(),
                turn_id,
                input: RequestInput::ApprovalResponse { approval_id, decision: Self::parse_decision(&text) },
                context: None,
                policy: None,
                metadata: None,
            });
        }

        let turn_id = self.next_turn_id();
        *self.last_turn.lock().unwrap() = Some(turn_id.clone());
        Ok(RunRequest::text(self.session_id.clone(), turn_id, text))
    }

    async fn send(&self, event: RunEvent) -> Result<(), TransportError> {
        match &event {
            RunEvent::ApprovalRequired { approval_id, .. } => {
                *self.pending_approval.lock().unwrap() = Some(approval_id.clone());
            }
            RunEvent::ApprovalResolved { .. } => {
                *self.pending_approval.lock().unwrap() = None;
            }
            _ => {}
        }

        let line = render(&event);
        if line.is_empty() {
            return Ok(());
        }
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(|e| TransportError::Encoding(e.to_string()))?;
        stdout.flush().await.map_err(|e| TransportError::Encoding(e.to_string()))
    }

    async fn close_input(&self) {}

    async fn close(&self) {
        let mut stdout = tokio::io::stdout();
        let _ = stdout.write_all(b"[session closed]\n").await;
        let _ = stdout.flush().await;
    }
}

fn render(event: &RunEvent) -> String {
    match event {
        RunEvent::RunStarted { .. } => "...".to_string(),
        RunEvent::TokenDelta { delta, is_complete, .. } if *is_complete => delta.clone(),
        RunEvent::TokenDelta { .. } => String::new(),
        RunEvent::ToolCall { tool_name, arguments, .. } => format!("  [tool] {tool_name} {arguments}"),
        RunEvent::ToolResult { output, success, .. } => {
            format!("  [tool {}] {output}", if *success { "ok" } else { "failed" })
        }
        RunEvent::ApprovalRequired { tool_name, operation_description, .. } => {
            format!(
                "  [approval required] {tool_name}: {operation_description}\n  [allow-once/always-allow/deny/deny-and-block] > "
            )
        }
        RunEvent::ApprovalResolved { decision, .. } => format!("  [approval] {decision:?}"),
        RunEvent::Warning { message, .. } => format!("warning: {message}"),
        RunEvent::Error { message, .. } => format!("error: {message}"),
        RunEvent::RunCompleted { status, .. } => format!("[{status:?}]"),
    }
}
