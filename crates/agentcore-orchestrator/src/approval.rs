//! Routing `ApprovalResponse` requests back to the `ApprovalHandler` call
//! that is waiting on them.
//!
//! `PermissionMiddleware` already emits `ApprovalRequired`/`ApprovalResolved`
//! around its call to whichever `ApprovalHandler` it holds
//! (`agentcore-tools::middleware::permission`), so `TransportApprovalHandler`
//! only has to suspend the call and resolve it when a matching response
//! arrives over the transport - it does not emit anything itself, which
//! would otherwise double up those events.

use agentcore_tools::{ApprovalHandler, ApprovalRequest};
use agentcore_types::{ApprovalId, PermissionResponse};
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::oneshot;

pub struct TransportApprovalHandler {
    waiters: DashMap<ApprovalId, oneshot::Sender<PermissionResponse>>,
}

impl Default for TransportApprovalHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportApprovalHandler {
    pub fn new() -> Self {
        Self { waiters: DashMap::new() }
    }

    /// Called by the orchestrator when a `RequestInput::ApprovalResponse`
    /// arrives. Returns `false` if no call is waiting on that id (it may
    /// have already timed out, or the id may be unknown).
    pub fn resolve(&self, approval_id: &ApprovalId, decision: PermissionResponse) -> bool {
        match self.waiters.remove(approval_id) {
            Some((_, tx)) => tx.send(decision).is_ok(),
            None => false,
        }
    }

    /// Rejects every pending approval with `Deny`, used during shutdown so
    /// a tool call blocked on human input doesn't hang the turn forever.
    pub fn reject_all(&self) {
        let pending: Vec<ApprovalId> = self.waiters.iter().map(|entry| entry.key().clone()).collect();
        for approval_id in pending {
            if let Some((_, tx)) = self.waiters.remove(&approval_id) {
                let _ = tx.send(PermissionResponse::Deny);
            }
        }
    }
}

#[async_trait]
impl ApprovalHandler for TransportApprovalHandler {
    async fn request_approval(&self, request: ApprovalRequest) -> PermissionResponse {
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(request.approval_id.clone(), tx);
        rx.await.unwrap_or(PermissionResponse::Deny)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_types::RiskLevel;

    fn request(id: &str) -> ApprovalRequest {
        ApprovalRequest {
            approval_id: ApprovalId::new(id),
            tool_name: "bash".into(),
            arguments: "rm -rf /tmp/x".into(),
            operation_description: "delete a file".into(),
            risk_level: RiskLevel::Medium,
        }
    }

    #[tokio::test]
    async fn resolve_delivers_the_decision() {
        let handler = std::sync::Arc::new(TransportApprovalHandler::new());
        let waiting = tokio::spawn({
            let handler = handler.clone();
            async move { handler.request_approval(request("ap_1")).await }
        });
        tokio::task::yield_now().await;
        assert!(handler.resolve(&ApprovalId::new("ap_1"), PermissionResponse::AllowOnce));
        assert_eq!(waiting.await.unwrap(), PermissionResponse::AllowOnce);
    }

    #[tokio::test]
    async fn resolve_unknown_id_is_a_no_op() {
        let handler = TransportApprovalHandler::new();
        assert!(!handler.resolve(&ApprovalId::new("missing"), PermissionResponse::Deny));
    }

    #[tokio::test]
    async fn reject_all_denies_every_pending_waiter() {
        let handler = std::sync::Arc::new(TransportApprovalHandler::new());
        let a = tokio::spawn({
            let handler = handler.clone();
            async move { handler.request_approval(request("ap_a")).await }
        });
        let b = tokio::spawn({
            let handler = handler.clone();
            async move { handler.request_approval(request("ap_b")).await }
        });
        tokio::task::yield_now().await;
        handler.reject_all();
        assert_eq!(a.await.unwrap(), PermissionResponse::Deny);
        assert_eq!(b.await.unwrap(), PermissionResponse::Deny);
    }
}
