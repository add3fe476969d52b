//! Scoped (task-local) execution context.
//!
//! The orchestrator installs a fresh cancellation token, turn identity, and
//! audit-trace buffer once per turn via [`with_turn_scope`]; everything the
//! turn spawns - pipeline steps, tool middleware, nested tasks - reads it
//! back with [`current_cancel`]/[`current_identity`]/[`current_trace`]
//! instead of having it threaded through every call signature. Nothing below
//! the installation point ever mutates the binding - the same
//! `tokio::task_local!` idiom the sandbox middleware uses for its own
//! ambient configuration.
//!
//! Event sinks are deliberately not carried here: every sink-consuming type
//! built so far (`PermissionMiddleware`, `EventEmittingMiddleware`) takes
//! its sink as an explicit constructor argument, which keeps ownership
//! visible at the construction site. The trace buffer is different: it must
//! be both a *fresh instance per turn* (so one turn's audit trail never
//! leaks into another's `RunResult`) and *written to* from deep inside the
//! tool middleware chain without that chain knowing which turn it's in -
//! the same shape as the cancellation token, so it rides the same
//! task-local mechanism rather than the constructor-injection used for the
//! long-lived singletons.

use crate::ids::{SessionId, TurnId};
use crate::trace::TurnTraceBuffer;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

tokio::task_local! {
    static CURRENT_CANCEL: CancellationToken;
    static CURRENT_IDENTITY: (SessionId, TurnId);
    static CURRENT_TRACE: Arc<TurnTraceBuffer>;
}

/// Runs `fut` with `cancel`, `identity`, and `trace` bound as the current
/// turn's scoped context. Nesting is the only composition primitive
/// `tokio::task_local!` offers; all three bindings are installed before the
/// turn's step pipeline runs.
pub async fn with_turn_scope<F>(
    cancel: CancellationToken,
    identity: (SessionId, TurnId),
    trace: Arc<TurnTraceBuffer>,
    fut: F,
) -> F::Output
where
    F: std::future::Future,
{
    CURRENT_CANCEL
        .scope(
            cancel,
            CURRENT_IDENTITY.scope(identity, CURRENT_TRACE.scope(trace, fut)),
        )
        .await
}

/// The current turn's cancellation token, or a fresh (never-cancelled) one
/// if called outside any scope - e.g. in a unit test that exercises a step
/// directly.
pub fn current_cancel() -> CancellationToken {
    CURRENT_CANCEL.try_with(Clone::clone).unwrap_or_else(|_| CancellationToken::new())
}

/// `(session_id, turn_id)` for the turn currently executing, if any.
pub fn current_identity() -> Option<(SessionId, TurnId)> {
    CURRENT_IDENTITY.try_with(Clone::clone).ok()
}

/// The current turn's audit-trace buffer, if called from within a turn
/// scope. `None` outside one (e.g. a unit test driving tool middleware
/// directly), in which case recording a trace is simply skipped.
pub fn current_trace() -> Option<Arc<TurnTraceBuffer>> {
    CURRENT_TRACE.try_with(Clone::clone).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn outside_scope_returns_uncancelled_default() {
        assert!(!current_cancel().is_cancelled());
        assert!(current_identity().is_none());
        assert!(current_trace().is_none());
    }

    #[tokio::test]
    async fn scope_is_visible_to_nested_futures() {
        let cancel = CancellationToken::new();
        let identity = (SessionId::new("s1"), TurnId::new("t1"));
        let trace = Arc::new(TurnTraceBuffer::new());
        let observed = with_turn_scope(cancel.clone(), identity.clone(), trace.clone(), async {
            let inner = async { (current_cancel().is_cancelled(), current_identity(), current_trace().is_some()) };
            inner.await
        })
        .await;
        assert_eq!(observed, (false, Some(identity), true));
        cancel.cancel();
        assert!(cancel.is_cancelled());
    }
}
