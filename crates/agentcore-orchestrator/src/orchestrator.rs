//! The Session Orchestrator: a turn-based conversation driver with
//! cancellation and idempotency, built from two tasks connected by a
//! bounded channel - a receive side and a turn-processing side, kept
//! deliberately separate so draining input never blocks on turn execution.
//! Cancellation and idempotency are turn-scoped rather than session-scoped;
//! see [`crate::cancel`].

use crate::approval::TransportApprovalHandler;
use crate::cancel::CancelRegistry;
use crate::gate::TurnGate;
use crate::idempotency::CompletedTurns;
use crate::transport::Transport;
use agentcore_pipeline::Step;
use agentcore_types::{
    scope, EventSink, RequestInput, RunEvent, RunRequest, RunResult, SessionId, TransportError,
    TurnContext, TurnId, TurnStatus, TurnTraceBuffer,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Receives the `RunResult` a turn produces at termination. The orchestrator
/// always builds one; a sink gives it a real consumer beyond the streamed
/// `RunEvent`s (e.g. persisting `tool_trace` for audit, or surfacing `usage`
/// to a caller that doesn't want to reconstruct it from events).
#[async_trait::async_trait]
pub trait ResultSink: Send + Sync {
    async fn handle_result(&self, result: RunResult);
}

/// Default bound on how many dispatched-but-not-yet-started turns may queue
/// up between the receive loop and the turn processor.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Default size of one generation in [`CancelRegistry`]/[`CompletedTurns`].
pub const DEFAULT_GENERATION_CAPACITY: usize = 10_000;

/// Everything a turn needs to run the user-supplied pipeline: the raw text
/// plus whatever context the request carried.
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub session_id: SessionId,
    pub turn_id: TurnId,
    pub text: String,
    pub context: Option<TurnContext>,
}

struct ChannelSink {
    tx: mpsc::UnboundedSender<RunEvent>,
}

#[async_trait::async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, event: RunEvent) {
        let _ = self.tx.send(event);
    }
}

pub struct SessionOrchestrator {
    transport: Arc<dyn Transport>,
    pipeline: Arc<dyn Step<TurnInput, String>>,
    cancel_registry: CancelRegistry,
    completed_turns: CompletedTurns,
    gate: Option<Arc<TurnGate>>,
    transport_approval: Option<Arc<TransportApprovalHandler>>,
    result_sink: Option<Arc<dyn ResultSink>>,
    channel_capacity: usize,
}

impl SessionOrchestrator {
    /// Cancels a turn by id, out of band from whatever the transport itself
    /// delivers - e.g. a `Ctrl-C` handler that can't wait for a gated
    /// console transport to let a `Cancel` request through.
    pub fn cancel(&self, turn_id: &TurnId) {
        self.cancel_registry.cancel(turn_id);
    }

    /// Runs the orchestrator to completion: starts the turn processor,
    /// drives the receive loop until the transport's input closes, then
    /// waits for any in-flight turn to finish before returning.
    pub async fn run(self: Arc<Self>) {
        let (turn_tx, turn_rx) = mpsc::channel::<(RunRequest, String)>(self.channel_capacity);

        let processor = tokio::spawn({
            let this = self.clone();
            async move { this.turn_processor(turn_rx).await }
        });

        self.receive_loop(turn_tx).await;

        if let Err(e) = processor.await {
            warn!(error = %e, "turn processor task panicked");
        }
    }

    async fn receive_loop(&self, turn_tx: mpsc::Sender<(RunRequest, String)>) {
        loop {
            if let Some(gate) = &self.gate {
                gate.wait_if_needed().await;
            }
            match self.transport.receive().await {
                Ok(request) => self.handle_request(request, &turn_tx).await,
                Err(TransportError::InputClosed) => {
                    info!("transport input closed, receive loop shutting down");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "transport receive error, continuing");
                }
            }
        }
        drop(turn_tx);
    }

    async fn handle_request(&self, request: RunRequest, turn_tx: &mpsc::Sender<(RunRequest, String)>) {
        if self.completed_turns.is_terminal(&request.turn_id) {
            debug!(turn_id = %request.turn_id, "dropping request for an already-terminal turn");
            return;
        }

        match &request.input {
            RequestInput::Text(text) => {
                let text = text.clone();
                if turn_tx.send((request, text)).await.is_err() {
                    warn!("turn processor channel closed while dispatching a turn");
                }
            }
            RequestInput::ApprovalResponse { approval_id, decision } => match &self.transport_approval {
                Some(handler) => {
                    handler.resolve(approval_id, *decision);
                }
                None => {
                    let _ = self
                        .transport
                        .send(RunEvent::Warning {
                            session_id: request.session_id.clone(),
                            turn_id: request.turn_id.clone(),
                            timestamp: Utc::now(),
                            message: "no transport approval handler configured; response dropped".into(),
                        })
                        .await;
                }
            },
            RequestInput::Cancel => {
                self.cancel_registry.cancel(&request.turn_id);
            }
        }
    }

    async fn turn_processor(&self, mut turn_rx: mpsc::Receiver<(RunRequest, String)>) {
        while let Some((request, text)) = turn_rx.recv().await {
            if let Some(gate) = &self.gate {
                gate.enter_turn();
            }
            self.execute_turn(request, text).await;
            if let Some(gate) = &self.gate {
                gate.leave_turn();
            }
        }

        if let Some(handler) = &self.transport_approval {
            handler.reject_all();
        }
        self.transport.close().await;
    }

    /// The turn-execution algorithm.
    async fn execute_turn(&self, request: RunRequest, text: String) {
        let RunRequest { session_id, turn_id, context, .. } = request;

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RunEvent>();
        let transport = self.transport.clone();
        let forward = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                if transport.send(event).await.is_err() {
                    // output closed; the turn keeps running to completion,
                    // its remaining events are simply dropped on the floor.
                    while event_rx.recv().await.is_some() {}
                    break;
                }
            }
        });
        let sink: Arc<dyn EventSink> = Arc::new(ChannelSink { tx: event_tx.clone() });

        sink.emit(RunEvent::RunStarted {
            session_id: session_id.clone(),
            turn_id: turn_id.clone(),
            timestamp: Utc::now(),
        })
        .await;

        let cancel = self.cancel_registry.start_turn(&turn_id);
        let input = TurnInput { session_id: session_id.clone(), turn_id: turn_id.clone(), text, context };
        let trace_buffer = Arc::new(TurnTraceBuffer::new());

        let pipeline = self.pipeline.clone();
        let started = Instant::now();
        let result = scope::with_turn_scope(
            cancel,
            (session_id.clone(), turn_id.clone()),
            trace_buffer.clone(),
            async move { pipeline.run(input).await },
        )
        .await;
        let duration_secs = started.elapsed().as_secs_f64();
        let tool_trace = trace_buffer.drain().await;

        let (status, final_output, error) = match result {
            Ok(final_text) => {
                if !final_text.is_empty() {
                    sink.emit(RunEvent::TokenDelta {
                        session_id: session_id.clone(),
                        turn_id: turn_id.clone(),
                        timestamp: Utc::now(),
                        delta: final_text.clone(),
                        accumulated: final_text.clone(),
                        is_complete: true,
                    })
                    .await;
                }
                self.completed_turns.record(turn_id.clone());
                self.cancel_registry.complete_turn(&turn_id);
                (TurnStatus::Completed, Some(final_text), None)
            }
            Err(e) if e.is_cancellation() => {
                // no completed_turns.record, no cancel_registry.complete_turn:
                // the token stays as a sentinel and a retry is still allowed.
                (TurnStatus::Cancelled, None, None)
            }
            Err(e) => {
                sink.emit(RunEvent::Error {
                    session_id: session_id.clone(),
                    turn_id: turn_id.clone(),
                    timestamp: Utc::now(),
                    message: e.to_string(),
                    is_fatal: true,
                })
                .await;
                self.completed_turns.record(turn_id.clone());
                self.cancel_registry.complete_turn(&turn_id);
                (TurnStatus::Failed, None, Some(e.to_string()))
            }
        };

        sink.emit(RunEvent::RunCompleted {
            session_id: session_id.clone(),
            turn_id: turn_id.clone(),
            timestamp: Utc::now(),
            status,
        })
        .await;

        if let Some(result_sink) = &self.result_sink {
            result_sink
                .handle_result(RunResult { status, final_output, usage: None, tool_trace, error, duration_secs })
                .await;
        }

        drop(event_tx);
        let _ = forward.await;
    }
}

pub struct SessionOrchestratorBuilder {
    transport: Arc<dyn Transport>,
    pipeline: Arc<dyn Step<TurnInput, String>>,
    gate: Option<Arc<TurnGate>>,
    transport_approval: Option<Arc<TransportApprovalHandler>>,
    result_sink: Option<Arc<dyn ResultSink>>,
    channel_capacity: usize,
    generation_capacity: usize,
}

impl SessionOrchestratorBuilder {
    pub fn new(transport: Arc<dyn Transport>, pipeline: Arc<dyn Step<TurnInput, String>>) -> Self {
        let gate = if transport.supports_background_receive() {
            None
        } else {
            Some(Arc::new(TurnGate::new()))
        };
        Self {
            transport,
            pipeline,
            gate,
            transport_approval: None,
            result_sink: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            generation_capacity: DEFAULT_GENERATION_CAPACITY,
        }
    }

    pub fn with_transport_approval(mut self, handler: Arc<TransportApprovalHandler>) -> Self {
        self.transport_approval = Some(handler);
        self
    }

    pub fn with_result_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.result_sink = Some(sink);
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn generation_capacity(mut self, capacity: usize) -> Self {
        self.generation_capacity = capacity;
        self
    }

    pub fn build(self) -> SessionOrchestrator {
        SessionOrchestrator {
            transport: self.transport,
            pipeline: self.pipeline,
            cancel_registry: CancelRegistry::new(self.generation_capacity),
            completed_turns: CompletedTurns::new(self.generation_capacity),
            gate: self.gate,
            transport_approval: self.transport_approval,
            result_sink: self.result_sink,
            channel_capacity: self.channel_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_types::Error;
    use std::sync::Mutex;
    use tokio::sync::Mutex as AsyncMutex;

    struct MockTransport {
        requests: Mutex<Vec<RunRequest>>,
        events: AsyncMutex<Vec<RunEvent>>,
        closed: std::sync::atomic::AtomicBool,
    }

    impl MockTransport {
        fn new(requests: Vec<RunRequest>) -> Self {
            Self { requests: Mutex::new(requests), events: AsyncMutex::new(Vec::new()), closed: std::sync::atomic::AtomicBool::new(false) }
        }
    }

    #[async_trait::async_trait]
    impl Transport for MockTransport {
        fn supports_background_receive(&self) -> bool {
            true
        }

        async fn receive(&self) -> Result<RunRequest, TransportError> {
            let mut requests = self.requests.lock().unwrap();
            if requests.is_empty() {
                Err(TransportError::InputClosed)
            } else {
                Ok(requests.remove(0))
            }
        }

        async fn send(&self, event: RunEvent) -> Result<(), TransportError> {
            self.events.lock().await.push(event);
            Ok(())
        }

        async fn close_input(&self) {}

        async fn close(&self) {
            self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    struct Echo;
    #[async_trait::async_trait]
    impl Step<TurnInput, String> for Echo {
        async fn run(&self, input: TurnInput) -> Result<String, Error> {
            Ok(format!("echo: {}", input.text))
        }
    }

    #[tokio::test]
    async fn runs_a_single_turn_to_completion() {
        let request = RunRequest::text(SessionId::new("s1"), TurnId::new("t1"), "hello");
        let transport = Arc::new(MockTransport::new(vec![request]));
        let orchestrator = Arc::new(
            SessionOrchestratorBuilder::new(transport.clone(), Arc::new(Echo)).build(),
        );
        orchestrator.run().await;

        let events = transport.events.lock().await;
        assert!(matches!(events[0], RunEvent::RunStarted { .. }));
        assert!(matches!(events.last().unwrap(), RunEvent::RunCompleted { status: TurnStatus::Completed, .. }));
        assert!(events.iter().any(|e| matches!(e, RunEvent::TokenDelta { delta, .. } if delta == "echo: hello")));
        assert!(transport.closed.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn duplicate_turn_id_is_dropped_after_completion() {
        let turn_id = TurnId::new("t1");
        let first = RunRequest::text(SessionId::new("s1"), turn_id.clone(), "a");
        let duplicate = RunRequest::text(SessionId::new("s1"), turn_id.clone(), "b");
        let transport = Arc::new(MockTransport::new(vec![first, duplicate]));
        let orchestrator = Arc::new(
            SessionOrchestratorBuilder::new(transport.clone(), Arc::new(Echo)).build(),
        );
        orchestrator.run().await;

        let events = transport.events.lock().await;
        let completed = events
            .iter()
            .filter(|e| matches!(e, RunEvent::RunCompleted { .. }))
            .count();
        assert_eq!(completed, 1, "the duplicate turn_id must not be re-executed");
    }

    #[tokio::test]
    async fn approval_response_without_handler_emits_warning() {
        let request = RunRequest {
            session_id: SessionId::new("s1"),
            turn_id: TurnId::new("t1"),
            input: RequestInput::ApprovalResponse {
                approval_id: agentcore_types::ApprovalId::new("ap1"),
                decision: agentcore_types::PermissionResponse::Deny,
            },
            context: None,
            policy: None,
            metadata: None,
        };
        let transport = Arc::new(MockTransport::new(vec![request]));
        let orchestrator = Arc::new(
            SessionOrchestratorBuilder::new(transport.clone(), Arc::new(Echo)).build(),
        );
        orchestrator.run().await;

        let events = transport.events.lock().await;
        assert!(events.iter().any(|e| matches!(e, RunEvent::Warning { .. })));
    }

    struct CollectingResultSink {
        results: AsyncMutex<Vec<RunResult>>,
    }

    #[async_trait::async_trait]
    impl ResultSink for CollectingResultSink {
        async fn handle_result(&self, result: RunResult) {
            self.results.lock().await.push(result);
        }
    }

    #[tokio::test]
    async fn completed_turn_surfaces_a_run_result_with_final_output() {
        let request = RunRequest::text(SessionId::new("s1"), TurnId::new("t1"), "hello");
        let transport = Arc::new(MockTransport::new(vec![request]));
        let sink = Arc::new(CollectingResultSink { results: AsyncMutex::new(Vec::new()) });
        let orchestrator = Arc::new(
            SessionOrchestratorBuilder::new(transport.clone(), Arc::new(Echo))
                .with_result_sink(sink.clone())
                .build(),
        );
        orchestrator.run().await;

        let results = sink.results.lock().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, TurnStatus::Completed);
        assert_eq!(results[0].final_output.as_deref(), Some("echo: hello"));
        assert!(results[0].tool_trace.is_empty());
        assert!(results[0].error.is_none());
    }

    struct AlwaysFails;
    #[async_trait::async_trait]
    impl Step<TurnInput, String> for AlwaysFails {
        async fn run(&self, _input: TurnInput) -> Result<String, Error> {
            Err(Error::Internal("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn failed_turn_surfaces_a_run_result_with_the_error() {
        let request = RunRequest::text(SessionId::new("s1"), TurnId::new("t1"), "hello");
        let transport = Arc::new(MockTransport::new(vec![request]));
        let sink = Arc::new(CollectingResultSink { results: AsyncMutex::new(Vec::new()) });
        let orchestrator = Arc::new(
            SessionOrchestratorBuilder::new(transport.clone(), Arc::new(AlwaysFails))
                .with_result_sink(sink.clone())
                .build(),
        );
        orchestrator.run().await;

        let results = sink.results.lock().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, TurnStatus::Failed);
        assert!(results[0].error.is_some());
    }
}
