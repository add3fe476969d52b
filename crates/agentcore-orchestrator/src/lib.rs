//! The Session Orchestrator: turn-based conversation driving with
//! strict per-`turn_id` serialization, idempotent dispatch, and two
//! generations of cancellation/completion memory.

pub mod approval;
pub mod cancel;
pub mod gate;
pub mod idempotency;
pub mod orchestrator;
pub mod transport;

pub use approval::TransportApprovalHandler;
pub use cancel::CancelRegistry;
pub use gate::TurnGate;
pub use idempotency::CompletedTurns;
pub use orchestrator::{
    ResultSink, SessionOrchestrator, SessionOrchestratorBuilder, TurnInput,
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_GENERATION_CAPACITY,
};
pub use transport::Transport;
