//! Shared data types for the agent runtime core: requests, events, the
//! permission/sandbox configuration model, tool context and audit trace,
//! and the crate-wide error taxonomy.

pub mod context_usage;
pub mod error;
pub mod events;
pub mod ids;
pub mod permission;
pub mod sandbox;
pub mod scope;
pub mod sink;
pub mod tool;
pub mod trace;
pub mod transcript;

pub use context_usage::ContextUsage;
pub use error::{
    CancellationError, CompactionError, Error, ModelError, PermissionDenied, Result,
    SandboxError, TimeoutError, TransportError,
};
pub use events::{RequestInput, RunEvent, RunRequest, RunResult, TurnContext, TurnPolicy, TurnStatus};
pub use ids::{ApprovalId, SessionId, ToolUseId, TurnId};
pub use permission::{
    DefaultAction, PermissionConfiguration, PermissionResponse, PermissionRule, RiskLevel,
    SessionMemory,
};
pub use sandbox::{FilePolicy, NetworkPolicy, SandboxConfig};
pub use sink::{EventSink, NullSink};
pub use tool::{digest_arguments, ToolContext, ToolDecision, ToolTrace};
pub use trace::{TraceRecorder, TurnTraceBuffer};
pub use transcript::{Transcript, TranscriptEntry};
