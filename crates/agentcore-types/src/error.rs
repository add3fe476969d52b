//! Error taxonomy shared across the runtime.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("transport input closed")]
    InputClosed,
    #[error("transport output closed")]
    OutputClosed,
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// The reason a tool call was refused, carried alongside `PermissionDenied`
/// so the trace and the surfaced error agree on what happened.
#[derive(Error, Debug, Clone)]
#[error("permission denied for tool '{tool}': {reason}")]
pub struct PermissionDenied {
    pub tool: String,
    pub reason: String,
    pub matched_rule: Option<String>,
}

/// Raised by a cancelled checkpoint. Propagates past every combinator,
/// including `Retry` and `Try`.
#[derive(Error, Debug, Clone, Default)]
#[error("cancelled")]
pub struct CancellationError;

#[derive(Error, Debug, Clone)]
#[error("timed out after {duration_secs}s{}", step_name.as_ref().map(|s| format!(" in step '{s}'")).unwrap_or_default())]
pub struct TimeoutError {
    pub duration_secs: u64,
    pub step_name: Option<String>,
}

#[derive(Error, Debug, Clone)]
pub enum ModelError {
    #[error("generation failed: {0}")]
    GenerationFailed(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("tool execution failed: {0}")]
    ToolExecutionFailed(String),
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("configuration error: {0}")]
    ConfigurationError(String),
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("decoding failure: {0}")]
    DecodingFailure(String),
    #[error("rate limited")]
    RateLimited,
    #[error("concurrent requests exceeded")]
    ConcurrentRequests,
    #[error("exceeded context window")]
    ExceededContextWindow,
    #[error("guardrail violation: {0}")]
    GuardrailViolation(String),
    #[error("refusal: {0}")]
    Refusal(String),
    #[error("assets unavailable")]
    AssetsUnavailable,
    #[error("unsupported guide")]
    UnsupportedGuide,
    #[error("unsupported language or locale")]
    UnsupportedLocale,
}

impl ModelError {
    /// Retryable iff it is a decoding failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ModelError::DecodingFailure(_))
    }

    /// `NetworkError`/`ModelUnavailable` are marked recoverable, but
    /// `Generate` only retries decoding failures — recoverable just means
    /// a caller-level retry loop (e.g. `Retry`) may reasonably wrap it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ModelError::NetworkError(_) | ModelError::ModelUnavailable(_))
    }
}

#[derive(Error, Debug, Clone)]
#[error("sandbox error: {0}")]
pub struct SandboxError(pub String);

#[derive(Error, Debug, Clone)]
pub enum CompactionError {
    #[error("already below target")]
    AlreadyBelowTarget,
    #[error("cannot compact further")]
    CannotCompactFurther,
    #[error("summarization failed: {0}")]
    SummarizationFailed(String),
    #[error("strategy not applicable")]
    StrategyNotApplicable,
}

/// Umbrella error, composed from the per-concern taxonomies above, the way
/// a thrown step-pipeline error is ultimately caught at the turn boundary.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Permission(#[from] PermissionDenied),
    #[error(transparent)]
    Cancellation(#[from] CancellationError),
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    #[error(transparent)]
    Compaction(#[from] CompactionError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error must surface as turn status `cancelled` rather
    /// than `failed`.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancellation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
