//! The `Generate`/`GenerateText` stages: the step that actually
//! calls a language model, classifies the result, and retries decoding
//! failures.
//!
//! Built around a vendor-agnostic `LanguageModelSession<T>` trait - a
//! request in, a stream of deltas or one complete response out - so the
//! pipeline never depends on a concrete model client.

use crate::step::Step;
use agentcore_types::error::CancellationError;
use agentcore_types::{scope, Error, ModelError};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The text (and, for a future structured-output extension, schema) a
/// generation call is built from.
#[derive(Debug, Clone, Default)]
pub struct Prompt {
    pub text: String,
}

impl Prompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// How the model should sample its next token.
#[derive(Debug, Clone, Copy)]
pub enum Sampling {
    Greedy,
    Random { probability_threshold: f32 },
}

impl Default for Sampling {
    fn default() -> Self {
        Sampling::Random { probability_threshold: 1.0 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub maximum_response_tokens: Option<u32>,
    pub sampling: Sampling,
}

/// A complete, non-streaming generation result.
#[derive(Debug, Clone)]
pub struct Response<T> {
    pub content: T,
}

/// One increment of a streamed generation. `content` is the accumulated
/// (partial or final) value; `is_complete` marks the last snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub content: T,
    pub is_complete: bool,
}

/// Vendor-agnostic language model session the `Generate` stage is
/// parameterized over. A concrete adapter wraps one real provider session
/// (or, in tests, a scripted fixture).
#[async_trait]
pub trait LanguageModelSession<T>: Send + Sync
where
    T: Send + 'static,
{
    async fn respond(
        &self,
        options: &GenerationOptions,
        prompt: &Prompt,
    ) -> Result<Response<T>, ModelError>;

    async fn stream_response(
        &self,
        options: &GenerationOptions,
        prompt: &Prompt,
    ) -> Result<BoxStream<'static, Result<Snapshot<T>, ModelError>>, ModelError>;
}

/// Observes every snapshot as it streams in, independent of the stage's own
/// retry/accumulation logic - e.g. to forward `TokenDelta` events.
pub trait StreamObserver<T>: Send + Sync {
    fn on_snapshot(&self, snapshot: &Snapshot<T>);
}

/// Where `Generate` gets its session from. `Relay` covers both "inject a
/// shared reference at construction time" and "resolve the current session
/// from context at call time" - a relay cell read under the lock at the
/// moment of the call serves both; a true per-type contextual registry
/// would need type-erased storage this crate doesn't otherwise need.
pub enum SessionSource<T> {
    Direct(Arc<dyn LanguageModelSession<T>>),
    Relay(Arc<RwLock<Option<Arc<dyn LanguageModelSession<T>>>>>),
}

impl<T> Clone for SessionSource<T> {
    fn clone(&self) -> Self {
        match self {
            SessionSource::Direct(s) => SessionSource::Direct(s.clone()),
            SessionSource::Relay(r) => SessionSource::Relay(r.clone()),
        }
    }
}

/// The LLM-invocation stage: builds a prompt from the pipeline's input,
/// resolves a session, and generates - retrying decoding failures up to
/// `max_retries` times.
pub struct Generate<I, T, F> {
    prompt_builder: F,
    session: SessionSource<T>,
    options: GenerationOptions,
    observer: Option<Arc<dyn StreamObserver<T>>>,
    streaming: bool,
    max_retries: usize,
    _marker: std::marker::PhantomData<fn(&I)>,
}

impl<I, T, F> Generate<I, T, F>
where
    F: Fn(&I) -> Prompt + Send + Sync,
{
    pub fn new(session: SessionSource<T>, prompt_builder: F) -> Self {
        Self {
            prompt_builder,
            session,
            options: GenerationOptions::default(),
            observer: None,
            streaming: false,
            max_retries: 1,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn StreamObserver<T>>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn resolve_session(&self) -> Result<Arc<dyn LanguageModelSession<T>>, Error> {
        match &self.session {
            SessionSource::Direct(s) => Ok(s.clone()),
            SessionSource::Relay(cell) => cell
                .read()
                .await
                .clone()
                .ok_or_else(|| ModelError::ConfigurationError("no session installed".into()).into()),
        }
    }

    /// Streams a response snapshot-by-snapshot, re-checking the turn's
    /// cancellation token before consuming each one so a cancelled turn
    /// unwinds as `Error::Cancellation` rather than a `ModelError` - the
    /// caller's `is_cancellation()` check depends on that, not just on the
    /// string contents of some generation failure.
    async fn run_streaming(
        &self,
        session: &Arc<dyn LanguageModelSession<T>>,
        prompt: &Prompt,
    ) -> Result<T, Error>
    where
        T: Clone,
    {
        let mut stream = session.stream_response(&self.options, prompt).await?;
        let mut latest: Option<T> = None;
        while let Some(item) = stream.next().await {
            if scope::current_cancel().is_cancelled() {
                return Err(CancellationError.into());
            }
            let snapshot = item?;
            if let Some(observer) = &self.observer {
                observer.on_snapshot(&snapshot);
            }
            let complete = snapshot.is_complete;
            latest = Some(snapshot.content);
            if complete {
                break;
            }
        }
        latest.ok_or_else(|| ModelError::GenerationFailed("no content generated".into()).into())
    }
}

#[async_trait]
impl<I, T, F> Step<I, T> for Generate<I, T, F>
where
    I: Send + 'static,
    T: Clone + Send + Sync + 'static,
    F: Fn(&I) -> Prompt + Send + Sync,
{
    async fn run(&self, input: I) -> Result<T, Error> {
        if scope::current_cancel().is_cancelled() {
            return Err(CancellationError.into());
        }
        let prompt = (self.prompt_builder)(&input);
        let session = self.resolve_session().await?;

        let attempts = self.max_retries.max(1);
        let mut last_err: Option<Error> = None;
        for attempt in 0..attempts {
            if scope::current_cancel().is_cancelled() {
                return Err(CancellationError.into());
            }
            let outcome: Result<T, Error> = if self.streaming {
                self.run_streaming(&session, &prompt).await
            } else {
                session.respond(&self.options, &prompt).await.map(|r| r.content).map_err(Error::from)
            };
            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => {
                    let retryable = matches!(&e, Error::Model(model_err) if model_err.is_retryable());
                    if retryable && attempt + 1 < attempts {
                        last_err = Some(e);
                    } else {
                        return Err(e);
                    }
                }
            }
        }
        Err(last_err.expect("at least one attempt was made"))
    }
}

/// `Generate` specialised to plain text, the common case for a turn's final
/// response.
pub type GenerateText<I, F> = Generate<I, String, F>;
