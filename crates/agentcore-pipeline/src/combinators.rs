//! Composable stage combinators. Each wraps one or more child steps
//! and is itself a `Step`, so pipelines nest arbitrarily - `Chain::new(a, b)`
//! is itself chainable with a third step, giving zero-cost parametric
//! composition without any dynamic dispatch overhead beyond what the child
//! steps already pay.
//!
//! Every combinator that loops or waits re-checks `agentcore_types::scope::
//! current_cancel()` at its iteration boundary, and a `CancellationError`
//! is always propagated rather than caught - cancellation passes through
//! every combinator, including `Retry` and `Try`, without being absorbed.

use crate::step::{BoxStep, Step};
use agentcore_types::error::CancellationError;
use agentcore_types::{scope, Error};
use async_trait::async_trait;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use std::time::Duration;

fn cancelled() -> Error {
    CancellationError.into()
}

/// Runs `a` then feeds its output into `b`. N-ary chains are built by
/// nesting: `Chain::new(Chain::new(a, b), c)`.
pub struct Chain<A, B> {
    a: A,
    b: B,
}

impl<A, B> Chain<A, B> {
    pub fn new(a: A, b: B) -> Self {
        Self { a, b }
    }
}

#[async_trait]
impl<A, B, I, M, O> Step<I, O> for Chain<A, B>
where
    A: Step<I, M>,
    B: Step<M, O>,
    I: Send + 'static,
    M: Send + 'static,
    O: Send + 'static,
{
    async fn run(&self, input: I) -> Result<O, Error> {
        let mid = self.a.run(input).await?;
        self.b.run(mid).await
    }
}

/// Wraps a plain closure as a `Step`, for cheap inline stages that don't
/// warrant their own named type.
pub struct Transform<F> {
    f: F,
}

impl<F> Transform<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<I, O, F> Step<I, O> for Transform<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> O + Send + Sync,
{
    async fn run(&self, input: I) -> Result<O, Error> {
        Ok((self.f)(input))
    }
}

/// Repeats `body` - a state-preserving step `T -> T` - until `should_exit`
/// holds for the latest state or `max_iterations` is reached.
pub struct Loop<B, P> {
    body: B,
    should_exit: P,
    max_iterations: usize,
}

impl<B, P> Loop<B, P> {
    pub fn new(body: B, should_exit: P, max_iterations: usize) -> Self {
        Self { body, should_exit, max_iterations }
    }
}

#[async_trait]
impl<B, P, T> Step<T, T> for Loop<B, P>
where
    B: Step<T, T>,
    P: Fn(&T) -> bool + Send + Sync,
    T: Clone + Send + 'static,
{
    async fn run(&self, input: T) -> Result<T, Error> {
        let mut current = input;
        for _ in 0..self.max_iterations.max(1) {
            if scope::current_cancel().is_cancelled() {
                return Err(cancelled());
            }
            current = self.body.run(current).await?;
            if (self.should_exit)(&current) {
                return Ok(current);
            }
        }
        Ok(current)
    }
}

/// Runs `body`; on failure (other than cancellation) calls `handler` with
/// the error to build a fallback step, then runs that fallback against the
/// same original input.
pub struct Try<B, H> {
    body: B,
    handler: H,
}

impl<B, H> Try<B, H> {
    pub fn new(body: B, handler: H) -> Self {
        Self { body, handler }
    }
}

#[async_trait]
impl<I, O, B, H, S> Step<I, O> for Try<B, H>
where
    B: Step<I, O>,
    H: Fn(Error) -> S + Send + Sync,
    S: Step<I, O>,
    I: Clone + Send + 'static,
    O: Send + 'static,
{
    async fn run(&self, input: I) -> Result<O, Error> {
        match self.body.run(input.clone()).await {
            Ok(output) => Ok(output),
            Err(e) if e.is_cancellation() => Err(e),
            Err(e) => (self.handler)(e).run(input).await,
        }
    }
}

/// Retries `body` up to `attempts` times (at least one), waiting `delay`
/// between attempts if set. The last error is returned if every attempt
/// fails. Cancellation aborts the retry loop immediately.
pub struct Retry<B> {
    body: B,
    attempts: usize,
    delay: Option<Duration>,
}

impl<B> Retry<B> {
    pub fn new(body: B, attempts: usize) -> Self {
        Self { body, attempts, delay: None }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl<I, O, B> Step<I, O> for Retry<B>
where
    B: Step<I, O>,
    I: Clone + Send + 'static,
    O: Send + 'static,
{
    async fn run(&self, input: I) -> Result<O, Error> {
        let attempts = self.attempts.max(1);
        let mut last_err = None;
        for attempt in 0..attempts {
            let cancel = scope::current_cancel();
            if cancel.is_cancelled() {
                return Err(cancelled());
            }
            match self.body.run(input.clone()).await {
                Ok(output) => return Ok(output),
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => {
                    last_err = Some(e);
                    if attempt + 1 < attempts {
                        if let Some(delay) = self.delay {
                            tokio::select! {
                                _ = tokio::time::sleep(delay) => {}
                                _ = cancel.cancelled() => return Err(cancelled()),
                            }
                        }
                    }
                }
            }
        }
        Err(last_err.expect("at least one attempt was made"))
    }
}

/// Bounds `body`'s execution time; the loser of the race is dropped (and so
/// never polled further) when the deadline elapses first.
pub struct Timeout<B> {
    body: B,
    duration: Duration,
    step_name: Option<String>,
}

impl<B> Timeout<B> {
    pub fn new(body: B, duration: Duration) -> Self {
        Self { body, duration, step_name: None }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.step_name = Some(name.into());
        self
    }
}

#[async_trait]
impl<I, O, B> Step<I, O> for Timeout<B>
where
    B: Step<I, O>,
    I: Send + 'static,
    O: Send + 'static,
{
    async fn run(&self, input: I) -> Result<O, Error> {
        match tokio::time::timeout(self.duration, self.body.run(input)).await {
            Ok(result) => result,
            Err(_) => Err(agentcore_types::error::TimeoutError {
                duration_secs: self.duration.as_secs(),
                step_name: self.step_name.clone(),
            }
            .into()),
        }
    }
}

/// Rewrites a failed `body`'s error, leaving success and cancellation
/// untouched.
pub struct MapError<B, F> {
    body: B,
    f: F,
}

impl<B, F> MapError<B, F> {
    pub fn new(body: B, f: F) -> Self {
        Self { body, f }
    }
}

#[async_trait]
impl<I, O, B, F> Step<I, O> for MapError<B, F>
where
    B: Step<I, O>,
    F: Fn(Error) -> Error + Send + Sync,
    I: Send + 'static,
    O: Send + 'static,
{
    async fn run(&self, input: I) -> Result<O, Error> {
        match self.body.run(input).await {
            Ok(output) => Ok(output),
            Err(e) if e.is_cancellation() => Err(e),
            Err(e) => Err((self.f)(e)),
        }
    }
}

/// Runs every step against a clone of the same input concurrently; returns
/// results in declaration order. The first failure short-circuits and the
/// unfinished siblings are dropped (and therefore cancelled) without being
/// awaited to completion.
pub struct Parallel<I, O> {
    steps: Vec<BoxStep<I, O>>,
}

impl<I, O> Parallel<I, O> {
    pub fn new(steps: Vec<BoxStep<I, O>>) -> Self {
        Self { steps }
    }
}

#[async_trait]
impl<I, O> Step<I, Vec<O>> for Parallel<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    async fn run(&self, input: I) -> Result<Vec<O>, Error> {
        if scope::current_cancel().is_cancelled() {
            return Err(cancelled());
        }
        let mut futs: FuturesUnordered<_> = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                let input = input.clone();
                async move { (i, step.run(input).await) }
            })
            .collect();

        let mut results: Vec<Option<O>> = (0..self.steps.len()).map(|_| None).collect();
        while let Some((i, result)) = futs.next().await {
            match result {
                Ok(value) => results[i] = Some(value),
                Err(e) => return Err(e),
            }
        }
        Ok(results.into_iter().map(|o| o.expect("every branch resolved")).collect())
    }
}

/// The outcome of a [`Gate`]: either the body ran (`Pass`) or the predicate
/// blocked it with a reported reason (`Block`).
#[derive(Debug, Clone)]
pub enum GateOutcome<O> {
    Pass(O),
    Block(String),
}

/// Runs `predicate` against the input first; if it returns a block reason,
/// `body` never runs and the reason is surfaced as a normal (non-error)
/// output so the caller can branch on it.
pub struct Gate<B, P> {
    body: B,
    predicate: P,
}

impl<B, P> Gate<B, P> {
    pub fn new(predicate: P, body: B) -> Self {
        Self { body, predicate }
    }
}

#[async_trait]
impl<I, O, B, P> Step<I, GateOutcome<O>> for Gate<B, P>
where
    B: Step<I, O>,
    P: Fn(&I) -> Option<String> + Send + Sync,
    I: Send + 'static,
    O: Send + 'static,
{
    async fn run(&self, input: I) -> Result<GateOutcome<O>, Error> {
        if let Some(reason) = (self.predicate)(&input) {
            return Ok(GateOutcome::Block(reason));
        }
        Ok(GateOutcome::Pass(self.body.run(input).await?))
    }
}

/// Picks between two steps based on a predicate over the input.
pub struct Conditional<P, T, F> {
    predicate: P,
    if_true: T,
    if_false: F,
}

impl<P, T, F> Conditional<P, T, F> {
    pub fn new(predicate: P, if_true: T, if_false: F) -> Self {
        Self { predicate, if_true, if_false }
    }
}

#[async_trait]
impl<I, O, P, T, F> Step<I, O> for Conditional<P, T, F>
where
    P: Fn(&I) -> bool + Send + Sync,
    T: Step<I, O>,
    F: Step<I, O>,
    I: Send + 'static,
    O: Send + 'static,
{
    async fn run(&self, input: I) -> Result<O, Error> {
        if (self.predicate)(&input) {
            self.if_true.run(input).await
        } else {
            self.if_false.run(input).await
        }
    }
}

/// Runs `body` only if `predicate` holds; otherwise yields `None` without
/// running it at all.
pub struct Optional<P, B> {
    predicate: P,
    body: B,
}

impl<P, B> Optional<P, B> {
    pub fn new(predicate: P, body: B) -> Self {
        Self { predicate, body }
    }
}

#[async_trait]
impl<I, O, P, B> Step<I, Option<O>> for Optional<P, B>
where
    P: Fn(&I) -> bool + Send + Sync,
    B: Step<I, O>,
    I: Clone + Send + 'static,
    O: Send + 'static,
{
    async fn run(&self, input: I) -> Result<Option<O>, Error> {
        if (self.predicate)(&input) {
            Ok(Some(self.body.run(input).await?))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Inc;
    #[async_trait]
    impl Step<i32, i32> for Inc {
        async fn run(&self, input: i32) -> Result<i32, Error> {
            Ok(input + 1)
        }
    }

    struct Double;
    #[async_trait]
    impl Step<i32, i32> for Double {
        async fn run(&self, input: i32) -> Result<i32, Error> {
            Ok(input * 2)
        }
    }

    struct AlwaysFails;
    #[async_trait]
    impl Step<i32, i32> for AlwaysFails {
        async fn run(&self, _input: i32) -> Result<i32, Error> {
            Err(Error::Internal("boom".into()))
        }
    }

    #[tokio::test]
    async fn chain_composes_in_order() {
        let pipeline = Chain::new(Inc, Double);
        assert_eq!(pipeline.run(1).await.unwrap(), 4); // (1+1)*2
    }

    #[tokio::test]
    async fn loop_runs_until_predicate_holds() {
        let pipeline = Loop::new(Inc, |v: &i32| *v >= 5, 100);
        assert_eq!(pipeline.run(0).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn loop_stops_at_max_iterations() {
        let pipeline = Loop::new(Inc, |_: &i32| false, 3);
        assert_eq!(pipeline.run(0).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn retry_exhausts_then_returns_last_error() {
        let attempts = Arc::new(AtomicUsize::new(0));
        struct Counting(Arc<AtomicUsize>);
        #[async_trait]
        impl Step<i32, i32> for Counting {
            async fn run(&self, _input: i32) -> Result<i32, Error> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err(Error::Internal("nope".into()))
            }
        }
        let pipeline = Retry::new(Counting(attempts.clone()), 3);
        assert!(pipeline.run(0).await.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn try_falls_back_on_error() {
        let pipeline = Try::new(AlwaysFails, |_e| Transform::new(|i: i32| i + 100));
        assert_eq!(pipeline.run(1).await.unwrap(), 101);
    }

    #[tokio::test]
    async fn gate_blocks_with_reason() {
        let pipeline = Gate::new(|v: &i32| if *v < 0 { Some("negative".to_string()) } else { None }, Inc);
        match pipeline.run(-1).await.unwrap() {
            GateOutcome::Block(reason) => assert_eq!(reason, "negative"),
            GateOutcome::Pass(_) => panic!("expected block"),
        }
        match pipeline.run(1).await.unwrap() {
            GateOutcome::Pass(v) => assert_eq!(v, 2),
            GateOutcome::Block(_) => panic!("expected pass"),
        }
    }

    #[tokio::test]
    async fn parallel_preserves_declaration_order() {
        let steps: Vec<BoxStep<i32, i32>> = vec![Box::new(Inc), Box::new(Double)];
        let pipeline = Parallel::new(steps);
        assert_eq!(pipeline.run(2).await.unwrap(), vec![3, 4]);
    }

    #[tokio::test]
    async fn parallel_short_circuits_on_first_error() {
        let steps: Vec<BoxStep<i32, i32>> = vec![Box::new(Inc), Box::new(AlwaysFails)];
        let pipeline = Parallel::new(steps);
        assert!(pipeline.run(2).await.is_err());
    }

    #[tokio::test]
    async fn optional_skips_body_when_predicate_false() {
        let pipeline = Optional::new(|v: &i32| *v > 0, Inc);
        assert_eq!(pipeline.run(-1).await.unwrap(), None);
        assert_eq!(pipeline.run(1).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn cancellation_propagates_through_retry_and_try() {
        struct CancelChecker;
        #[async_trait]
        impl Step<i32, i32> for CancelChecker {
            async fn run(&self, _input: i32) -> Result<i32, Error> {
                Err(agentcore_types::error::CancellationError.into())
            }
        }
        let retry = Retry::new(CancelChecker, 5);
        let err = retry.run(0).await.unwrap_err();
        assert!(err.is_cancellation());

        let wrapped = Try::new(CancelChecker, |_e| Transform::new(|i: i32| i));
        let err = wrapped.run(0).await.unwrap_err();
        assert!(err.is_cancellation());
    }
}
