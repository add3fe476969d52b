//! The `Step<I, O>` trait: the unit every combinator composes.
//!
//! A small async trait object behind `Arc<dyn _>`, generalised from "one
//! model call" to "one stage of a turn's processing pipeline".

use agentcore_types::Error;
use async_trait::async_trait;

#[async_trait]
pub trait Step<I, O>: Send + Sync
where
    I: Send + 'static,
    O: Send + 'static,
{
    async fn run(&self, input: I) -> Result<O, Error>;
}

/// A boxed, type-erased step. Combinators hold their children behind this
/// so a pipeline can be assembled from steps of differing concrete types.
pub type BoxStep<I, O> = Box<dyn Step<I, O>>;

#[async_trait]
impl<I, O> Step<I, O> for BoxStep<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    async fn run(&self, input: I) -> Result<O, Error> {
        (**self).run(input).await
    }
}
