//! The Step Pipeline: composable async stage combinators over a
//! boxed `Step<I, O>` trait object, culminating in the `Generate`/
//! `GenerateText` LLM-invocation stages.

pub mod combinators;
pub mod generate;
pub mod interactive;
pub mod step;

pub use combinators::{
    Chain, Conditional, Gate, GateOutcome, Loop, MapError, Optional, Parallel, Retry, Timeout,
    Transform, Try,
};
pub use generate::{
    Generate, GenerateText, GenerationOptions, LanguageModelSession, Prompt, Response, Sampling,
    SessionSource, Snapshot, StreamObserver,
};
pub use interactive::{InteractiveInput, StdinInteractiveInput, WaitForInput};
pub use step::{BoxStep, Step};
