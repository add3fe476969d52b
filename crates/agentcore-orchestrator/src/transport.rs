//! The `Transport` boundary: how the orchestrator exchanges
//! `RunRequest`/`RunEvent` with the outside world, independent of whether
//! that world is a websocket, an RPC connection, or a local stdio console.
//! A console transport that shares a single stdin stream between normal
//! input and interactive approval prompts is the concrete case where
//! `supports_background_receive` must be `false`.

use agentcore_types::{RunEvent, RunRequest, TransportError};
use async_trait::async_trait;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether a second `receive()` can be issued while a turn is still
    /// executing (true for a multiplexed connection like a websocket;
    /// false for a console that shares one stdin stream between a turn's
    /// own input and any interactive approval prompt it raises).
    fn supports_background_receive(&self) -> bool;

    async fn receive(&self) -> Result<RunRequest, TransportError>;

    async fn send(&self, event: RunEvent) -> Result<(), TransportError>;

    /// Signals that no further requests will arrive; a subsequent
    /// `receive()` must return `Err(TransportError::InputClosed)`.
    async fn close_input(&self);

    /// Tears down the transport entirely, after the last event has been
    /// sent.
    async fn close(&self);
}
