//! Tool Middleware Pipeline: a decorator chain around every tool call, with
//! a fixed `EventEmitting -> Permission -> Sandbox -> Tool` ordering and a
//! "call `next` exactly once unless short-circuiting" contract.

pub mod event;
pub mod glob;
pub mod permission;
pub mod profile;
pub mod sandbox;
pub mod security;

use crate::registry::{Tool, ToolResult};
use agentcore_types::{Error, ToolContext};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[async_trait]
pub trait ToolMiddleware: Send + Sync {
    async fn handle(&self, ctx: ToolContext, next: Next<'_>) -> Result<ToolResult, Error>;
}

/// The remainder of the chain, terminating in the wrapped tool's
/// cancellable execution.
pub struct Next<'a> {
    pub(crate) middlewares: &'a [Arc<dyn ToolMiddleware>],
    pub(crate) tool: &'a Arc<dyn Tool>,
    pub(crate) cancel: CancellationToken,
}

impl<'a> Next<'a> {
    pub fn call(self, ctx: ToolContext) -> BoxFuture<'a, Result<ToolResult, Error>> {
        Box::pin(async move {
            match self.middlewares.split_first() {
                Some((mw, rest)) => {
                    let next = Next { middlewares: rest, tool: self.tool, cancel: self.cancel.clone() };
                    mw.handle(ctx, next).await
                }
                None => {
                    let args = ctx.arguments_value();
                    Ok(self.tool.execute_cancellable(args, self.cancel.clone()).await)
                }
            }
        })
    }
}

/// The standard, security-critical ordering composed once per runtime and
/// reused across every tool call.
pub struct ToolPipeline {
    middlewares: Vec<Arc<dyn ToolMiddleware>>,
}

impl ToolPipeline {
    pub fn standard(
        event: Arc<event::EventEmittingMiddleware>,
        permission: Arc<permission::PermissionMiddleware>,
        sandbox: Arc<sandbox::SandboxMiddleware>,
    ) -> Self {
        Self { middlewares: vec![event, permission, sandbox] }
    }

    pub async fn run(
        &self,
        ctx: ToolContext,
        tool: &Arc<dyn Tool>,
        cancel: CancellationToken,
    ) -> Result<ToolResult, Error> {
        let next = Next { middlewares: &self.middlewares, tool, cancel };
        next.call(ctx).await
    }
}
