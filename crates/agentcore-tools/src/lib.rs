//! Tool trait, registry, and the Tool Middleware Pipeline
//! (`EventEmitting -> Permission -> Sandbox -> Tool`).

pub mod demo;
pub mod middleware;
pub mod registry;

pub use middleware::event::EventEmittingMiddleware;
pub use middleware::permission::{
    ApprovalHandler, ApprovalRequest, AutoDeny, DynamicRulesProvider, InteractiveApproval,
    PermissionMiddleware,
};
pub use middleware::sandbox::{current_sandbox_config, SandboxMiddleware};
pub use middleware::{Next, ToolMiddleware, ToolPipeline};
pub use registry::{Tool, ToolRegistry, ToolResult};
