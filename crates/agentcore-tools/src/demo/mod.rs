//! Example tools wired up by the CLI binary to demonstrate the middleware
//! pipeline end to end. Not part of the specified core.

pub mod bash;
pub mod fs;

pub use bash::BashTool;
pub use fs::{ReadFileTool, WriteFileTool};
