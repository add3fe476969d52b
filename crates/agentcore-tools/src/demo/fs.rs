//! Minimal read/write demo tools (JSON-schema'd args, workspace-root-relative
//! paths). Not part of the core runtime; exists so the CLI binary has
//! something real to route through the middleware pipeline.

use crate::registry::{Tool, ToolResult};
use serde_json::{json, Value};
use std::path::PathBuf;

pub struct ReadFileTool {
    workspace_root: PathBuf,
}

impl ReadFileTool {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self { workspace_root: workspace_root.into() }
    }

    fn resolve(&self, file_path: &str) -> PathBuf {
        let path = std::path::Path::new(file_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }
}

#[async_trait::async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "Read"
    }

    fn description(&self) -> &str {
        "Reads a file from the workspace and returns its contents."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "file_path": { "type": "string" } },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let Some(file_path) = args["file_path"].as_str() else {
            return ToolResult::error("Missing required parameter: file_path");
        };
        match tokio::fs::read_to_string(self.resolve(file_path)).await {
            Ok(contents) => ToolResult::text(contents),
            Err(e) => ToolResult::error(format!("Failed to read {file_path}: {e}")),
        }
    }
}

pub struct WriteFileTool {
    workspace_root: PathBuf,
}

impl WriteFileTool {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self { workspace_root: workspace_root.into() }
    }

    fn resolve(&self, file_path: &str) -> PathBuf {
        let path = std::path::Path::new(file_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }
}

#[async_trait::async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "Write"
    }

    fn description(&self) -> &str {
        "Writes text content to a file in the workspace, creating parent directories as needed."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": { "type": "string" },
                "content": { "type": "string" }
            },
            "required": ["file_path", "content"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let (Some(file_path), Some(content)) = (args["file_path"].as_str(), args["content"].as_str())
        else {
            return ToolResult::error("Missing required parameter: file_path or content");
        };
        let resolved = self.resolve(file_path);
        if let Some(parent) = resolved.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolResult::error(format!("Failed to create parent directories: {e}"));
            }
        }
        match tokio::fs::write(&resolved, content).await {
            Ok(()) => ToolResult::text(format!("wrote {} bytes to {}", content.len(), file_path)),
            Err(e) => ToolResult::error(format!("Failed to write {file_path}: {e}")),
        }
    }
}
