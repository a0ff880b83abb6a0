use serde_json::{Value, json};

/// Errors returned by tools and the tool registry.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Tool name was not found in registry.
    #[error("tool not found: {0}")]
    ToolNotFound(String),
    /// Tool received invalid arguments.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    /// Tool execution failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

impl ToolError {
    /// JSON body reported to callers for a failed execution.
    pub fn to_payload(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::InvalidArguments(err.to_string())
    }
}
