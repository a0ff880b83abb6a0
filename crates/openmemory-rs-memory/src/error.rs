//! Error types for memory operations.

/// Errors returned by memory stores and the service layer.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// SQLite error.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// A blocking storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Join(String),
    /// Invalid policy or argument.
    #[error("invalid input: {0}")]
    Invalid(String),
}

impl From<tokio::task::JoinError> for MemoryError {
    fn from(err: tokio::task::JoinError) -> Self {
        MemoryError::Join(err.to_string())
    }
}
