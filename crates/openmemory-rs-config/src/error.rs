//! Error types for config loading and validation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned while loading or validating config.
///
/// Layer-specific variants carry the layer label (`cwd(/repo/.openmemory/openmemory.json5)`,
/// `env(MEMORY_DB_PATH)`, `cli(--db-path)`) so a bad value can be traced to its source.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to resolve config location: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read config {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {layer}: {source}")]
    ParseFailed {
        layer: String,
        #[source]
        source: json5::Error,
    },
    /// The merged JSON did not deserialize into the config model.
    #[error("failed to decode config: {0}")]
    DecodeFailed(#[from] serde_json::Error),
    /// A key is unknown or has the wrong type.
    #[error("invalid config in {layer} at {path}: {message}")]
    InvalidField {
        layer: String,
        path: String,
        message: String,
    },
    /// An environment or command-line override has an unusable value.
    #[error("invalid override from {layer}: {message}")]
    InvalidOverride { layer: String, message: String },
    /// A cross-field rule failed after merging.
    #[error("invalid config: {0}")]
    Invalid(String),
}
