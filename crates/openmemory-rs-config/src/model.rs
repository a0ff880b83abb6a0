//! Configuration schema for openmemory.

use serde::{Deserialize, Serialize};

/// Root config for the memory server.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OpenMemoryConfig {
    #[serde(default, rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sequence: SequenceConfig,
    #[serde(default, rename = "abstract")]
    pub abstract_config: AbstractConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub recent: RecentConfig,
}

impl OpenMemoryConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> OpenMemoryConfigBuilder {
        OpenMemoryConfigBuilder::new()
    }
}

/// Builder for assembling an `OpenMemoryConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct OpenMemoryConfigBuilder {
    config: OpenMemoryConfig,
}

impl OpenMemoryConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: OpenMemoryConfig::default(),
        }
    }

    /// Replace the storage configuration.
    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    /// Point storage at a database path.
    pub fn db_path(mut self, path: impl Into<String>) -> Self {
        self.config.storage.path = path.into();
        self
    }

    /// Replace the sequence configuration.
    pub fn sequence(mut self, sequence: SequenceConfig) -> Self {
        self.config.sequence = sequence;
        self
    }

    /// Replace the abstract configuration.
    pub fn abstract_config(mut self, abstract_config: AbstractConfig) -> Self {
        self.config.abstract_config = abstract_config;
        self
    }

    /// Replace the capture configuration.
    pub fn capture(mut self, capture: CaptureConfig) -> Self {
        self.config.capture = capture;
        self
    }

    /// Replace the recent-memories configuration.
    pub fn recent(mut self, recent: RecentConfig) -> Self {
        self.config.recent = recent;
        self
    }

    /// Finalize the config.
    pub fn build(self) -> OpenMemoryConfig {
        self.config
    }
}

/// Where the SQLite database lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// Database file; `:memory:` keeps everything in process.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Default database location, relative to the working directory.
fn default_db_path() -> String {
    "./memory.sqlite".to_string()
}

/// Per-timestamp sequence counter settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SequenceConfig {
    #[serde(default = "default_eviction_window_secs")]
    pub eviction_window_secs: u64,
    #[serde(default = "default_sequence_cap")]
    pub cap: u32,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            eviction_window_secs: default_eviction_window_secs(),
            cap: default_sequence_cap(),
        }
    }
}

fn default_eviction_window_secs() -> u64 {
    10
}

fn default_sequence_cap() -> u32 {
    1000
}

/// Abstract merge and rebuild settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AbstractConfig {
    /// Days of history a full rebuild reads.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    /// Earliest new lines folded into an existing abstract.
    #[serde(default = "default_incremental_window")]
    pub incremental_window: usize,
    /// Latest lines shown in a rebuilt abstract.
    #[serde(default = "default_rebuild_window")]
    pub rebuild_window: usize,
}

impl Default for AbstractConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            incremental_window: default_incremental_window(),
            rebuild_window: default_rebuild_window(),
        }
    }
}

fn default_lookback_days() -> u32 {
    14
}

fn default_incremental_window() -> usize {
    10
}

fn default_rebuild_window() -> usize {
    5
}

/// Message capture settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Normalized messages with this many characters or fewer are skipped.
    #[serde(default = "default_min_message_chars")]
    pub min_message_chars: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            min_message_chars: default_min_message_chars(),
        }
    }
}

fn default_min_message_chars() -> usize {
    2
}

/// Recent-memories settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecentConfig {
    #[serde(default = "default_max_days")]
    pub default_max_days: u32,
}

impl Default for RecentConfig {
    fn default() -> Self {
        Self {
            default_max_days: default_max_days(),
        }
    }
}

fn default_max_days() -> u32 {
    3
}
