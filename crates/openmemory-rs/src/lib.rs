//! Public SDK surface for openmemory.
//!
//! This crate re-exports the building blocks and wires a [`MemoryService`]
//! from a loaded [`OpenMemoryConfig`] so embedders and the `openmemory`
//! binary set things up the same way.

/// Re-export for convenience.
pub use openmemory_rs_config as config;
/// Re-export for convenience.
pub use openmemory_rs_memory as memory;
/// Re-export for convenience.
pub use openmemory_rs_protocol as protocol;
pub use openmemory_rs_server as server;
pub use openmemory_rs_tools as tools;

use anyhow::Context;
use log::info;
use openmemory_rs_config::{LayeredConfigOptions, OpenMemoryConfig};
use openmemory_rs_memory::{
    AbstractPolicy, CapturePolicy, LineWindow, MemoryService, RecentPolicy, SequencePolicy,
    SqliteMemoryStore,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Initialize stderr logging; `RUST_LOG` overrides the `info` default.
///
/// Stdout carries the MCP stream, so nothing may log there.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .target(env_logger::Target::Stderr)
        .try_init();
}

/// Load layered config for `cwd`, with an optional extra file and database override.
pub fn load_config(
    cwd: impl AsRef<Path>,
    config_path: Option<&Path>,
    db_path: Option<&str>,
) -> anyhow::Result<OpenMemoryConfig> {
    let mut options = LayeredConfigOptions::new(cwd);
    if let Some(path) = config_path {
        options = options.with_runtime_path(path);
    }
    if let Some(db_path) = db_path {
        options = options.with_db_path(db_path);
    }
    let layered = OpenMemoryConfig::load_layered_with_options(options)
        .context("failed to load layered config")?;
    info!(
        "config loaded (layers={}, db_path={})",
        layered.layers.len(),
        layered.config.storage.path
    );
    Ok(layered.config)
}

/// Open the configured database and build a service with the configured policies.
pub fn build_service(config: &OpenMemoryConfig) -> anyhow::Result<Arc<MemoryService>> {
    config.validate().context("invalid config")?;
    let store = SqliteMemoryStore::open(&config.storage.path)
        .with_context(|| format!("failed to open memory database at {}", config.storage.path))?;
    info!("memory database ready (path={})", store.location());

    let service = MemoryService::builder(Arc::new(store))
        .capture(CapturePolicy {
            min_message_chars: config.capture.min_message_chars,
        })
        .sequence(SequencePolicy {
            eviction_window: Duration::from_secs(config.sequence.eviction_window_secs),
            cap: config.sequence.cap,
        })
        .abstract_policy(AbstractPolicy {
            incremental_window: LineWindow::First(config.abstract_config.incremental_window),
            rebuild_window: LineWindow::Last(config.abstract_config.rebuild_window),
            lookback_days: config.abstract_config.lookback_days,
        })
        .recent(RecentPolicy {
            default_max_days: config.recent.default_max_days,
        })
        .build();
    Ok(Arc::new(service))
}

#[cfg(test)]
mod tests {
    use super::{build_service, load_config};
    use openmemory_rs_config::{CaptureConfig, OpenMemoryConfig};
    use openmemory_rs_memory::WriteStatus;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn builds_service_on_configured_database() {
        let temp = TempDir::new().expect("tmp");
        let db = temp.path().join("nested").join("memory.sqlite");
        let config = OpenMemoryConfig::builder()
            .db_path(db.display().to_string())
            .capture(CaptureConfig {
                min_message_chars: 5,
            })
            .build();

        let service = build_service(&config).expect("service");
        let report = service.save("user", "tiny", None).await;
        assert_eq!(report.status, WriteStatus::Skipped);
        let report = service.save("user", "long enough to keep", None).await;
        assert_eq!(report.status, WriteStatus::Success);
        assert!(db.exists());
    }

    #[test]
    fn rejects_invalid_config() {
        let config = OpenMemoryConfig::builder().db_path("  ").build();
        assert!(build_service(&config).is_err());
    }

    #[test]
    fn runtime_file_and_db_override_apply() {
        let temp = TempDir::new().expect("tmp");
        let runtime = temp.path().join("extra.json5");
        fs::write(&runtime, "{ recent: { default_max_days: 6 } }").expect("write");

        let config = load_config(temp.path(), Some(&runtime), Some("override.sqlite"))
            .expect("config");
        assert_eq!(config.recent.default_max_days, 6);
        assert_eq!(config.storage.path, "override.sqlite");
    }
}
