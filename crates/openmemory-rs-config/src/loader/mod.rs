//! Layered configuration loader.
//!
//! Discovers configuration layers (user/project/cwd/runtime), validates their
//! schema, applies environment and command-line overrides, and produces a
//! final `OpenMemoryConfig`.

mod layer_io;
mod merge;
mod schema;
mod utils;


use crate::{ConfigError, OpenMemoryConfig};
use log::{debug, info};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default config filename in local layers.
const DEFAULT_CONFIG_FILE: &str = "openmemory.json5";
/// Default config directory under user, project or cwd roots.
const DEFAULT_CONFIG_DIR: &str = ".openmemory";
/// Marker files/dirs that identify a project root.
const DEFAULT_PROJECT_ROOT_MARKERS: &[&str] = &[".git"];
/// Environment variable overriding `storage.path`.
pub const DB_PATH_ENV: &str = "MEMORY_DB_PATH";

/// Effective config plus metadata about which layers were loaded.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// The merged, validated config.
    pub config: OpenMemoryConfig,
    /// Metadata for each layer applied during load.
    pub layers: Vec<ConfigLayer>,
}

/// Origin for a single config layer in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// User-specific configuration.
    User,
    /// Project root configuration.
    Project,
    /// Current working directory configuration.
    Cwd,
    /// Explicit `--config` files.
    Runtime,
    /// Environment variable overrides.
    Env,
    /// Command-line overrides (highest precedence).
    Cli,
}

/// Metadata about an applied config layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayer {
    /// Layer origin.
    pub source: ConfigLayerSource,
    /// Location on disk for file layers.
    pub path: Option<PathBuf>,
}

/// Schema validation mode for layered configs.
#[derive(Debug, Clone, Copy)]
enum SchemaMode {
    /// Key and type checks for a single layer.
    Partial,
    /// Checks for the merged, effective config.
    Full,
}

/// Options controlling layered config discovery and overrides.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    /// Working directory used to find local layers.
    pub cwd: PathBuf,
    /// Optional user config path (defaults to `~/.openmemory/openmemory.json5`).
    pub user_config_path: Option<PathBuf>,
    /// Runtime override config paths applied after file discovery.
    pub runtime_paths: Vec<PathBuf>,
    /// Marker files/dirs used to detect the project root.
    pub project_root_markers: Vec<String>,
    /// Value of [`DB_PATH_ENV`] captured at construction.
    pub env_db_path: Option<String>,
    /// Database path given on the command line.
    pub cli_db_path: Option<String>,
}

impl LayeredConfigOptions {
    /// Create options with default layer locations for the provided cwd.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        let cwd = cwd.as_ref().to_path_buf();
        Self {
            cwd,
            user_config_path: layer_io::default_user_config_path(),
            runtime_paths: Vec::new(),
            project_root_markers: DEFAULT_PROJECT_ROOT_MARKERS
                .iter()
                .map(|marker| marker.to_string())
                .collect(),
            env_db_path: std::env::var(DB_PATH_ENV)
                .ok()
                .filter(|value| !value.is_empty()),
            cli_db_path: None,
        }
    }

    /// Add a runtime override config path.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Override the database path from the command line.
    pub fn with_db_path(mut self, path: impl Into<String>) -> Self {
        self.cli_db_path = Some(path.into());
        self
    }
}

impl OpenMemoryConfig {
    /// Load a single config from a path (no layering).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("loading config from path: {}", path.display());
        let value = layer_io::read_json5(path, "config")?;
        config_from_value(value, "config")
    }

    /// Load a single config from JSON5 contents (no layering).
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value: Value =
            json5::from_str(contents).map_err(|source| ConfigError::ParseFailed {
                layer: "config".to_string(),
                source,
            })?;
        config_from_value(value, "config")
    }

    /// Load a layered config stack using the default layer locations.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        info!(
            "loading layered config with defaults (cwd={})",
            cwd.as_ref().display()
        );
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Load a layered config stack using explicit layer locations and overrides.
    ///
    /// Layer precedence (low -> high): user, project, cwd, runtime files,
    /// environment, command line.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let cwd = utils::normalize_path(&options.cwd)?;
        debug!("normalized cwd for config load: {}", cwd.display());
        let mut layers = Vec::new();
        let mut merge_layers = Vec::new();
        let mut seen_paths = HashSet::new();

        if let Some(path) = options.user_config_path.as_deref() {
            load_file_layer(
                ConfigLayerSource::User,
                path,
                &mut layers,
                &mut merge_layers,
                &mut seen_paths,
            )?;
        }

        match utils::find_project_root(&cwd, &options.project_root_markers) {
            Some(project_root) => {
                debug!("resolved project root: {}", project_root.display());
                let path = project_root.join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILE);
                load_file_layer(
                    ConfigLayerSource::Project,
                    &path,
                    &mut layers,
                    &mut merge_layers,
                    &mut seen_paths,
                )?;
            }
            None => debug!("project root not found; skipping project layer"),
        }

        let cwd_path = cwd.join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILE);
        load_file_layer(
            ConfigLayerSource::Cwd,
            &cwd_path,
            &mut layers,
            &mut merge_layers,
            &mut seen_paths,
        )?;

        for runtime_path in &options.runtime_paths {
            let loaded = layer_io::load_required_layer(ConfigLayerSource::Runtime, runtime_path)?;
            debug!("loaded runtime layer (path={})", runtime_path.display());
            layers.push(loaded.meta.clone());
            merge_layers.push(loaded);
        }

        for (source, db_path) in [
            (ConfigLayerSource::Env, options.env_db_path.as_ref()),
            (ConfigLayerSource::Cli, options.cli_db_path.as_ref()),
        ] {
            if let Some(db_path) = db_path {
                if db_path.trim().is_empty() {
                    return Err(ConfigError::InvalidOverride {
                        layer: layer_io::override_label(source),
                        message: "storage.path must not be empty".to_string(),
                    });
                }
                debug!("applying storage.path override (source={source:?}, path={db_path})");
                let meta = ConfigLayer { source, path: None };
                layers.push(meta.clone());
                merge_layers.push(LoadedLayer {
                    meta,
                    value: json!({ "storage": { "path": db_path } }),
                });
            }
        }

        let mut merged = Value::Object(serde_json::Map::new());
        for layer in merge_layers {
            merge::merge_json_values(&mut merged, &layer.value);
        }

        let config = config_from_value(merged, "effective")?;
        info!(
            "layered config loaded (layers={}, db_path={})",
            layers.len(),
            config.storage.path
        );
        Ok(LayeredConfig { config, layers })
    }

    /// Validate configuration invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.path.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.path must not be empty".to_string()));
        }
        if self.sequence.cap == 0 {
            return Err(ConfigError::Invalid("sequence.cap must be positive".to_string()));
        }
        if self.abstract_config.lookback_days == 0 {
            return Err(ConfigError::Invalid(
                "abstract.lookback_days must be positive".to_string(),
            ));
        }
        if self.abstract_config.incremental_window == 0 || self.abstract_config.rebuild_window == 0 {
            return Err(ConfigError::Invalid(
                "abstract windows must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Internal representation of a loaded config layer.
#[derive(Debug, Clone)]
struct LoadedLayer {
    meta: ConfigLayer,
    value: Value,
}

fn config_from_value(value: Value, label: &str) -> Result<OpenMemoryConfig, ConfigError> {
    schema::validate_layer_schema(&value, SchemaMode::Full, label)?;
    let config: OpenMemoryConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}

fn load_file_layer(
    source: ConfigLayerSource,
    path: &Path,
    layers: &mut Vec<ConfigLayer>,
    merge_layers: &mut Vec<LoadedLayer>,
    seen_paths: &mut HashSet<PathBuf>,
) -> Result<(), ConfigError> {
    if !path.exists() {
        debug!(
            "skipping missing layer (source={:?}, path={})",
            source,
            path.display()
        );
        return Ok(());
    }
    let unique = utils::unique_path(path);
    if !seen_paths.insert(unique) {
        debug!(
            "skipping duplicate layer (source={:?}, path={})",
            source,
            path.display()
        );
        return Ok(());
    }
    let loaded = layer_io::load_required_layer(source, path)?;
    debug!("loaded layer (source={:?}, path={})", source, path.display());
    layers.push(loaded.meta.clone());
    merge_layers.push(loaded);
    Ok(())
}
