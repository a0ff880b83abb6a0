//! IO helpers for reading config layers from disk.

use super::{
    ConfigLayer, ConfigLayerSource, DB_PATH_ENV, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE,
    LoadedLayer, SchemaMode, schema,
};
use crate::ConfigError;
use directories::UserDirs;
use log::debug;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Load and validate a required layer from disk.
pub(super) fn load_required_layer(
    source: ConfigLayerSource,
    path: &Path,
) -> Result<LoadedLayer, ConfigError> {
    debug!(
        "loading config layer (source={:?}, path={})",
        source,
        path.display()
    );
    let label = layer_label(source, path);
    let value = read_json5(path, &label)?;
    schema::validate_layer_schema(&value, SchemaMode::Partial, &label)?;
    Ok(LoadedLayer {
        meta: ConfigLayer {
            source,
            path: Some(path.to_path_buf()),
        },
        value,
    })
}

/// Read a JSON5 file, attributing failures to `label`.
pub(super) fn read_json5(path: &Path, label: &str) -> Result<Value, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    json5::from_str(&contents).map_err(|source| ConfigError::ParseFailed {
        layer: label.to_string(),
        source,
    })
}

/// Build a user-friendly label for file layer errors.
pub(super) fn layer_label(source: ConfigLayerSource, path: &Path) -> String {
    format!("{}({})", source_name(source), path.display())
}

/// Label for an override layer, naming the variable or flag it came from.
pub(super) fn override_label(source: ConfigLayerSource) -> String {
    let origin = match source {
        ConfigLayerSource::Env => DB_PATH_ENV,
        _ => "--db-path",
    };
    format!("{}({origin})", source_name(source))
}

fn source_name(source: ConfigLayerSource) -> &'static str {
    match source {
        ConfigLayerSource::User => "user",
        ConfigLayerSource::Project => "project",
        ConfigLayerSource::Cwd => "cwd",
        ConfigLayerSource::Runtime => "runtime",
        ConfigLayerSource::Env => "env",
        ConfigLayerSource::Cli => "cli",
    }
}

/// Default user config path under the home directory.
pub(super) fn default_user_config_path() -> Option<PathBuf> {
    UserDirs::new().map(|dirs| {
        dirs.home_dir()
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILE)
    })
}
