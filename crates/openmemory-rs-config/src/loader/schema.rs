//! Schema validation helpers for openmemory JSON5 configuration.

use super::SchemaMode;
use crate::ConfigError;
use serde_json::{Map, Value};

/// Validate a single config layer against the schema.
pub(super) fn validate_layer_schema(
    value: &Value,
    _mode: SchemaMode,
    layer: &str,
) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    let allowed = [
        "$schema", "storage", "sequence", "abstract", "capture", "recent",
    ];
    ensure_allowed_keys(map, &allowed, layer, "")?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("storage") {
        validate_storage(value, layer, "storage")?;
    }
    if let Some(value) = map.get("sequence") {
        validate_sequence(value, layer, "sequence")?;
    }
    if let Some(value) = map.get("abstract") {
        validate_abstract(value, layer, "abstract")?;
    }
    if let Some(value) = map.get("capture") {
        validate_capture(value, layer, "capture")?;
    }
    if let Some(value) = map.get("recent") {
        validate_recent(value, layer, "recent")?;
    }

    Ok(())
}

/// Validate the "storage" block.
fn validate_storage(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["path"], layer, path)?;
    if let Some(value) = map.get("path") {
        expect_string(value, layer, &join_path(path, "path"))?;
    }
    Ok(())
}

/// Validate the "sequence" block.
fn validate_sequence(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["eviction_window_secs", "cap"], layer, path)?;
    if let Some(value) = map.get("eviction_window_secs") {
        expect_u64(value, layer, &join_path(path, "eviction_window_secs"))?;
    }
    if let Some(value) = map.get("cap") {
        expect_u32(value, layer, &join_path(path, "cap"))?;
    }
    Ok(())
}

/// Validate the "abstract" block.
fn validate_abstract(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &["lookback_days", "incremental_window", "rebuild_window"],
        layer,
        path,
    )?;
    if let Some(value) = map.get("lookback_days") {
        expect_u32(value, layer, &join_path(path, "lookback_days"))?;
    }
    for key in ["incremental_window", "rebuild_window"] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

/// Validate the "capture" block.
fn validate_capture(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["min_message_chars"], layer, path)?;
    if let Some(value) = map.get("min_message_chars") {
        expect_u64(value, layer, &join_path(path, "min_message_chars"))?;
    }
    Ok(())
}

/// Validate the "recent" block.
fn validate_recent(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["default_max_days"], layer, path)?;
    if let Some(value) = map.get("default_max_days") {
        expect_u32(value, layer, &join_path(path, "default_max_days"))?;
    }
    Ok(())
}

/// Expect a JSON object or return a typed error.
fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid_field(layer, path, "expected object")),
    }
}

/// Expect a JSON string or return a typed error.
fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.as_str().is_some() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

/// Expect a non-negative JSON integer or return a typed error.
fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_u64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected non-negative integer"))
    }
}

/// Expect an integer that fits in 32 bits.
fn expect_u32(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    match value.as_u64() {
        Some(number) if u32::try_from(number).is_ok() => Ok(()),
        Some(_) => Err(invalid_field(layer, path, "integer out of range")),
        None => Err(invalid_field(layer, path, "expected non-negative integer")),
    }
}

/// Ensure an object contains only allowed keys.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    for key in map.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(invalid_field(layer, &join_path(path, key), "unknown key"));
        }
    }
    Ok(())
}

/// Join nested paths for better error messages.
fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Build a structured invalid-field error.
fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let normalized_path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        layer: layer.to_string(),
        path: normalized_path.to_string(),
        message: message.to_string(),
    }
}
