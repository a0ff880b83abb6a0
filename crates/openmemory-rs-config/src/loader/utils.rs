//! Path helpers for config layer discovery.

use crate::ConfigError;
use std::path::{Path, PathBuf};

/// Canonicalize a path when it exists; a missing path is returned as given.
pub(super) fn normalize_path(path: &Path) -> Result<PathBuf, ConfigError> {
    match path.canonicalize() {
        Ok(path) => Ok(path),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(path.to_path_buf()),
        Err(err) => Err(ConfigError::Io(err)),
    }
}

/// Key used to skip a layer file already loaded under another source.
pub(super) fn unique_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Nearest ancestor of `cwd` (inclusive) containing one of `markers`.
pub(super) fn find_project_root(cwd: &Path, markers: &[String]) -> Option<PathBuf> {
    cwd.ancestors()
        .find(|ancestor| markers.iter().any(|marker| ancestor.join(marker).exists()))
        .map(Path::to_path_buf)
}
