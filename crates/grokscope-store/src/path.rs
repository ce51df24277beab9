use std::fs;
use std::path::Path;

use grokscope_core::normalize_path;

use crate::StoreError;

/// Resolves `path` to the key annotations are stored under.
///
/// Symlinks and relative components are resolved against the filesystem, so a
/// file that does not exist (or a dangling symlink) cannot carry annotations.
pub fn canonical_path(path: impl AsRef<Path>) -> Result<String, StoreError> {
    let path = path.as_ref();
    let resolved = fs::canonicalize(path).map_err(|source| StoreError::PathUnresolvable {
        path: path.display().to_string(),
        source,
    })?;

    Ok(normalize_path(&resolved.to_string_lossy()))
}
