//! Path normalization for artifact paths.
//!
//! Artifact paths are relative, `/`-separated and NFC-normalized so the same
//! file read on different platforms yields the same artifact identity.

use crate::error::StorageError;
use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Canonicalize a directory used as a read root.
pub fn canonicalize_root(path: &Path) -> Result<PathBuf, StorageError> {
    dunce::canonicalize(path).map_err(|e| {
        StorageError::InvalidPath(format!(
            "Failed to canonicalize {}: {}",
            path.display(),
            e
        ))
    })
}

/// Artifact path of `path` below `root`.
pub fn relative_artifact_path(root: &Path, path: &Path) -> Result<String, StorageError> {
    let relative = path.strip_prefix(root).map_err(|_| {
        StorageError::InvalidPath(format!(
            "{} is not below {}",
            path.display(),
            root.display()
        ))
    })?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => {
                let name = name.to_str().ok_or_else(|| {
                    StorageError::InvalidPath(format!("{} is not valid UTF-8", path.display()))
                })?;
                parts.push(name.nfc().collect::<String>());
            }
            Component::CurDir => {}
            _ => {
                return Err(StorageError::InvalidPath(format!(
                    "unexpected component in {}",
                    relative.display()
                )))
            }
        }
    }
    Ok(parts.join("/"))
}

/// Joins an artifact path onto `root`, refusing anything that would escape it.
pub fn safe_join(root: &Path, artifact_path: &str) -> Result<PathBuf, StorageError> {
    let mut joined = root.to_path_buf();
    for part in artifact_path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                return Err(StorageError::InvalidPath(format!(
                    "artifact path {} leaves the output directory",
                    artifact_path
                )))
            }
            part if Path::new(part).is_absolute() || part.contains('\\') => {
                return Err(StorageError::InvalidPath(format!(
                    "artifact path {} is not relative",
                    artifact_path
                )))
            }
            part => joined.push(part),
        }
    }
    Ok(joined)
}
