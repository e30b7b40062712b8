//! Filesystem walker for reading a directory into artifacts

use crate::config::ReaderConfig;
use crate::error::StorageError;
use crate::text::path::relative_artifact_path;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Filesystem entry with its artifact path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    File { path: String, absolute: PathBuf },
    Directory { path: String },
}

impl Entry {
    pub fn path(&self) -> &str {
        match self {
            Entry::File { path, .. } | Entry::Directory { path } => path,
        }
    }
}

/// Filesystem walker configuration
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Whether to follow symbolic links (default: false for determinism)
    pub follow_symlinks: bool,
    /// Names skipped together with everything below them
    pub ignore_patterns: Vec<String>,
}

impl From<&ReaderConfig> for WalkerConfig {
    fn from(config: &ReaderConfig) -> Self {
        Self {
            follow_symlinks: config.follow_symlinks,
            ignore_patterns: config.ignore.clone(),
        }
    }
}

/// Filesystem walker
pub struct Walker {
    root: PathBuf,
    config: WalkerConfig,
}

impl Walker {
    pub fn new(root: PathBuf, config: WalkerConfig) -> Self {
        Self { root, config }
    }

    /// Walk the filesystem and collect all entries below the root.
    ///
    /// Returns entries sorted by artifact path for determinism.
    pub fn walk(&self) -> Result<Vec<Entry>, StorageError> {
        let mut entries = Vec::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| !self.should_ignore(entry));

        for entry in walker {
            let entry = entry.map_err(|e| {
                StorageError::IoError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to walk directory: {}", e),
                ))
            })?;
            let path = relative_artifact_path(&self.root, entry.path())?;
            let file_type = entry.file_type();

            if file_type.is_file() {
                entries.push(Entry::File {
                    path,
                    absolute: entry.path().to_path_buf(),
                });
            } else if file_type.is_dir() {
                entries.push(Entry::Directory { path });
            }
            // Symlinks that are not followed are skipped
        }

        entries.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(entries)
    }

    /// An entry is ignored when its own name matches a pattern.
    fn should_ignore(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        self.config.ignore_patterns.iter().any(|p| *p == name)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
