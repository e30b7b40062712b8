//! Text artifact adapter.
//!
//! Reads a directory into an artifact tree of directories, files and lines,
//! and writes composed trees back out. UTF-8 files become ordered file nodes
//! with one line artifact per line; other files are kept as a single hex
//! encoded blob.

pub mod path;
pub mod reader;
pub mod walker;
pub mod writer;

pub use reader::TextReader;
pub use writer::TextWriter;

use crate::error::ApiError;
use crate::tree::RootNode;
use std::path::Path;

/// Plugin name of line-structured files.
pub const TEXT_PLUGIN: &str = "text";
/// Plugin name of files stored as one opaque blob.
pub const BINARY_PLUGIN: &str = "binary";
/// Artifact kind of the blob under a binary file.
pub const BLOB_KIND: &str = "blob";
/// File property recording whether the last line ended with a newline.
pub const PROPERTY_FINAL_NEWLINE: &str = "final_newline";

/// Turns a directory into an artifact tree.
pub trait ArtifactReader {
    fn read(&self, root: &Path) -> Result<RootNode, ApiError>;
}

/// Writes an artifact tree below a directory. Returns the number of files written.
pub trait ArtifactWriter {
    fn write(&self, root: &Path, tree: &RootNode) -> Result<usize, ApiError>;
}
