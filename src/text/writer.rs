//! Writes composed artifact trees to a directory.

use crate::artifact::ArtifactData;
use crate::error::{ApiError, StorageError};
use crate::text::path::safe_join;
use crate::text::{ArtifactWriter, BINARY_PLUGIN, BLOB_KIND, PROPERTY_FINAL_NEWLINE, TEXT_PLUGIN};
use crate::tree::{Node, RootNode};
use std::path::Path;
use tracing::{debug, instrument, warn};

#[derive(Debug, Default)]
pub struct TextWriter;

impl TextWriter {
    pub fn new() -> Self {
        Self
    }

    fn write_nodes(&self, root: &Path, nodes: &[Node]) -> Result<usize, StorageError> {
        let mut written = 0;
        for node in nodes {
            match &node.artifact.data {
                ArtifactData::Directory { path } => {
                    std::fs::create_dir_all(safe_join(root, path)?)?;
                    written += self.write_nodes(root, &node.children)?;
                }
                ArtifactData::File { plugin, path } => {
                    let target = safe_join(root, path)?;
                    if let Some(parent) = target.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    let bytes = match plugin.as_str() {
                        TEXT_PLUGIN => render_text(node).into_bytes(),
                        BINARY_PLUGIN => decode_blob(node)?,
                        other => {
                            warn!(plugin = other, path = %path, "no writer for plugin, skipped");
                            continue;
                        }
                    };
                    std::fs::write(&target, bytes)?;
                    written += 1;
                }
                other => {
                    warn!(artifact = %other, "unexpected artifact at directory level, skipped");
                }
            }
        }
        Ok(written)
    }
}

fn render_text(file: &Node) -> String {
    let lines: Vec<&str> = file
        .children
        .iter()
        .filter_map(|child| match &child.artifact.data {
            ArtifactData::Line { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    let mut text = lines.join("\n");
    let final_newline = file
        .artifact
        .properties
        .get(PROPERTY_FINAL_NEWLINE)
        .map_or(true, |v| v == "true");
    if final_newline && !lines.is_empty() {
        text.push('\n');
    }
    text
}

fn decode_blob(file: &Node) -> Result<Vec<u8>, StorageError> {
    let mut bytes = Vec::new();
    for child in &file.children {
        if let ArtifactData::Generic { kind, value } = &child.artifact.data {
            if kind == BLOB_KIND {
                bytes.extend(hex::decode(value).map_err(|e| {
                    StorageError::CorruptRecord(format!("blob is not valid hex: {}", e))
                })?);
            }
        }
    }
    Ok(bytes)
}

impl ArtifactWriter for TextWriter {
    #[instrument(skip(self, tree), fields(root = %root.display()))]
    fn write(&self, root: &Path, tree: &RootNode) -> Result<usize, ApiError> {
        std::fs::create_dir_all(root).map_err(StorageError::from)?;
        let written = self.write_nodes(root, &tree.children)?;
        debug!(files = written, "tree written");
        Ok(written)
    }
}
