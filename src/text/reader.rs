//! Reads a directory into an artifact tree.

use crate::artifact::{Artifact, ArtifactData, PROPERTY_LINE_END, PROPERTY_LINE_START};
use crate::config::ReaderConfig;
use crate::error::{ApiError, StorageError};
use crate::text::path::canonicalize_root;
use crate::text::walker::{Entry, Walker, WalkerConfig};
use crate::text::{ArtifactReader, BINARY_PLUGIN, BLOB_KIND, PROPERTY_FINAL_NEWLINE, TEXT_PLUGIN};
use crate::tree::{Node, RootNode};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, instrument};

pub struct TextReader {
    config: ReaderConfig,
}

impl TextReader {
    pub fn new(config: ReaderConfig) -> Self {
        Self { config }
    }

    fn file_node(&self, path: String, absolute: &Path) -> Result<Node, StorageError> {
        let bytes = std::fs::read(absolute)?;
        let node = match String::from_utf8(bytes) {
            Ok(text) => text_file(path, &text),
            Err(err) => {
                let blob = Node::new(Artifact::new(ArtifactData::Generic {
                    kind: BLOB_KIND.to_string(),
                    value: hex::encode(err.as_bytes()),
                }));
                Node::new(Artifact::new(ArtifactData::File {
                    plugin: BINARY_PLUGIN.to_string(),
                    path,
                }))
                .with_child(blob)
            }
        };
        Ok(node)
    }
}

/// One ordered line artifact per line. Line terminators are not part of the
/// line; whether the file ended with one is kept as a property.
pub fn text_file(path: String, text: &str) -> Node {
    let final_newline = text.ends_with('\n');
    let lines: Vec<&str> = match text.strip_suffix('\n') {
        Some(body) => body.split('\n').collect(),
        None if text.is_empty() => Vec::new(),
        None => text.split('\n').collect(),
    };
    let artifact = Artifact::new(ArtifactData::File {
        plugin: TEXT_PLUGIN.to_string(),
        path,
    })
    .with_property(PROPERTY_LINE_START, "1")
    .with_property(PROPERTY_LINE_END, lines.len().to_string())
    .with_property(PROPERTY_FINAL_NEWLINE, final_newline.to_string());

    Node::new(artifact).with_children(lines.into_iter().map(|line| {
        Node::new(Artifact::new(ArtifactData::Line {
            text: line.to_string(),
        }))
    }))
}

impl ArtifactReader for TextReader {
    #[instrument(skip(self), fields(root = %root.display()))]
    fn read(&self, root: &Path) -> Result<RootNode, ApiError> {
        let start = Instant::now();
        let root = canonicalize_root(root)?;
        let entries = Walker::new(root, WalkerConfig::from(&self.config)).walk()?;

        let mut nodes: BTreeMap<String, Node> = BTreeMap::new();
        for entry in entries {
            match entry {
                Entry::Directory { path } => {
                    let node = Node::new(Artifact::new(ArtifactData::Directory { path: path.clone() }));
                    nodes.insert(path, node);
                }
                Entry::File { path, absolute } => {
                    let node = self.file_node(path.clone(), &absolute)?;
                    nodes.insert(path, node);
                }
            }
        }
        let files = nodes
            .values()
            .filter(|n| matches!(n.artifact.data, ArtifactData::File { .. }))
            .count();

        // Parents sort before their descendants, so walking backwards attaches
        // every node before its parent is moved.
        let keys: Vec<String> = nodes.keys().rev().cloned().collect();
        let mut tree = RootNode::new();
        for key in keys {
            let Some(node) = nodes.remove(&key) else {
                continue;
            };
            let parent = key.rsplit_once('/').and_then(|(parent, _)| nodes.get_mut(parent));
            match parent {
                Some(parent) => parent.children.push(node),
                None => tree.children.push(node),
            }
        }
        sort_unordered(&mut tree.children);

        debug!(
            files,
            artifacts = tree.unique_count(),
            duration_ms = start.elapsed().as_millis(),
            "directory read"
        );
        Ok(tree)
    }
}

fn sort_unordered(nodes: &mut [Node]) {
    nodes.sort_by(|a, b| a.artifact.data.cmp(&b.artifact.data));
    for node in nodes.iter_mut().filter(|n| !n.artifact.ordered) {
        sort_unordered(&mut node.children);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_text_file_lines() {
        let node = text_file("a.txt".to_string(), "one\ntwo\n");
        assert!(node.artifact.ordered);
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.artifact.properties[PROPERTY_LINE_END], "2");
        assert_eq!(node.artifact.properties[PROPERTY_FINAL_NEWLINE], "true");

        let blank_line = text_file("b.txt".to_string(), "one\n\n");
        assert_eq!(blank_line.children.len(), 2);
        assert!(text_file("c.txt".to_string(), "").children.is_empty());
    }

    #[test]
    fn test_read_nests_directories() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("src/util")).unwrap();
        fs::write(temp_dir.path().join("src/util/io.c"), "x\n").unwrap();
        fs::write(temp_dir.path().join("src-main.c"), "y\n").unwrap();
        fs::create_dir(temp_dir.path().join(".strata")).unwrap();
        fs::write(temp_dir.path().join(".strata/config.toml"), "").unwrap();

        let tree = TextReader::new(ReaderConfig::default())
            .read(temp_dir.path())
            .unwrap();
        // src/ and src-main.c at the top; .strata is ignored
        assert_eq!(tree.children.len(), 2);
        let src = tree
            .children
            .iter()
            .find(|n| n.artifact.data == ArtifactData::Directory { path: "src".to_string() })
            .unwrap();
        assert_eq!(src.children.len(), 1);
        let util = &src.children[0];
        assert_eq!(
            util.children[0].artifact.data,
            ArtifactData::File {
                plugin: TEXT_PLUGIN.to_string(),
                path: "src/util/io.c".to_string()
            }
        );
    }
}
