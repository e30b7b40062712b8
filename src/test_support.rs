//! Tree builders shared by unit tests.

use crate::artifact::{Artifact, ArtifactData};
use crate::tree::{Node, RootNode};

pub(crate) fn item(value: &str) -> Node {
    Node::new(Artifact::new(ArtifactData::Generic {
        kind: "item".to_string(),
        value: value.to_string(),
    }))
}

/// `dir { values... }`
pub(crate) fn items(values: &[&str]) -> RootNode {
    RootNode::new().with_child(item("dir").with_children(values.iter().map(|v| item(v))))
}

/// A text file node with one ordered child per line.
pub(crate) fn text_file(path: &str, lines: &[&str]) -> RootNode {
    let file = Node::new(Artifact::new(ArtifactData::File {
        plugin: "text".to_string(),
        path: path.to_string(),
    }));
    RootNode::new().with_child(file.with_children(lines.iter().map(|l| {
        Node::new(Artifact::new(ArtifactData::Line {
            text: l.to_string(),
        }))
    })))
}
