//! Artifacts carried by tree nodes.
//!
//! The engine never interprets payloads beyond their identity. Identity is the
//! pair `(data, sequence)`: two artifacts under the same parent are the same
//! artifact iff both match. Properties, references and marks are carried along
//! but do not take part in identity.

use crate::types::Hash;
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Property key for the first line covered by a plugin node.
pub const PROPERTY_LINE_START: &str = "line_start";
/// Property key for the last line covered by a plugin node.
pub const PROPERTY_LINE_END: &str = "line_end";

/// Artifact payload keyed by content kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ArtifactData {
    Directory { path: String },
    File { plugin: String, path: String },
    Line { text: String },
    Generic { kind: String, value: String },
}

/// Capabilities the structural operations need from a payload.
pub trait ArtifactPayload {
    /// Short kind name used for logging and hashing.
    fn kind(&self) -> &str;

    /// Whether nodes carrying this payload keep their children ordered by default.
    fn orders_children(&self) -> bool;

    /// Feeds the identity-relevant bytes into a hasher.
    fn hash_identity(&self, hasher: &mut Hasher);

    /// Human readable label.
    fn label(&self) -> String;
}

fn update_str(hasher: &mut Hasher, value: &str) {
    hasher.update(&(value.len() as u64).to_be_bytes());
    hasher.update(value.as_bytes());
}

impl ArtifactPayload for ArtifactData {
    fn kind(&self) -> &str {
        match self {
            ArtifactData::Directory { .. } => "directory",
            ArtifactData::File { .. } => "file",
            ArtifactData::Line { .. } => "line",
            ArtifactData::Generic { kind, .. } => kind,
        }
    }

    fn orders_children(&self) -> bool {
        matches!(self, ArtifactData::File { .. })
    }

    fn hash_identity(&self, hasher: &mut Hasher) {
        match self {
            ArtifactData::Directory { path } => {
                hasher.update(b"directory");
                update_str(hasher, path);
            }
            ArtifactData::File { plugin, path } => {
                hasher.update(b"file");
                update_str(hasher, plugin);
                update_str(hasher, path);
            }
            ArtifactData::Line { text } => {
                hasher.update(b"line");
                update_str(hasher, text);
            }
            ArtifactData::Generic { kind, value } => {
                hasher.update(b"generic");
                update_str(hasher, kind);
                update_str(hasher, value);
            }
        }
    }

    fn label(&self) -> String {
        match self {
            ArtifactData::Directory { path } => format!("{}/", path),
            ArtifactData::File { path, .. } => path.clone(),
            ArtifactData::Line { text } => text.clone(),
            ArtifactData::Generic { kind, value } => format!("{}:{}", kind, value),
        }
    }
}

impl fmt::Display for ArtifactData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A cross reference to another node, by path key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub target: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub data: ArtifactData,
    /// Children of nodes carrying this artifact are ordered.
    pub ordered: bool,
    /// Position assigned by the parent's sequence graph, ordered parents only.
    pub sequence: Option<u32>,
    #[serde(default)]
    pub references: Vec<ArtifactRef>,
    #[serde(default)]
    pub marked: bool,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Artifact {
    pub fn new(data: ArtifactData) -> Self {
        let ordered = data.orders_children();
        Self {
            data,
            ordered,
            sequence: None,
            references: Vec::new(),
            marked: false,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_reference(mut self, target: Hash) -> Self {
        self.references.push(ArtifactRef { target });
        self
    }

    pub fn identity(&self) -> (&ArtifactData, Option<u32>) {
        (&self.data, self.sequence)
    }

    pub fn same_identity(&self, other: &Artifact) -> bool {
        self.identity() == other.identity()
    }

    /// Folds properties and references of an identical artifact into this one.
    pub fn absorb(&mut self, other: &Artifact) {
        for (key, value) in &other.properties {
            self.properties
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        for reference in &other.references {
            if !self.references.contains(reference) {
                self.references.push(reference.clone());
            }
        }
        self.marked |= other.marked;
    }

    pub fn label(&self) -> String {
        match self.sequence {
            Some(seq) => format!("{}@{}", self.data.label(), seq),
            None => self.data.label(),
        }
    }
}
