//! Core identifier types shared across the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// BLAKE3 digest used for path keys, commit ids and repository digests.
pub type Hash = [u8; 32];

/// Feature identifier. Stable for the lifetime of the repository.
pub type FeatureId = String;

/// Revision identifier, unique within its feature.
pub type RevisionId = String;

/// Revision assumed when a configuration names a feature without one.
pub const DEFAULT_REVISION: &str = "1";

/// Index of an association in the repository arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssociationId(pub u64);

impl fmt::Display for AssociationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A globally unique reference to one revision of one feature.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RevisionRef {
    pub feature: FeatureId,
    pub revision: RevisionId,
}

impl RevisionRef {
    pub fn new(feature: impl Into<FeatureId>, revision: impl Into<RevisionId>) -> Self {
        Self {
            feature: feature.into(),
            revision: revision.into(),
        }
    }
}

impl fmt::Display for RevisionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.feature, self.revision)
    }
}

/// Render a hash as lowercase hex.
pub fn hash_to_hex(hash: &Hash) -> String {
    hex::encode(hash)
}
