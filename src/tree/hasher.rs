//! Path keys for tree nodes using BLAKE3
//!
//! A node's path key identifies it by the artifact identities on its path from
//! the root, so the same artifact gets the same key in every association tree
//! it appears in.

use crate::artifact::{Artifact, ArtifactPayload};
use crate::types::Hash;
use blake3::Hasher;

/// Key of the implicit root.
pub fn root_key() -> Hash {
    compute_hash(b"root")
}

/// PathKey = hash("node" || parent_key || identity(data) || sequence)
pub fn path_key(parent: &Hash, artifact: &Artifact) -> Hash {
    let mut hasher = Hasher::new();

    // Hash type discriminator
    hasher.update(b"node");

    hasher.update(parent);

    artifact.data.hash_identity(&mut hasher);

    // Sequence number (presence flag + 4 bytes, big-endian)
    match artifact.sequence {
        Some(seq) => {
            hasher.update(&[1]);
            hasher.update(&seq.to_be_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }

    *hasher.finalize().as_bytes()
}

/// Compute a generic hash of arbitrary data
pub fn compute_hash(data: &[u8]) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(data);
    *hasher.finalize().as_bytes()
}
