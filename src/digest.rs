//! Content digest of a repository.
//!
//! Every logical record becomes one Merkle leaf. The root identifies the
//! repository state independently of how or where it is stored, so a copy,
//! a reloaded store and the live repository agree on it.

use crate::error::StorageError;
use crate::repository::Repository;
use crate::types::Hash;
use rs_merkle::{Hasher, MerkleTree};
use serde::Serialize;

#[derive(Clone)]
pub struct Blake3Algorithm;

impl Hasher for Blake3Algorithm {
    type Hash = Hash;

    fn hash(data: &[u8]) -> Hash {
        *blake3::hash(data).as_bytes()
    }
}

fn leaf<T: Serialize + ?Sized>(domain: &str, value: &T) -> Result<Hash, StorageError> {
    let bytes = bincode::serialize(value)?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain.as_bytes());
    hasher.update(&[0]);
    hasher.update(&bytes);
    Ok(*hasher.finalize().as_bytes())
}

impl Repository {
    /// Merkle root over features, modules, associations, sequence graphs,
    /// commits and the module order bound.
    pub fn digest(&self) -> Result<Hash, StorageError> {
        let mut leaves = vec![leaf("max_order", &(self.max_order() as u64))?];
        for feature in self.features().values() {
            leaves.push(leaf("feature", feature)?);
        }
        for entry in self.modules() {
            leaves.push(leaf("module", &entry)?);
        }
        for association in self.associations().values() {
            leaves.push(leaf("association", association)?);
        }
        for entry in self.sequence_graphs() {
            leaves.push(leaf("sequence", &entry)?);
        }
        for commit in self.commits() {
            leaves.push(leaf("commit", commit)?);
        }

        let tree = MerkleTree::<Blake3Algorithm>::from_leaves(&leaves);
        // max_order always contributes a leaf
        tree.root().ok_or_else(|| StorageError::CorruptRecord("empty digest tree".to_string()))
    }
}
