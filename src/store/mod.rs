//! Repository Store
//!
//! Persists a repository as one record per feature, module, association,
//! sequence graph and commit, plus a metadata record carrying the format
//! version. Records are bincode-encoded.

pub mod persistence;

pub use persistence::SledRepositoryStore;

use crate::error::StorageError;
use crate::repository::Repository;
use serde::{Deserialize, Serialize};

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// Repository-wide scalars stored next to the records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub version: u32,
    pub max_order: u64,
    pub next_association: u64,
}

/// RepositoryStore interface
pub trait RepositoryStore {
    /// Replaces the stored repository.
    fn save(&self, repository: &Repository) -> Result<(), StorageError>;

    /// Loads the stored repository, `None` when nothing was saved yet.
    fn load(&self) -> Result<Option<Repository>, StorageError>;

    /// Whether a repository has been saved.
    fn exists(&self) -> Result<bool, StorageError>;
}
