//! Persistence layer for the Repository Store

use crate::association::Association;
use crate::error::StorageError;
use crate::feature::Feature;
use crate::module::ModuleEntry;
use crate::repository::{Commit, Repository};
use crate::store::{RepositoryStore, StoreMetadata, FORMAT_VERSION};
use crate::tree::SequenceGraph;
use crate::types::Hash;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{
    ConflictableTransactionResult, TransactionError, Transactional, TransactionalTree,
};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, instrument};

const META_KEY: &[u8] = b"meta";
const FEATURES: &str = "features";
const MODULES: &str = "modules";
const ASSOCIATIONS: &str = "associations";
const SEQUENCE_GRAPHS: &str = "sequence_graphs";
const COMMITS: &str = "commits";

fn decode<V: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<V, StorageError> {
    bincode::deserialize(bytes)
        .map_err(|e| StorageError::CorruptRecord(format!("{}: {}", what, e)))
}

/// Pending replacement of one record tree.
struct TreeWrite {
    tree: sled::Tree,
    stale: Vec<sled::IVec>,
    records: Vec<(Vec<u8>, Vec<u8>)>,
}

impl TreeWrite {
    fn apply(&self, tree: &TransactionalTree) -> ConflictableTransactionResult<(), StorageError> {
        for key in &self.stale {
            tree.remove(key.clone())?;
        }
        for (key, value) in &self.records {
            tree.insert(key.as_slice(), value.as_slice())?;
        }
        Ok(())
    }
}

/// Sled-based implementation of RepositoryStore
///
/// Each record kind lives in its own sled tree. A save replaces all record
/// trees and the metadata record in one multi-tree transaction, so an
/// interrupted save leaves the previously saved repository readable.
pub struct SledRepositoryStore {
    db: sled::Db,
}

impl SledRepositoryStore {
    /// Open (or create) a store at the given directory.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!(
                    "Failed to open sled database at {}: {}",
                    path.as_ref().display(),
                    e
                ),
            ))
        })?;
        Ok(Self { db })
    }

    /// Get the underlying sled database (for advanced operations)
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    /// Encodes one record tree and collects the keys it currently holds.
    fn plan_tree<'v, K, V>(
        &self,
        name: &'static str,
        records: impl IntoIterator<Item = (K, &'v V)>,
    ) -> Result<TreeWrite, StorageError>
    where
        K: AsRef<[u8]>,
        V: Serialize + 'v,
    {
        let tree = self.db.open_tree(name)?;
        let mut stale = Vec::new();
        for key in tree.iter().keys() {
            stale.push(key?);
        }
        let mut encoded = Vec::new();
        for (key, value) in records {
            encoded.push((key.as_ref().to_vec(), bincode::serialize(value)?));
        }
        Ok(TreeWrite {
            tree,
            stale,
            records: encoded,
        })
    }

    fn read_tree<V: DeserializeOwned>(
        &self,
        name: &str,
    ) -> Result<Vec<(sled::IVec, V)>, StorageError> {
        let tree = self.db.open_tree(name)?;
        let mut records = Vec::new();
        for item in tree.iter() {
            let (key, value) = item?;
            let record = decode(&value, name)?;
            records.push((key, record));
        }
        Ok(records)
    }
}

impl RepositoryStore for SledRepositoryStore {
    #[instrument(skip(self, repository), fields(associations = repository.associations().len()))]
    fn save(&self, repository: &Repository) -> Result<(), StorageError> {
        let features = self.plan_tree(
            FEATURES,
            repository.features().iter().map(|(id, f)| (id.as_bytes(), f)),
        )?;
        let mut module_records = Vec::with_capacity(repository.modules().len());
        for (module, entry) in repository.modules() {
            module_records.push((bincode::serialize(module)?, entry));
        }
        let modules = self.plan_tree(MODULES, module_records)?;
        let associations = self.plan_tree(
            ASSOCIATIONS,
            repository
                .associations()
                .iter()
                .map(|(id, a)| (id.0.to_be_bytes(), a)),
        )?;
        let sequence_graphs = self.plan_tree(SEQUENCE_GRAPHS, repository.sequence_graphs().iter())?;
        let commits = self.plan_tree(
            COMMITS,
            repository
                .commits()
                .iter()
                .enumerate()
                .map(|(i, c)| ((i as u64).to_be_bytes(), c)),
        )?;

        let metadata = bincode::serialize(&StoreMetadata {
            version: FORMAT_VERSION,
            max_order: repository.max_order() as u64,
            next_association: repository.next_association_id().0,
        })?;

        let root: &sled::Tree = &self.db;
        (
            &features.tree,
            &modules.tree,
            &associations.tree,
            &sequence_graphs.tree,
            &commits.tree,
            root,
        )
            .transaction(|(f, m, a, s, c, meta)| -> ConflictableTransactionResult<(), StorageError> {
                features.apply(f)?;
                modules.apply(m)?;
                associations.apply(a)?;
                sequence_graphs.apply(s)?;
                commits.apply(c)?;
                meta.insert(META_KEY, metadata.as_slice())?;
                Ok(())
            })
            .map_err(|e| match e {
                TransactionError::Abort(e) => e,
                TransactionError::Storage(e) => StorageError::from(e),
            })?;
        self.flush()?;

        debug!(
            features = features.records.len(),
            modules = modules.records.len(),
            associations = associations.records.len(),
            "repository saved"
        );
        Ok(())
    }

    #[instrument(skip(self))]
    fn load(&self) -> Result<Option<Repository>, StorageError> {
        let Some(raw) = self.db.get(META_KEY)? else {
            return Ok(None);
        };
        let metadata: StoreMetadata = decode(&raw, "metadata")?;
        if metadata.version != FORMAT_VERSION {
            return Err(StorageError::UnsupportedVersion {
                expected: FORMAT_VERSION,
                found: metadata.version,
            });
        }

        let features = self
            .read_tree::<Feature>(FEATURES)?
            .into_iter()
            .map(|(_, f)| (f.id().clone(), f))
            .collect();

        let mut modules = BTreeMap::new();
        for (key, entry) in self.read_tree::<ModuleEntry>(MODULES)? {
            modules.insert(decode(&key, "module key")?, entry);
        }

        let associations = self
            .read_tree::<Association>(ASSOCIATIONS)?
            .into_iter()
            .map(|(_, a)| (a.id(), a))
            .collect();

        let mut sequence_graphs = BTreeMap::new();
        for (key, graph) in self.read_tree::<SequenceGraph>(SEQUENCE_GRAPHS)? {
            let key = Hash::try_from(key.as_ref()).map_err(|_| {
                StorageError::CorruptRecord(format!(
                    "sequence graph key of {} bytes",
                    key.len()
                ))
            })?;
            sequence_graphs.insert(key, graph);
        }

        let commits = self
            .read_tree::<Commit>(COMMITS)?
            .into_iter()
            .map(|(_, c)| c)
            .collect();

        let max_order = usize::try_from(metadata.max_order)
            .map_err(|_| StorageError::CorruptRecord("max order out of range".to_string()))?;
        let repository = Repository::from_records(
            features,
            modules,
            associations,
            sequence_graphs,
            commits,
            max_order,
            metadata.next_association,
        )
        .map_err(|e| StorageError::CorruptRecord(e.to_string()))?;
        Ok(Some(repository))
    }

    fn exists(&self) -> Result<bool, StorageError> {
        Ok(self.db.contains_key(META_KEY)?)
    }
}
