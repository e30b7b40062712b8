//! Shared access to one repository from several threads.
//!
//! Checkouts take the lock shared and run concurrently; extraction and the
//! whole-repository operations take it exclusively. Mutations stage their
//! changes internally, so a failed write leaves readers on the prior state.

use crate::composition::MaterializedCheckout;
use crate::error::ApiError;
use crate::feature::Configuration;
use crate::repository::{Commit, Repository};
use crate::tree::RootNode;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct SharedRepository {
    inner: Arc<RwLock<Repository>>,
}

impl SharedRepository {
    pub fn new(repository: Repository) -> Self {
        Self {
            inner: Arc::new(RwLock::new(repository)),
        }
    }

    pub fn read<T>(&self, f: impl FnOnce(&Repository) -> T) -> T {
        f(&self.inner.read())
    }

    pub fn write<T>(&self, f: impl FnOnce(&mut Repository) -> T) -> T {
        f(&mut self.inner.write())
    }

    pub fn extract(
        &self,
        configuration: &Configuration,
        tree: RootNode,
        message: Option<String>,
    ) -> Result<Commit, ApiError> {
        self.write(|repository| repository.extract(configuration, tree, message))
    }

    /// Composes and materializes under the shared lock.
    pub fn checkout(&self, configuration: &Configuration) -> Result<MaterializedCheckout, ApiError> {
        self.read(|repository| {
            let checkout = repository.compose(configuration, true)?;
            Ok(checkout.into_materialized())
        })
    }

    /// A detached copy of the current state.
    pub fn snapshot(&self) -> Repository {
        self.read(Repository::clone)
    }

    /// Replaces the state wholesale, e.g. after loading from a store.
    pub fn replace(&self, repository: Repository) -> Repository {
        debug!("replacing shared repository state");
        std::mem::replace(&mut *self.inner.write(), repository)
    }
}
