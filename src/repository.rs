//! Repository: features, modules, associations and the commit log.
//!
//! The repository is the sole mutation surface. Every mutating operation runs
//! against a staged copy that replaces the live state only once the whole
//! operation has succeeded, so readers never observe a half-sliced partition
//! and failed operations leave no trace.

pub mod extract;
pub mod ops;
pub mod query;

use crate::association::Association;
use crate::condition::PresenceCondition;
use crate::error::ApiError;
use crate::feature::{Configuration, Feature};
use crate::module::{retrofit_feature, ModuleTable};
use crate::tree::{RootNode, SequenceGraphs};
use crate::types::{hash_to_hex, AssociationId, FeatureId, RevisionRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Default bound on module order.
pub const DEFAULT_MAX_ORDER: usize = 2;

/// Immutable record of one extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    pub configuration: Configuration,
    pub timestamp: DateTime<Utc>,
    pub message: Option<String>,
    /// Associations created by the extraction.
    pub associations: Vec<AssociationId>,
}

impl Commit {
    pub(crate) fn new(
        configuration: Configuration,
        message: Option<String>,
        associations: Vec<AssociationId>,
        position: usize,
    ) -> Self {
        let timestamp = Utc::now();
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"commit");
        hasher.update(&(position as u64).to_be_bytes());
        hasher.update(configuration.to_string().as_bytes());
        hasher.update(timestamp.to_rfc3339().as_bytes());
        if let Some(message) = &message {
            hasher.update(message.as_bytes());
        }
        Self {
            id: hash_to_hex(hasher.finalize().as_bytes()),
            configuration,
            timestamp,
            message,
            associations,
        }
    }

    /// First twelve hex digits of the id.
    pub fn short_id(&self) -> &str {
        &self.id[..12.min(self.id.len())]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    features: BTreeMap<FeatureId, Feature>,
    modules: ModuleTable,
    associations: BTreeMap<AssociationId, Association>,
    sequence_graphs: SequenceGraphs,
    commits: Vec<Commit>,
    max_order: usize,
    next_association: u64,
}

impl Default for Repository {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ORDER)
    }
}

impl Repository {
    pub fn new(max_order: usize) -> Self {
        Self {
            features: BTreeMap::new(),
            modules: ModuleTable::new(),
            associations: BTreeMap::new(),
            sequence_graphs: SequenceGraphs::new(),
            commits: Vec::new(),
            max_order,
            next_association: 1,
        }
    }

    pub fn max_order(&self) -> usize {
        self.max_order
    }

    pub fn features(&self) -> &BTreeMap<FeatureId, Feature> {
        &self.features
    }

    pub fn feature(&self, id: &str) -> Option<&Feature> {
        self.features.get(id)
    }

    pub fn modules(&self) -> &ModuleTable {
        &self.modules
    }

    pub fn associations(&self) -> &BTreeMap<AssociationId, Association> {
        &self.associations
    }

    pub fn association(&self, id: AssociationId) -> Result<&Association, ApiError> {
        self.associations
            .get(&id)
            .ok_or(ApiError::UnknownAssociation(id))
    }

    /// Mutable access for callers marking artifacts ahead of a split.
    pub fn association_mut(&mut self, id: AssociationId) -> Result<&mut Association, ApiError> {
        self.associations
            .get_mut(&id)
            .ok_or(ApiError::UnknownAssociation(id))
    }

    pub fn sequence_graphs(&self) -> &SequenceGraphs {
        &self.sequence_graphs
    }

    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    /// Next id handed out by [`Repository::add_association`].
    pub fn next_association_id(&self) -> AssociationId {
        AssociationId(self.next_association)
    }

    /// Reassembles a repository from persisted records.
    pub(crate) fn from_records(
        features: BTreeMap<FeatureId, Feature>,
        modules: ModuleTable,
        associations: BTreeMap<AssociationId, Association>,
        sequence_graphs: SequenceGraphs,
        commits: Vec<Commit>,
        max_order: usize,
        next_association: u64,
    ) -> Result<Self, ApiError> {
        if let Some((id, _)) = associations.iter().find(|(id, a)| a.id() != **id || id.0 >= next_association) {
            return Err(ApiError::InvariantViolation(format!(
                "association {} does not fit the id allocator at {}",
                id, next_association
            )));
        }
        if let Some(module) = modules.keys().find(|m| m.order() > max_order) {
            return Err(ApiError::InvariantViolation(format!(
                "module {} exceeds max order {}",
                module, max_order
            )));
        }
        Ok(Self {
            features,
            modules,
            associations,
            sequence_graphs,
            commits,
            max_order,
            next_association,
        })
    }

    /// Adds a feature revision, creating the feature when needed.
    ///
    /// Returns `true` when the feature itself is new. New features are not
    /// retrofitted here; see [`Repository::add_feature`].
    fn insert_revision(&mut self, revision: &RevisionRef) -> bool {
        let is_new = !self.features.contains_key(&revision.feature);
        self.features
            .entry(revision.feature.clone())
            .or_insert_with(|| Feature::new(revision.feature.clone()))
            .add_revision(revision.revision.clone());
        is_new
    }

    /// Adds a feature revision and retrofits modules and conditions when the
    /// feature is new.
    pub fn add_feature(&mut self, revision: &RevisionRef) -> Result<bool, ApiError> {
        let is_new = self.insert_revision(revision);
        if is_new {
            self.retrofit(&revision.feature)?;
        }
        Ok(is_new)
    }

    /// Merges every revision a configuration mentions, retrofitting for
    /// features that were unknown.
    pub(crate) fn add_configuration_features(
        &mut self,
        configuration: &Configuration,
    ) -> Result<Vec<FeatureId>, ApiError> {
        let mut new_features = Vec::new();
        for revision in configuration.revisions() {
            if self.insert_revision(revision) {
                new_features.push(revision.feature.clone());
            }
        }
        for feature in &new_features {
            self.retrofit(feature)?;
        }
        Ok(new_features)
    }

    /// Extends modules with a newly introduced feature negated and widens
    /// every association condition accordingly.
    pub(crate) fn retrofit(&mut self, feature: &FeatureId) -> Result<(), ApiError> {
        let pairs = retrofit_feature(&mut self.modules, feature, self.max_order)?;
        debug!(feature = %feature, extended = pairs.len(), "retrofitted modules");
        if pairs.is_empty() {
            return Ok(());
        }
        for association in self.associations.values_mut() {
            association.condition.update_with_new_modules(&pairs);
        }
        Ok(())
    }

    /// Stores a new association under a fresh id.
    pub fn add_association(
        &mut self,
        condition: PresenceCondition,
        tree: RootNode,
        count: u64,
    ) -> AssociationId {
        let id = AssociationId(self.next_association);
        self.next_association += 1;
        self.associations
            .insert(id, Association::new(id, condition, tree, count));
        id
    }

    /// Stores an association under an id it already carries.
    pub(crate) fn insert_association(&mut self, association: Association) {
        self.next_association = self.next_association.max(association.id().0 + 1);
        self.associations.insert(association.id(), association);
    }

    pub fn remove_association(&mut self, id: AssociationId) -> Result<Association, ApiError> {
        self.associations
            .remove(&id)
            .ok_or(ApiError::UnknownAssociation(id))
    }

    /// Runs `op` against a copy and swaps it in only on success.
    pub(crate) fn transact<T>(
        &mut self,
        op: impl FnOnce(&mut Repository) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let mut staged = self.clone();
        let result = op(&mut staged)?;
        *self = staged;
        Ok(result)
    }

    /// Total number of owned artifacts across associations.
    pub fn artifact_count(&self) -> usize {
        self.associations
            .values()
            .map(|a| a.tree.unique_count())
            .sum()
    }
}
