//! Extraction: the commit path.
//!
//! A new tree is sliced against every stored association. Shared content moves
//! into a new association whose condition is the union of both sides, the
//! remainders keep their own conditions, and the novel rest of the new tree
//! becomes an association of its own. Associations that end up with equal
//! conditions are consolidated, so afterwards associations again partition the
//! stored content, one per distinct condition.

use crate::association::Association;
use crate::condition::PresenceCondition;
use crate::error::ApiError;
use crate::feature::Configuration;
use crate::module::{compute_module_revisions, record_observations, ModuleRevision};
use crate::repository::{Commit, Repository};
use crate::tree::sequence::sequence;
use crate::tree::{check_consistency, slice, update_artifact_references, RootNode};
use crate::types::AssociationId;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info, instrument};

impl Repository {
    /// Commits an artifact tree observed under `configuration`.
    ///
    /// Unknown features and revisions are created. A configuration without any
    /// positive selection is rejected. On error the repository is unchanged.
    #[instrument(skip(self, tree, message), fields(configuration = %configuration))]
    pub fn extract(
        &mut self,
        configuration: &Configuration,
        tree: RootNode,
        message: Option<String>,
    ) -> Result<Commit, ApiError> {
        if !configuration.has_positive() {
            return Err(ApiError::InvalidConfiguration(format!(
                "'{}' selects no feature",
                configuration
            )));
        }

        let start = Instant::now();
        let commit = self.transact(|staged| staged.extract_staged(configuration, tree, message))?;

        info!(
            commit = %commit.short_id(),
            created = commit.associations.len(),
            associations = self.associations.len(),
            duration_ms = start.elapsed().as_millis(),
            "extraction complete"
        );
        Ok(commit)
    }

    fn extract_staged(
        &mut self,
        configuration: &Configuration,
        mut tree: RootNode,
        message: Option<String>,
    ) -> Result<Commit, ApiError> {
        let new_features = self.add_configuration_features(configuration)?;
        if !new_features.is_empty() {
            debug!(features = ?new_features, "added features");
        }

        let observed =
            compute_module_revisions(configuration, self.features.keys(), self.max_order);
        record_observations(&mut self.modules, &observed)?;

        let mapping = sequence(&mut tree, &mut self.sequence_graphs);
        update_artifact_references(&mut tree, &mapping);
        check_consistency(&tree)?;

        let created = self.extract_tree(PresenceCondition::from_observation(&observed), tree, 1)?;

        let commit = Commit::new(
            configuration.clone(),
            message,
            created,
            self.commits.len(),
        );
        self.commits.push(commit.clone());
        Ok(commit)
    }

    /// Slices an association that already carries its condition into the
    /// repository. Used when absorbing another repository.
    pub fn extract_association(&mut self, association: Association) -> Result<Vec<AssociationId>, ApiError> {
        check_consistency(&association.tree)?;
        self.transact(|staged| {
            staged.extract_tree(association.condition, association.tree, association.count)
        })
    }

    /// Core slicing loop. Returns the ids of created associations.
    pub(crate) fn extract_tree(
        &mut self,
        mut condition: PresenceCondition,
        mut tree: RootNode,
        count: u64,
    ) -> Result<Vec<AssociationId>, ApiError> {
        // Everything stored so far was observed without the new content.
        let seen_elsewhere: BTreeSet<ModuleRevision> = self
            .associations
            .values()
            .flat_map(|a| a.condition.max_set().iter().cloned())
            .collect();
        condition.add_absence(&seen_elsewhere);
        let observed = condition.max_set().clone();

        let mut removals: Vec<AssociationId> = Vec::new();
        let mut additions: Vec<(Option<AssociationId>, Association)> = Vec::new();

        let ids: Vec<AssociationId> = self.associations.keys().copied().collect();
        for id in ids {
            let Some(existing) = self.associations.get_mut(&id) else {
                continue;
            };

            let shared = slice(&mut existing.tree, &mut tree);
            existing.condition.add_absence(&observed);
            let emptied = existing.tree.is_empty();

            if !shared.is_empty() {
                check_consistency(&shared)?;
                debug!(
                    association = %id,
                    shared = shared.unique_count(),
                    emptied,
                    "sliced association"
                );
                let union = existing.condition.union(&condition);
                // Fully absorbed associations hand their id to the shared part.
                let reuse = emptied.then_some(id);
                additions.push((
                    reuse,
                    Association::new(id, union, shared, existing.count + count),
                ));
            }

            if emptied {
                removals.push(id);
            } else {
                check_consistency(&existing.tree)?;
            }
        }

        if !tree.is_empty() {
            check_consistency(&tree)?;
            additions.push((None, Association::new(AssociationId(0), condition, tree, count)));
        }

        for id in removals {
            self.remove_association(id)?;
        }
        let mut created = Vec::with_capacity(additions.len());
        for (reuse, association) in additions {
            let id = match reuse {
                Some(id) => {
                    self.insert_association(association);
                    id
                }
                None => self.add_association(association.condition, association.tree, association.count),
            };
            created.push(id);
        }

        // Distinct observations can induce equal conditions.
        let absorbed = self.consolidate_staged()?;
        if !absorbed.is_empty() {
            debug!(absorbed = absorbed.len(), "consolidated after extraction");
        }
        let mut resolved = Vec::with_capacity(created.len());
        for id in created {
            let id = absorbed.get(&id).copied().unwrap_or(id);
            if !resolved.contains(&id) {
                resolved.push(id);
            }
        }
        Ok(resolved)
    }
}
