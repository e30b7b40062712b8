//! Whole-repository operations: copy, subset, merge, split, consolidate.

use crate::association::Association;
use crate::condition::{ModuleRewrite, PresenceCondition};
use crate::dependency::{DependencyGraph, ResolutionMode};
use crate::error::ApiError;
use crate::feature::Feature;
use crate::module::{ModuleEntry, ModuleRevision, ModuleTable};
use crate::repository::Repository;
use crate::tree::sequence::{rebase, trim_graphs, used_sequences};
use crate::tree::{check_consistency, extract_marked, merge, update_artifact_references};
use crate::types::{AssociationId, FeatureId, RevisionRef};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, instrument};

impl Repository {
    /// Deep copy through the subset path.
    pub fn copy(&self) -> Result<Repository, ApiError> {
        self.subset(&BTreeSet::new(), self.max_order)
    }

    /// Builds a repository without the deselected revisions and with an
    /// optionally lower module order bound.
    ///
    /// Modules requiring a deselected revision can no longer hold; negations of
    /// features that vanish entirely are vacuously true and are omitted.
    /// Associations left without a satisfiable condition are dropped, the rest
    /// are deep-copied and consolidated. Fails when a kept association
    /// references content that was dropped.
    #[instrument(skip(self, deselected), fields(deselected = deselected.len()))]
    pub fn subset(
        &self,
        deselected: &BTreeSet<RevisionRef>,
        max_order: usize,
    ) -> Result<Repository, ApiError> {
        if max_order > self.max_order {
            return Err(ApiError::InvalidArgument(format!(
                "subset max order {} exceeds repository max order {}",
                max_order, self.max_order
            )));
        }

        let mut features: BTreeMap<FeatureId, Feature> = self.features.clone();
        for feature in features.values_mut() {
            feature.retain_revisions(|r| !deselected.contains(r));
        }
        features.retain(|_, f| !f.revisions().is_empty());

        let rewrite = |module: &ModuleRevision| -> ModuleRewrite {
            let requires_missing = module.pos().iter().any(|r| {
                deselected.contains(r)
                    || !features
                        .get(&r.feature)
                        .is_some_and(|f| f.has_revision(&r.revision))
            });
            if requires_missing {
                return ModuleRewrite::False;
            }
            let rewritten = module.without_negatives(|f| features.contains_key(f));
            if rewritten.order() > max_order {
                ModuleRewrite::Drop
            } else {
                ModuleRewrite::Keep(rewritten)
            }
        };

        let mut modules = ModuleTable::new();
        for entry in self.modules.values() {
            for (revision, count) in &entry.revisions {
                if let ModuleRewrite::Keep(rewritten) = rewrite(revision) {
                    let target: &mut ModuleEntry = modules.entry(rewritten.module()?).or_default();
                    target.count += count;
                    *target.revisions.entry(rewritten).or_insert(0) += count;
                }
            }
        }

        let mut associations = BTreeMap::new();
        for (id, association) in &self.associations {
            let condition = association.condition.rewrite(&rewrite);
            if condition.is_empty() {
                debug!(association = %id, "dropped by subset");
                continue;
            }
            associations.insert(
                *id,
                Association::new(*id, condition, association.tree.clone(), association.count),
            );
        }

        let kept: BTreeSet<AssociationId> = associations.keys().copied().collect();
        let graph = DependencyGraph::build(
            &self.associations,
            &kept,
            ResolutionMode::LeaveReferencesUnresolved,
        );
        if !graph.is_resolved() {
            let missing: Vec<String> = graph.unresolved().iter().map(|id| id.to_string()).collect();
            return Err(ApiError::UnresolvedDependencies(format!(
                "kept associations reference dropped associations {}",
                missing.join(", ")
            )));
        }

        let commits = self
            .commits
            .iter()
            .filter(|c| !c.configuration.positive().any(|r| deselected.contains(r)))
            .cloned()
            .collect();

        let mut subset = Repository {
            features,
            modules,
            associations,
            sequence_graphs: self.sequence_graphs.clone(),
            commits,
            max_order,
            next_association: self.next_association,
        };
        subset.consolidate_associations()?;
        let used = used_sequences(subset.associations.values().map(|a| &a.tree));
        trim_graphs(&mut subset.sequence_graphs, &used);

        info!(
            associations = subset.associations.len(),
            dropped = self.associations.len() - kept.len(),
            "subset complete"
        );
        Ok(subset)
    }

    /// Absorbs another repository.
    ///
    /// Features known to only one side are retrofitted into the other side's
    /// modules and conditions first, then every association of `other` is
    /// extracted into this repository.
    #[instrument(skip(self, other), fields(incoming = other.associations.len()))]
    pub fn merge(&mut self, other: Repository) -> Result<(), ApiError> {
        if other.max_order > self.max_order {
            return Err(ApiError::UnsupportedOperation(format!(
                "merging a repository of max order {} into max order {}",
                other.max_order, self.max_order
            )));
        }
        self.transact(|staged| staged.merge_staged(other))
    }

    fn merge_staged(&mut self, mut other: Repository) -> Result<(), ApiError> {
        let ours_only: Vec<FeatureId> = self
            .features
            .keys()
            .filter(|f| !other.features.contains_key(*f))
            .cloned()
            .collect();
        let theirs_only: Vec<FeatureId> = other
            .features
            .keys()
            .filter(|f| !self.features.contains_key(*f))
            .cloned()
            .collect();

        for feature in &ours_only {
            other.retrofit(feature)?;
        }
        for feature in &theirs_only {
            self.retrofit(feature)?;
        }

        for (id, feature) in std::mem::take(&mut other.features) {
            let ours = self
                .features
                .entry(id)
                .or_insert_with(|| feature.clone());
            for revision in feature.revisions() {
                ours.add_revision(revision.id.clone());
            }
        }

        for (module, entry) in std::mem::take(&mut other.modules) {
            let ours = self.modules.entry(module).or_default();
            ours.count += entry.count;
            for (revision, count) in entry.revisions {
                *ours.revisions.entry(revision).or_insert(0) += count;
            }
        }

        let their_graphs = std::mem::take(&mut other.sequence_graphs);
        let mut key_mapping = HashMap::new();
        let mut incoming: Vec<Association> = Vec::new();
        for (_, mut association) in std::mem::take(&mut other.associations) {
            key_mapping.extend(rebase(
                &mut association.tree,
                &their_graphs,
                &mut self.sequence_graphs,
            ));
            incoming.push(association);
        }

        let mut created = 0;
        for mut association in incoming {
            update_artifact_references(&mut association.tree, &key_mapping);
            check_consistency(&association.tree)?;
            created += self
                .extract_tree(association.condition, association.tree, association.count)?
                .len();
        }

        self.commits.extend(std::mem::take(&mut other.commits));
        self.commits.sort_by_key(|c| c.timestamp);

        info!(
            created,
            associations = self.associations.len(),
            "merge complete"
        );
        Ok(())
    }

    /// Moves marked artifacts into associations of their own.
    ///
    /// Each extracted part carries a copy of its source's condition. Sources
    /// left empty are removed. The result is not consolidated.
    pub fn split(&mut self) -> Result<Vec<AssociationId>, ApiError> {
        self.transact(|staged| {
            let mut parts: Vec<(PresenceCondition, crate::tree::RootNode, u64)> = Vec::new();
            let mut emptied = Vec::new();
            for (id, association) in staged.associations.iter_mut() {
                let extracted = extract_marked(&mut association.tree);
                if extracted.is_empty() {
                    continue;
                }
                check_consistency(&extracted)?;
                if association.tree.is_empty() {
                    emptied.push(*id);
                } else {
                    check_consistency(&association.tree)?;
                }
                parts.push((association.condition.clone(), extracted, association.count));
            }
            for id in emptied {
                staged.remove_association(id)?;
            }
            let created: Vec<AssociationId> = parts
                .into_iter()
                .map(|(condition, tree, count)| staged.add_association(condition, tree, count))
                .collect();
            debug!(created = created.len(), "split complete");
            Ok(created)
        })
    }

    /// Merges associations with equal conditions into the lowest id.
    ///
    /// Returns the number of associations absorbed.
    pub fn consolidate_associations(&mut self) -> Result<usize, ApiError> {
        let absorbed = self.transact(|staged| staged.consolidate_staged())?;
        if !absorbed.is_empty() {
            debug!(absorbed = absorbed.len(), "consolidated associations");
        }
        Ok(absorbed.len())
    }

    /// Consolidates in place. Maps every absorbed id to the id that kept its content.
    pub(crate) fn consolidate_staged(
        &mut self,
    ) -> Result<BTreeMap<AssociationId, AssociationId>, ApiError> {
        let mut groups: BTreeMap<PresenceCondition, Vec<AssociationId>> = BTreeMap::new();
        for (id, association) in &self.associations {
            groups
                .entry(association.condition.clone())
                .or_default()
                .push(*id);
        }

        let mut absorbed = BTreeMap::new();
        for ids in groups.into_values().filter(|ids| ids.len() > 1) {
            let (keep, rest) = ids.split_first().ok_or_else(|| {
                ApiError::InvariantViolation("empty consolidation group".to_string())
            })?;
            for id in rest {
                let other = self.remove_association(*id)?;
                let target = self.association_mut(*keep)?;
                merge(&mut target.tree, other.tree);
                target.count += other.count;
                absorbed.insert(*id, *keep);
            }
            check_consistency(&self.association(*keep)?.tree)?;
        }
        Ok(absorbed)
    }
}
