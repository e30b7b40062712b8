//! Read-only queries for tooling.

use crate::condition::PresenceCondition;
use crate::error::ApiError;
use crate::module::Module;
use crate::repository::Repository;
use crate::tree::sequence::sequence_known;
use crate::tree::{map, RootNode};
use crate::types::AssociationId;
use serde::Serialize;

/// Observation statistics for one module.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleStat {
    pub module: String,
    pub order: usize,
    pub count: u64,
    pub revisions: usize,
}

/// Summary line for one association.
#[derive(Debug, Clone, Serialize)]
pub struct AssociationSummary {
    pub id: AssociationId,
    pub condition: String,
    pub artifacts: usize,
    pub count: u64,
}

impl Repository {
    /// Tags nodes of an externally read tree with the associations owning them.
    ///
    /// The tree is sequenced read-only against the repository first, so
    /// ordered children line up with stored ones. Returns the number of
    /// mapped nodes.
    pub fn map_tree(&self, tree: &mut RootNode) -> usize {
        sequence_known(tree, &self.sequence_graphs);
        self.associations
            .iter()
            .map(|(id, association)| map(tree, *id, &association.tree))
            .sum()
    }

    /// Associations owning any artifact of the given tree.
    pub fn associations_intersecting(&self, tree: &RootNode) -> Vec<AssociationId> {
        let mut query = tree.clone();
        sequence_known(&mut query, &self.sequence_graphs);
        self.associations
            .iter()
            .filter(|(_, association)| crate::tree::ops::intersects(&association.tree, &query))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn condition_of(&self, id: AssociationId) -> Result<&PresenceCondition, ApiError> {
        Ok(&self.association(id)?.condition)
    }

    pub fn association_summaries(&self) -> Vec<AssociationSummary> {
        self.associations
            .values()
            .map(|a| AssociationSummary {
                id: a.id(),
                condition: a.condition.simplified(),
                artifacts: a.tree.unique_count(),
                count: a.count,
            })
            .collect()
    }

    /// Modules sorted by order, then by descending observation count.
    pub fn module_stats(&self) -> Vec<ModuleStat> {
        let mut stats: Vec<(&Module, ModuleStat)> = self
            .modules
            .iter()
            .map(|(module, entry)| {
                (
                    module,
                    ModuleStat {
                        module: module.to_string(),
                        order: module.order(),
                        count: entry.count,
                        revisions: entry.revisions.len(),
                    },
                )
            })
            .collect();
        stats.sort_by(|(ma, a), (mb, b)| {
            a.order
                .cmp(&b.order)
                .then(b.count.cmp(&a.count))
                .then(ma.cmp(mb))
        });
        stats.into_iter().map(|(_, s)| s).collect()
    }
}
