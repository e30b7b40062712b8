//! Dependency graph between associations.
//!
//! An association depends on another when one of its artifacts references an
//! artifact the other owns.

use crate::association::Association;
use crate::types::{AssociationId, Hash};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// How references leaving the selected set are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode {
    /// Follow references transitively and pull in the associations they reach.
    IncludeAllReferencedAssociations,
    /// Record references leaving the selection without following them.
    LeaveReferencesUnresolved,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<AssociationId, BTreeSet<AssociationId>>,
    included: BTreeSet<AssociationId>,
    unresolved: BTreeSet<AssociationId>,
}

impl DependencyGraph {
    /// Builds the graph for `selected`, resolving owners within `universe`.
    ///
    /// References to artifacts no association owns are ignored.
    pub fn build(
        universe: &BTreeMap<AssociationId, Association>,
        selected: &BTreeSet<AssociationId>,
        mode: ResolutionMode,
    ) -> Self {
        let mut owners: HashMap<Hash, AssociationId> = HashMap::new();
        for (id, association) in universe {
            for key in association.tree.unique_keys() {
                owners.insert(key, *id);
            }
        }

        let mut graph = DependencyGraph {
            included: selected.clone(),
            ..Default::default()
        };
        let mut queue: Vec<AssociationId> = selected.iter().copied().collect();

        while let Some(id) = queue.pop() {
            let Some(association) = universe.get(&id) else {
                continue;
            };
            for target in association.tree.references() {
                let Some(&owner) = owners.get(&target) else {
                    continue;
                };
                if owner == id {
                    continue;
                }
                graph.edges.entry(id).or_default().insert(owner);
                if selected.contains(&owner) {
                    continue;
                }
                graph.unresolved.insert(owner);
                if mode == ResolutionMode::IncludeAllReferencedAssociations
                    && graph.included.insert(owner)
                {
                    queue.push(owner);
                }
            }
        }

        graph
    }

    /// Associations `id` depends on.
    pub fn dependencies(&self, id: AssociationId) -> impl Iterator<Item = AssociationId> + '_ {
        self.edges.get(&id).into_iter().flatten().copied()
    }

    /// Selected associations plus everything pulled in by references.
    pub fn included(&self) -> &BTreeSet<AssociationId> {
        &self.included
    }

    /// Referenced associations outside the selection.
    pub fn unresolved(&self) -> &BTreeSet<AssociationId> {
        &self.unresolved
    }

    pub fn is_resolved(&self) -> bool {
        self.unresolved.is_empty()
    }
}
