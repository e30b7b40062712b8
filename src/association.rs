//! Associations: the repository's unit of content.

use crate::condition::PresenceCondition;
use crate::tree::RootNode;
use crate::types::AssociationId;
use serde::{Deserialize, Serialize};

/// A presence condition paired with the artifact tree it guards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    id: AssociationId,
    pub condition: PresenceCondition,
    pub tree: RootNode,
    /// Number of observations folded into this association.
    pub count: u64,
}

impl Association {
    pub fn new(id: AssociationId, condition: PresenceCondition, tree: RootNode, count: u64) -> Self {
        Self {
            id,
            condition,
            tree,
            count,
        }
    }

    pub fn id(&self) -> AssociationId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: AssociationId) {
        self.id = id;
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}
