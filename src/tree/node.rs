//! Artifact tree nodes.
//!
//! Every association owns one [`RootNode`]. A node is `unique` when its
//! artifact belongs to the owning association; non-unique nodes are
//! placeholders that only exist to hold unique descendants.

use crate::artifact::Artifact;
use crate::tree::hasher::{path_key, root_key};
use crate::types::{AssociationId, Hash};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub artifact: Artifact,
    pub unique: bool,
    pub children: Vec<Node>,
    /// Association owning the artifact, set by composition and mapping.
    #[serde(default)]
    pub origin: Option<AssociationId>,
}

impl Node {
    pub fn new(artifact: Artifact) -> Self {
        Self {
            artifact,
            unique: true,
            children: Vec::new(),
            origin: None,
        }
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn is_ordered(&self) -> bool {
        self.artifact.ordered
    }

    pub fn unique_count(&self) -> usize {
        usize::from(self.unique) + self.children.iter().map(Node::unique_count).sum::<usize>()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootNode {
    pub children: Vec<Node>,
}

impl RootNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of artifacts owned by this tree.
    pub fn unique_count(&self) -> usize {
        self.children.iter().map(Node::unique_count).sum()
    }

    /// Visits every node in preorder together with its path key.
    pub fn visit(&self, mut f: impl FnMut(&Hash, &Node)) {
        fn walk(nodes: &[Node], parent: &Hash, f: &mut impl FnMut(&Hash, &Node)) {
            for node in nodes {
                let key = path_key(parent, &node.artifact);
                f(&key, node);
                walk(&node.children, &key, f);
            }
        }
        walk(&self.children, &root_key(), &mut f);
    }

    /// Mutable preorder visit. Keys are computed before `f` runs on a node.
    pub fn visit_mut(&mut self, mut f: impl FnMut(&Hash, &mut Node)) {
        fn walk(nodes: &mut [Node], parent: &Hash, f: &mut impl FnMut(&Hash, &mut Node)) {
            for node in nodes.iter_mut() {
                let key = path_key(parent, &node.artifact);
                f(&key, node);
                walk(&mut node.children, &key, f);
            }
        }
        let root = root_key();
        walk(&mut self.children, &root, &mut f);
    }

    /// Path keys of every node in preorder.
    pub fn path_keys(&self) -> Vec<Hash> {
        let mut keys = Vec::new();
        self.visit(|key, _| keys.push(*key));
        keys
    }

    /// Path keys of the artifacts owned by this tree.
    pub fn unique_keys(&self) -> BTreeSet<Hash> {
        let mut keys = BTreeSet::new();
        self.visit(|key, node| {
            if node.unique {
                keys.insert(*key);
            }
        });
        keys
    }

    /// Reference targets of owned artifacts.
    pub fn references(&self) -> BTreeSet<Hash> {
        let mut targets = BTreeSet::new();
        self.visit(|_, node| {
            if node.unique {
                targets.extend(node.artifact.references.iter().map(|r| r.target));
            }
        });
        targets
    }

    /// Tags owned artifacts with their association.
    pub fn set_origin(&mut self, id: AssociationId) {
        self.visit_mut(|_, node| {
            if node.unique {
                node.origin = Some(id);
            }
        });
    }

    pub fn clear_origin(&mut self) {
        self.visit_mut(|_, node| node.origin = None);
    }

    pub fn clear_marks(&mut self) {
        self.visit_mut(|_, node| node.artifact.marked = false);
    }

    /// Compares artifact payloads and shape.
    ///
    /// Children of ordered nodes compare as sequences, other children as sets.
    /// Sequence numbers, ownership and properties are ignored.
    pub fn structurally_eq(&self, other: &RootNode) -> bool {
        children_eq(&self.children, &other.children, false)
    }
}

fn children_eq(left: &[Node], right: &[Node], ordered: bool) -> bool {
    if left.len() != right.len() {
        return false;
    }
    if ordered {
        return left.iter().zip(right).all(|(l, r)| node_eq(l, r));
    }
    let mut left: Vec<&Node> = left.iter().collect();
    let mut right: Vec<&Node> = right.iter().collect();
    left.sort_by(|a, b| a.artifact.data.cmp(&b.artifact.data));
    right.sort_by(|a, b| a.artifact.data.cmp(&b.artifact.data));
    left.iter().zip(&right).all(|(l, r)| node_eq(l, r))
}

fn node_eq(left: &Node, right: &Node) -> bool {
    left.artifact.data == right.artifact.data
        && children_eq(&left.children, &right.children, left.artifact.ordered)
}
