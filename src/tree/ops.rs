//! Structural tree operations: slice, merge, extract-marked, consistency
//! checking and mapping.

use crate::artifact::ArtifactData;
use crate::error::ApiError;
use crate::tree::hasher::{path_key, root_key};
use crate::tree::node::{Node, RootNode};
use crate::types::{AssociationId, Hash};
use std::collections::{BTreeSet, HashMap};

type Identity = (ArtifactData, Option<u32>);

fn identity_index(nodes: &[Node]) -> HashMap<Identity, usize> {
    nodes
        .iter()
        .enumerate()
        .map(|(i, n)| ((n.artifact.data.clone(), n.artifact.sequence), i))
        .collect()
}

fn prune(nodes: &mut Vec<Node>) {
    nodes.retain(|n| n.unique || !n.children.is_empty());
}

/// Removes the content two trees share and returns it as a new tree.
///
/// An artifact owned by both sides moves to the result and becomes a
/// placeholder on both sides. Placeholders left without children are pruned.
/// The result keeps the child order of `left`.
pub fn slice(left: &mut RootNode, right: &mut RootNode) -> RootNode {
    RootNode {
        children: slice_children(&mut left.children, &mut right.children),
    }
}

fn slice_children(left: &mut Vec<Node>, right: &mut Vec<Node>) -> Vec<Node> {
    let index = identity_index(right);
    let mut shared = Vec::new();

    for l in left.iter_mut() {
        let key = (l.artifact.data.clone(), l.artifact.sequence);
        let Some(&position) = index.get(&key) else {
            continue;
        };
        let r = &mut right[position];

        let owned_by_both = l.unique && r.unique;
        let children = slice_children(&mut l.children, &mut r.children);
        if owned_by_both || !children.is_empty() {
            let mut artifact = l.artifact.clone();
            if owned_by_both {
                artifact.absorb(&r.artifact);
            }
            shared.push(Node {
                artifact,
                unique: owned_by_both,
                children,
                origin: None,
            });
        }
        if owned_by_both {
            l.unique = false;
            r.unique = false;
        }
    }

    prune(left);
    prune(right);
    shared
}

/// Merges `source` into `target`. Unmatched children are appended.
pub fn merge(target: &mut RootNode, source: RootNode) {
    merge_children(&mut target.children, source.children);
}

fn merge_children(target: &mut Vec<Node>, source: Vec<Node>) {
    for s in source {
        let found = target
            .iter()
            .position(|t| t.artifact.same_identity(&s.artifact));
        let Some(position) = found else {
            target.push(s);
            continue;
        };
        let Node {
            artifact,
            unique,
            children,
            origin,
        } = s;
        let t = &mut target[position];
        if unique {
            if t.unique {
                t.artifact.absorb(&artifact);
            } else {
                t.artifact = artifact;
                t.origin = origin;
                t.unique = true;
            }
        }
        merge_children(&mut t.children, children);
    }
}

/// Pulls out the marked sub-forest.
///
/// Marked owned artifacts move to the result; the source keeps placeholders
/// where needed. Marks are cleared on both sides.
pub fn extract_marked(root: &mut RootNode) -> RootNode {
    RootNode {
        children: extract_children(&mut root.children),
    }
}

fn extract_children(nodes: &mut Vec<Node>) -> Vec<Node> {
    let mut extracted = Vec::new();
    for node in nodes.iter_mut() {
        let children = extract_children(&mut node.children);
        let take = node.unique && node.artifact.marked;
        if take || !children.is_empty() {
            let mut artifact = node.artifact.clone();
            artifact.marked = false;
            extracted.push(Node {
                artifact,
                unique: take,
                children,
                origin: None,
            });
        }
        node.artifact.marked = false;
        if take {
            node.unique = false;
        }
    }
    prune(nodes);
    extracted
}

/// Verifies structural invariants of a repository tree.
///
/// - placeholders must have children
/// - siblings must have distinct identities
/// - children of ordered nodes must carry distinct sequence numbers
pub fn check_consistency(root: &RootNode) -> Result<(), ApiError> {
    check_children(&root.children, false, "/")
}

fn check_children(nodes: &[Node], ordered: bool, path: &str) -> Result<(), ApiError> {
    let mut identities = BTreeSet::new();
    let mut sequences = BTreeSet::new();

    for node in nodes {
        let label = format!("{}{}", path, node.artifact.label());
        if !node.unique && node.children.is_empty() {
            return Err(ApiError::InconsistentTree(format!(
                "placeholder without children at {}",
                label
            )));
        }
        if !identities.insert(node.artifact.identity()) {
            return Err(ApiError::InconsistentTree(format!(
                "duplicate sibling artifact at {}",
                label
            )));
        }
        if ordered {
            match node.artifact.sequence {
                Some(seq) if !sequences.insert(seq) => {
                    return Err(ApiError::InconsistentTree(format!(
                        "duplicate sequence number {} at {}",
                        seq, label
                    )));
                }
                Some(_) => {}
                None => {
                    return Err(ApiError::InconsistentTree(format!(
                        "unsequenced child of ordered node at {}",
                        label
                    )));
                }
            }
        }
        check_children(&node.children, node.artifact.ordered, &format!("{}/", label))?;
    }
    Ok(())
}

/// Tags nodes of `tree` that are owned by `source` with `owner`.
///
/// Returns the number of mapped nodes.
pub fn map(tree: &mut RootNode, owner: AssociationId, source: &RootNode) -> usize {
    let owned = source.unique_keys();
    let mut mapped = 0;
    tree.visit_mut(|key, node| {
        if owned.contains(key) {
            node.origin = Some(owner);
            mapped += 1;
        }
    });
    mapped
}

/// Rewrites reference targets through the given key mapping.
pub fn update_artifact_references(root: &mut RootNode, mapping: &HashMap<Hash, Hash>) {
    root.visit_mut(|_, node| {
        for reference in node.artifact.references.iter_mut() {
            if let Some(target) = mapping.get(&reference.target) {
                reference.target = *target;
            }
        }
    });
}

/// Whether two trees own any artifact in common.
pub fn intersects(left: &RootNode, right: &RootNode) -> bool {
    let left_keys = left.unique_keys();
    let mut found = false;
    right.visit(|key, node| {
        if node.unique && left_keys.contains(key) {
            found = true;
        }
    });
    found
}

/// Path key of the node reached by following `labels` from the root.
pub fn key_of(root: &RootNode, labels: &[&str]) -> Option<Hash> {
    let mut nodes = &root.children;
    let mut key = root_key();
    for label in labels {
        let node = nodes.iter().find(|n| n.artifact.data.to_string() == *label)?;
        key = path_key(&key, &node.artifact);
        nodes = &node.children;
    }
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Artifact;

    fn item(value: &str) -> Node {
        Node::new(Artifact::new(ArtifactData::Generic {
            kind: "item".to_string(),
            value: value.to_string(),
        }))
    }

    fn tree(values: &[&str]) -> RootNode {
        RootNode {
            children: vec![item("dir").with_children(values.iter().map(|v| item(v)))],
        }
    }

    #[test]
    fn test_slice_moves_shared_content() {
        let mut left = tree(&["x", "y"]);
        let mut right = tree(&["x", "z"]);
        let shared = slice(&mut left, &mut right);

        assert!(shared.structurally_eq(&tree(&["x"])));
        assert_eq!(shared.unique_count(), 2);
        // dir and x moved out; left keeps a placeholder dir holding y
        assert_eq!(left.unique_count(), 1);
        assert!(!left.children[0].unique);
        assert_eq!(right.unique_count(), 1);
        check_consistency(&left).unwrap();
        check_consistency(&right).unwrap();
        check_consistency(&shared).unwrap();
    }

    #[test]
    fn test_slice_disjoint_is_empty() {
        let mut left = RootNode::new().with_child(item("a"));
        let mut right = RootNode::new().with_child(item("b"));
        assert!(slice(&mut left, &mut right).is_empty());
        assert_eq!(left.unique_count(), 1);
        assert_eq!(right.unique_count(), 1);
    }

    #[test]
    fn test_slice_identical_empties_both() {
        let mut left = tree(&["x"]);
        let mut right = tree(&["x"]);
        let shared = slice(&mut left, &mut right);
        assert!(left.is_empty());
        assert!(right.is_empty());
        assert_eq!(shared.unique_count(), 2);
    }

    #[test]
    fn test_merge_restores_sliced_tree() {
        let mut left = tree(&["x", "y"]);
        let mut right = tree(&["x", "z"]);
        let shared = slice(&mut left, &mut right);
        let mut merged = shared;
        merge(&mut merged, left);
        assert!(merged.structurally_eq(&tree(&["x", "y"])));
        assert_eq!(merged.unique_count(), 3);
    }

    #[test]
    fn test_extract_marked() {
        let mut root = tree(&["x", "y"]);
        root.children[0].children[1].artifact.marked = true;
        let extracted = extract_marked(&mut root);
        assert_eq!(extracted.unique_count(), 1);
        assert!(!extracted.children[0].unique);
        assert_eq!(root.unique_count(), 2);
        check_consistency(&root).unwrap();
        check_consistency(&extracted).unwrap();
    }

    #[test]
    fn test_consistency_rejects_duplicates_and_empty_placeholders() {
        let duplicate = RootNode::new().with_child(item("a")).with_child(item("a"));
        assert!(check_consistency(&duplicate).is_err());

        let mut placeholder = item("a");
        placeholder.unique = false;
        assert!(check_consistency(&RootNode::new().with_child(placeholder)).is_err());

        let mut ordered = item("p");
        ordered.artifact.ordered = true;
        let unsequenced = RootNode::new().with_child(ordered.with_child(item("a")));
        assert!(check_consistency(&unsequenced).is_err());
    }

    #[test]
    fn test_map_tags_owned_nodes() {
        let stored = tree(&["x"]);
        let mut fresh = tree(&["x", "y"]);
        assert_eq!(map(&mut fresh, AssociationId(4), &stored), 2);
        assert_eq!(fresh.children[0].children[1].origin, None);
        assert!(intersects(&stored, &fresh));
    }

    #[test]
    fn test_update_references() {
        let target = key_of(&tree(&["x"]), &["item:dir", "item:x"]).unwrap();
        let mut root = RootNode::new().with_child(Node::new(
            Artifact::new(ArtifactData::Generic {
                kind: "use".to_string(),
                value: "x".to_string(),
            })
            .with_reference(target),
        ));
        let replacement = [7u8; 32];
        let mapping: HashMap<Hash, Hash> = [(target, replacement)].into_iter().collect();
        update_artifact_references(&mut root, &mapping);
        assert_eq!(root.children[0].artifact.references[0].target, replacement);
    }
}
