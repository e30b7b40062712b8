//! Sequence graphs for ordered nodes.
//!
//! Every ordered node (identified by its path key) has one graph recording the
//! sibling orders observed across commits. Nodes are sequence numbers, each
//! bound to the payload it was first assigned to; an edge `a -> b` means `a`
//! was seen before `b`. The graph stays acyclic: new children are aligned
//! against a topological order of the graph, matched children reuse their
//! number and the rest get fresh ones.

use crate::artifact::ArtifactData;
use crate::tree::hasher::{path_key, root_key};
use crate::tree::node::{Node, RootNode};
use crate::types::Hash;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tracing::trace;

/// Sequence graphs keyed by the path key of their ordered node.
pub type SequenceGraphs = BTreeMap<Hash, SequenceGraph>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceGraph {
    last_sequence: u32,
    nodes: BTreeMap<u32, ArtifactData>,
    edges: BTreeSet<(u32, u32)>,
}

impl SequenceGraph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, seq: u32) -> bool {
        self.nodes.contains_key(&seq)
    }

    pub fn edges(&self) -> &BTreeSet<(u32, u32)> {
        &self.edges
    }

    fn allocate(&mut self, data: &ArtifactData) -> u32 {
        self.last_sequence += 1;
        self.nodes.insert(self.last_sequence, data.clone());
        self.last_sequence
    }

    fn successors(&self, seq: u32) -> impl Iterator<Item = u32> + '_ {
        self.edges
            .range((seq, 0)..=(seq, u32::MAX))
            .map(|&(_, to)| to)
    }

    /// Topological order, smallest sequence number first among ready nodes.
    pub fn linearize(&self) -> Vec<u32> {
        let mut indegree: BTreeMap<u32, usize> = self.nodes.keys().map(|&s| (s, 0)).collect();
        for &(_, to) in &self.edges {
            *indegree.entry(to).or_insert(0) += 1;
        }
        let mut ready: BTreeSet<u32> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(s, _)| *s)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(seq) = ready.pop_first() {
            order.push(seq);
            for next in self.successors(seq) {
                if let Some(d) = indegree.get_mut(&next) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(next);
                    }
                }
            }
        }
        order
    }

    /// Every sequence number reachable from `from` through one or more edges.
    pub fn reachable_from(&self, from: u32) -> BTreeSet<u32> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<u32> = self.successors(from).collect();
        while let Some(seq) = queue.pop_front() {
            if seen.insert(seq) {
                queue.extend(self.successors(seq));
            }
        }
        seen
    }

    pub fn reaches(&self, from: u32, to: u32) -> bool {
        self.reachable_from(from).contains(&to)
    }

    /// Matches children against the current linearization by payload.
    fn matches(&self, children: &[Node]) -> Vec<Option<u32>> {
        let order = self.linearize();
        let n = order.len();
        let m = children.len();

        // lcs[i][j]: longest common subsequence of order[i..] and children[j..]
        let mut lcs = vec![vec![0u32; m + 1]; n + 1];
        for i in (0..n).rev() {
            for j in (0..m).rev() {
                lcs[i][j] = if self.nodes.get(&order[i]) == Some(&children[j].artifact.data) {
                    lcs[i + 1][j + 1] + 1
                } else {
                    lcs[i + 1][j].max(lcs[i][j + 1])
                };
            }
        }

        let mut matched = vec![None; m];
        let (mut i, mut j) = (0, 0);
        while i < n && j < m {
            if self.nodes.get(&order[i]) == Some(&children[j].artifact.data)
                && lcs[i][j] == lcs[i + 1][j + 1] + 1
            {
                matched[j] = Some(order[i]);
                i += 1;
                j += 1;
            } else if lcs[i + 1][j] >= lcs[i][j + 1] {
                i += 1;
            } else {
                j += 1;
            }
        }
        matched
    }

    /// Assigns sequence numbers to `children` and records their order.
    pub fn align(&mut self, children: &mut [Node]) {
        let matched = self.matches(children);
        let mut previous: Option<u32> = None;
        for (child, found) in children.iter_mut().zip(matched) {
            let seq = match found {
                Some(seq) => seq,
                None => self.allocate(&child.artifact.data),
            };
            child.artifact.sequence = Some(seq);
            if let Some(prev) = previous {
                self.edges.insert((prev, seq));
            }
            previous = Some(seq);
        }
    }

    /// Assigns known sequence numbers without recording anything.
    ///
    /// Children with no counterpart in the graph are left unsequenced.
    pub fn assign_known(&self, children: &mut [Node]) {
        let matched = self.matches(children);
        for (child, found) in children.iter_mut().zip(matched) {
            child.artifact.sequence = found;
        }
    }

    /// Drops every node not in `keep`, bridging its predecessors to its successors.
    pub fn trim(&mut self, keep: &BTreeSet<u32>) {
        let removed: Vec<u32> = self
            .nodes
            .keys()
            .copied()
            .filter(|s| !keep.contains(s))
            .collect();
        for seq in removed {
            let preds: Vec<u32> = self
                .edges
                .iter()
                .filter(|&&(_, to)| to == seq)
                .map(|&(from, _)| from)
                .collect();
            let succs: Vec<u32> = self.successors(seq).collect();
            self.edges.retain(|&(from, to)| from != seq && to != seq);
            for &p in &preds {
                for &s in &succs {
                    self.edges.insert((p, s));
                }
            }
            self.nodes.remove(&seq);
        }
    }
}

/// Sequences every ordered node of `root` against the repository graphs.
///
/// Returns the mapping from pre-sequencing to post-sequencing path keys, to be
/// fed to [`crate::tree::ops::update_artifact_references`].
pub fn sequence(root: &mut RootNode, graphs: &mut SequenceGraphs) -> HashMap<Hash, Hash> {
    let before = root.path_keys();
    sequence_children(&mut root.children, &root_key(), false, graphs);
    let after = root.path_keys();
    trace!(nodes = before.len(), "sequenced tree");
    before
        .into_iter()
        .zip(after)
        .filter(|(old, new)| old != new)
        .collect()
}

fn sequence_children(
    nodes: &mut [Node],
    parent: &Hash,
    ordered: bool,
    graphs: &mut SequenceGraphs,
) {
    if ordered {
        graphs.entry(*parent).or_default().align(nodes);
    }
    for node in nodes.iter_mut() {
        let key = path_key(parent, &node.artifact);
        sequence_children(&mut node.children, &key, node.artifact.ordered, graphs);
    }
}

/// Sequences a tree read-only, for lookups against repository content.
pub fn sequence_known(root: &mut RootNode, graphs: &SequenceGraphs) {
    fn walk(nodes: &mut [Node], parent: &Hash, ordered: bool, graphs: &SequenceGraphs) {
        if ordered {
            match graphs.get(parent) {
                Some(graph) => graph.assign_known(nodes),
                None => nodes.iter_mut().for_each(|n| n.artifact.sequence = None),
            }
        }
        for node in nodes.iter_mut() {
            let key = path_key(parent, &node.artifact);
            walk(&mut node.children, &key, node.artifact.ordered, graphs);
        }
    }
    walk(&mut root.children, &root_key(), false, graphs);
}

/// Re-sequences a tree taken from another repository against `target` graphs.
///
/// Ordered children are put in the order of their `source` graph, stripped of
/// their numbers and aligned against `target`. Returns the mapping from source
/// path keys to target path keys.
pub fn rebase(
    root: &mut RootNode,
    source: &SequenceGraphs,
    target: &mut SequenceGraphs,
) -> HashMap<Hash, Hash> {
    let mut mapping = HashMap::new();
    let key = root_key();
    rebase_children(&mut root.children, &key, &key, false, source, target, &mut mapping);
    mapping
}

fn rebase_children(
    nodes: &mut Vec<Node>,
    source_parent: &Hash,
    target_parent: &Hash,
    ordered: bool,
    source: &SequenceGraphs,
    target: &mut SequenceGraphs,
    mapping: &mut HashMap<Hash, Hash>,
) {
    let mut keyed: Vec<(Hash, Node)> = nodes
        .drain(..)
        .map(|n| (path_key(source_parent, &n.artifact), n))
        .collect();

    if ordered {
        if let Some(graph) = source.get(source_parent) {
            let rank: HashMap<u32, usize> = graph
                .linearize()
                .into_iter()
                .enumerate()
                .map(|(i, s)| (s, i))
                .collect();
            keyed.sort_by_key(|(_, n)| {
                n.artifact
                    .sequence
                    .and_then(|s| rank.get(&s).copied())
                    .unwrap_or(usize::MAX)
            });
        }
    }

    let (source_keys, mut children): (Vec<Hash>, Vec<Node>) = keyed.into_iter().unzip();
    if ordered {
        children.iter_mut().for_each(|n| n.artifact.sequence = None);
        target.entry(*target_parent).or_default().align(&mut children);
    }

    for (node, source_key) in children.iter_mut().zip(&source_keys) {
        let target_key = path_key(target_parent, &node.artifact);
        mapping.insert(*source_key, target_key);
        rebase_children(
            &mut node.children,
            source_key,
            &target_key,
            node.artifact.ordered,
            source,
            target,
            mapping,
        );
    }
    *nodes = children;
}

/// Sequence numbers used under each ordered node of the given trees.
pub fn used_sequences<'a>(trees: impl IntoIterator<Item = &'a RootNode>) -> BTreeMap<Hash, BTreeSet<u32>> {
    let mut used: BTreeMap<Hash, BTreeSet<u32>> = BTreeMap::new();
    for tree in trees {
        tree.visit(|key, node| {
            if node.artifact.ordered {
                let entry = used.entry(*key).or_default();
                entry.extend(node.children.iter().filter_map(|c| c.artifact.sequence));
            }
        });
    }
    used
}

/// Trims graphs to the sequence numbers still in use; unused graphs are dropped.
pub fn trim_graphs(graphs: &mut SequenceGraphs, used: &BTreeMap<Hash, BTreeSet<u32>>) {
    graphs.retain(|key, graph| match used.get(key) {
        Some(keep) => {
            graph.trim(keep);
            !graph.is_empty()
        }
        None => false,
    });
}
