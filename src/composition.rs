//! Composition: the checkout path.
//!
//! Associations whose conditions hold for a configuration are overlaid into
//! one tree. The lazy form resolves children on demand without copying the
//! stored trees; the eager form builds the merged tree up front. Both order
//! the children of ordered artifacts through the repository's sequence
//! graphs and report the places where that order was ambiguous.

use crate::artifact::{Artifact, ArtifactData};
use crate::dependency::{DependencyGraph, ResolutionMode};
use crate::error::ApiError;
use crate::feature::Configuration;
use crate::module::{compute_modules, Module};
use crate::repository::Repository;
use crate::tree::hasher::{path_key, root_key};
use crate::tree::{merge, Node, RootNode, SequenceGraphs};
use crate::types::{AssociationId, Hash};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::{debug, info, instrument};

const ROOT_LABEL: &str = "/";

/// Two or more sibling artifacts had no recorded order between them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderWarning {
    pub parent: String,
    pub candidates: Vec<String>,
}

impl fmt::Display for OrderWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ambiguous order under {}: {}",
            self.parent,
            self.candidates.join(", ")
        )
    }
}

struct OrderItem {
    sequence: Option<u32>,
    origin: Option<AssociationId>,
    label: String,
}

/// Orders siblings of ordered artifacts and collects warnings.
///
/// Ties are broken by owning association id, then by sequence number, so the
/// result does not depend on the order associations were visited in.
pub struct OrderSelector<'a> {
    graphs: &'a SequenceGraphs,
    warnings: RefCell<BTreeSet<OrderWarning>>,
}

impl<'a> OrderSelector<'a> {
    pub fn new(graphs: &'a SequenceGraphs) -> Self {
        Self {
            graphs,
            warnings: RefCell::new(BTreeSet::new()),
        }
    }

    pub fn warnings(&self) -> Vec<OrderWarning> {
        self.warnings.borrow().iter().cloned().collect()
    }

    /// Indices of `items` in composed order. Items the graph does not know
    /// keep their relative input order at the end.
    fn arrange(&self, parent_key: &Hash, parent_label: &str, items: &[OrderItem]) -> Vec<usize> {
        let graph = self.graphs.get(parent_key);
        let mut positioned: Vec<(u32, usize)> = Vec::new();
        let mut loose: Vec<usize> = Vec::new();
        for (index, item) in items.iter().enumerate() {
            match (item.sequence, graph) {
                (Some(seq), Some(g)) if g.contains(seq) => positioned.push((seq, index)),
                _ => loose.push(index),
            }
        }
        let Some(graph) = graph else {
            return loose;
        };

        let by_sequence: HashMap<u32, usize> = positioned.iter().copied().collect();
        let mut successors: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut indegree: HashMap<usize, usize> = positioned.iter().map(|&(_, i)| (i, 0)).collect();
        for &(seq, index) in &positioned {
            for reached in graph.reachable_from(seq) {
                if let Some(&target) = by_sequence.get(&reached) {
                    successors.entry(index).or_default().push(target);
                    *indegree.entry(target).or_insert(0) += 1;
                }
            }
        }

        let rank = |index: usize| {
            let item = &items[index];
            (
                item.origin.map_or(u64::MAX, |id| id.0),
                item.sequence.unwrap_or(u32::MAX),
                index,
            )
        };
        let mut ready: BTreeSet<(u64, u32, usize)> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| rank(*i))
            .collect();

        let mut order = Vec::with_capacity(items.len());
        while let Some(first) = ready.pop_first() {
            if !ready.is_empty() {
                let mut candidates: Vec<String> = std::iter::once(&first)
                    .chain(ready.iter())
                    .map(|&(_, _, i)| items[i].label.clone())
                    .collect();
                candidates.sort();
                debug!(parent = parent_label, candidates = ?candidates, "ambiguous order");
                self.warnings.borrow_mut().insert(OrderWarning {
                    parent: parent_label.to_string(),
                    candidates,
                });
            }
            let index = first.2;
            order.push(index);
            for &next in successors.get(&index).into_iter().flatten() {
                if let Some(d) = indegree.get_mut(&next) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(rank(next));
                    }
                }
            }
        }
        order.extend(loose);
        order
    }
}

fn permute<T>(items: Vec<T>, order: &[usize]) -> Vec<T> {
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    order.iter().filter_map(|&i| slots[i].take()).collect()
}

/// A composed node resolved from the stored trees on demand.
pub struct LazyNode<'a> {
    key: Hash,
    parts: Vec<(AssociationId, &'a Node)>,
    selector: &'a OrderSelector<'a>,
}

impl<'a> LazyNode<'a> {
    fn owner(&self) -> Option<(AssociationId, &'a Node)> {
        self.parts.iter().find(|(_, node)| node.unique).copied()
    }

    pub fn key(&self) -> &Hash {
        &self.key
    }

    /// The owning association's artifact, or the first placeholder's.
    pub fn artifact(&self) -> &'a Artifact {
        match self.owner() {
            Some((_, node)) => &node.artifact,
            None => &self.parts[0].1.artifact,
        }
    }

    pub fn origin(&self) -> Option<AssociationId> {
        self.owner().map(|(id, _)| id)
    }

    pub fn is_unique(&self) -> bool {
        self.owner().is_some()
    }

    /// Associations contributing this node, owner or placeholder.
    pub fn contributors(&self) -> impl Iterator<Item = AssociationId> + '_ {
        self.parts.iter().map(|(id, _)| *id)
    }

    pub fn children(&self) -> Vec<LazyNode<'a>> {
        let artifact = self.artifact();
        compose_children(
            self.parts.iter().map(|&(id, node)| (id, node.children.as_slice())),
            &self.key,
            artifact.ordered,
            &artifact.label(),
            self.selector,
        )
    }

    pub fn materialize(&self) -> Node {
        Node {
            artifact: self.artifact().clone(),
            unique: self.is_unique(),
            children: self.children().iter().map(LazyNode::materialize).collect(),
            origin: self.origin(),
        }
    }
}

fn compose_children<'a>(
    sources: impl IntoIterator<Item = (AssociationId, &'a [Node])>,
    parent_key: &Hash,
    ordered: bool,
    parent_label: &str,
    selector: &'a OrderSelector<'a>,
) -> Vec<LazyNode<'a>> {
    let mut groups: Vec<LazyNode<'a>> = Vec::new();
    let mut index: HashMap<(&'a ArtifactData, Option<u32>), usize> = HashMap::new();
    for (id, nodes) in sources {
        for node in nodes {
            match index.get(&node.artifact.identity()) {
                Some(&i) => groups[i].parts.push((id, node)),
                None => {
                    index.insert(node.artifact.identity(), groups.len());
                    groups.push(LazyNode {
                        key: path_key(parent_key, &node.artifact),
                        parts: vec![(id, node)],
                        selector,
                    });
                }
            }
        }
    }

    if !ordered {
        return groups;
    }
    let items: Vec<OrderItem> = groups
        .iter()
        .map(|group| OrderItem {
            sequence: group.artifact().sequence,
            origin: group.origin(),
            label: group.artifact().label(),
        })
        .collect();
    let order = selector.arrange(parent_key, parent_label, &items);
    permute(groups, &order)
}

/// Overlay of selected association trees that is never copied.
pub struct LazyCompositionRoot<'a> {
    sources: Vec<(AssociationId, &'a RootNode)>,
    selector: OrderSelector<'a>,
}

impl<'a> LazyCompositionRoot<'a> {
    pub fn new(sources: Vec<(AssociationId, &'a RootNode)>, graphs: &'a SequenceGraphs) -> Self {
        Self {
            sources,
            selector: OrderSelector::new(graphs),
        }
    }

    pub fn associations(&self) -> impl Iterator<Item = AssociationId> + '_ {
        self.sources.iter().map(|(id, _)| *id)
    }

    pub fn children(&self) -> Vec<LazyNode<'_>> {
        compose_children(
            self.sources
                .iter()
                .map(|&(id, root)| (id, root.children.as_slice())),
            &root_key(),
            false,
            ROOT_LABEL,
            &self.selector,
        )
    }

    /// Resolves the whole tree. Ownership is recorded in each node's origin.
    pub fn materialize(&self) -> RootNode {
        RootNode {
            children: self.children().iter().map(LazyNode::materialize).collect(),
        }
    }

    /// Warnings raised by the children resolved so far.
    pub fn warnings(&self) -> Vec<OrderWarning> {
        self.selector.warnings()
    }
}

/// Builds the composed tree up front by merging copies of the sources.
pub fn compose_eager(
    sources: &[(AssociationId, &RootNode)],
    graphs: &SequenceGraphs,
) -> (RootNode, Vec<OrderWarning>) {
    let selector = OrderSelector::new(graphs);
    let mut root = RootNode::new();
    for (id, tree) in sources {
        let mut copy = (*tree).clone();
        copy.set_origin(*id);
        merge(&mut root, copy);
    }
    arrange_children(&mut root.children, &root_key(), false, ROOT_LABEL, &selector);
    (root, selector.warnings())
}

fn arrange_children(
    nodes: &mut Vec<Node>,
    parent_key: &Hash,
    ordered: bool,
    parent_label: &str,
    selector: &OrderSelector<'_>,
) {
    if ordered {
        let items: Vec<OrderItem> = nodes
            .iter()
            .map(|node| OrderItem {
                sequence: node.artifact.sequence,
                origin: node.origin,
                label: node.artifact.label(),
            })
            .collect();
        let order = selector.arrange(parent_key, parent_label, &items);
        *nodes = permute(std::mem::take(nodes), &order);
    }
    for node in nodes.iter_mut() {
        let key = path_key(parent_key, &node.artifact);
        let label = node.artifact.label();
        let ordered = node.artifact.ordered;
        arrange_children(&mut node.children, &key, ordered, &label, selector);
    }
}

pub enum ComposedTree<'a> {
    Lazy(LazyCompositionRoot<'a>),
    Eager {
        root: RootNode,
        warnings: Vec<OrderWarning>,
    },
}

/// Result of composing a configuration.
pub struct Checkout<'a> {
    pub configuration: Configuration,
    pub tree: ComposedTree<'a>,
    /// Selected associations in id order.
    pub selected: Vec<AssociationId>,
    /// Desired modules some selected association does not require.
    pub missing: BTreeSet<Module>,
    /// Modules a selected association requires that were not desired.
    pub surplus: BTreeSet<Module>,
    /// Referenced associations that were not selected.
    pub unresolved: BTreeSet<AssociationId>,
}

/// A checkout detached from the repository it was composed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedCheckout {
    pub configuration: Configuration,
    pub tree: RootNode,
    pub selected: Vec<AssociationId>,
    pub missing: BTreeSet<Module>,
    pub surplus: BTreeSet<Module>,
    pub unresolved: BTreeSet<AssociationId>,
    pub warnings: Vec<OrderWarning>,
}

impl<'a> Checkout<'a> {
    pub fn is_lazy(&self) -> bool {
        matches!(self.tree, ComposedTree::Lazy(_))
    }

    pub fn materialize(&self) -> RootNode {
        match &self.tree {
            ComposedTree::Lazy(root) => root.materialize(),
            ComposedTree::Eager { root, .. } => root.clone(),
        }
    }

    /// For lazy checkouts only warnings of already resolved children are known.
    pub fn order_warnings(&self) -> Vec<OrderWarning> {
        match &self.tree {
            ComposedTree::Lazy(root) => root.warnings(),
            ComposedTree::Eager { warnings, .. } => warnings.clone(),
        }
    }

    /// Resolves the whole tree, then collects every warning it raised.
    pub fn into_materialized(self) -> MaterializedCheckout {
        let tree = self.materialize();
        let warnings = self.order_warnings();
        MaterializedCheckout {
            configuration: self.configuration,
            tree,
            selected: self.selected,
            missing: self.missing,
            surplus: self.surplus,
            unresolved: self.unresolved,
            warnings,
        }
    }
}

impl Repository {
    /// Composes every association whose condition holds for `configuration`.
    #[instrument(skip(self), fields(configuration = %configuration))]
    pub fn compose(&self, configuration: &Configuration, lazy: bool) -> Result<Checkout<'_>, ApiError> {
        let sources: Vec<(AssociationId, &RootNode)> = self
            .associations()
            .iter()
            .filter(|(_, association)| association.condition.holds(configuration))
            .map(|(id, association)| (*id, &association.tree))
            .collect();
        let selected: Vec<AssociationId> = sources.iter().map(|(id, _)| *id).collect();

        let desired = compute_modules(
            configuration,
            configuration.instances().iter().map(|i| &i.revision.feature),
            self.max_order(),
        )?;
        let mut missing = BTreeSet::new();
        let mut surplus = BTreeSet::new();
        for id in &selected {
            let required = self.association(*id)?.condition.min_modules()?;
            missing.extend(desired.difference(&required).cloned());
            surplus.extend(required.difference(&desired).cloned());
        }

        let selected_set: BTreeSet<AssociationId> = selected.iter().copied().collect();
        let graph = DependencyGraph::build(
            self.associations(),
            &selected_set,
            ResolutionMode::IncludeAllReferencedAssociations,
        );
        let unresolved = graph.unresolved().clone();

        let tree = if lazy {
            ComposedTree::Lazy(LazyCompositionRoot::new(sources, self.sequence_graphs()))
        } else {
            let (root, warnings) = compose_eager(&sources, self.sequence_graphs());
            ComposedTree::Eager { root, warnings }
        };

        info!(
            selected = selected.len(),
            missing = missing.len(),
            surplus = surplus.len(),
            unresolved = unresolved.len(),
            lazy,
            "composition complete"
        );
        Ok(Checkout {
            configuration: configuration.clone(),
            tree,
            selected,
            missing,
            surplus,
            unresolved,
        })
    }
}
