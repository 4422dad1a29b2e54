//! Read-only aggregate queries.
//!
//! Every query runs one traversal over one snapshot and reduces it. Nothing
//! here mutates the tree or the interner. Only nodes reachable from the root
//! count; free subtrees are ignored.
//!
//! ```rust
//! use canopy_core::intern::{RawState, StateInterner};
//! use canopy_core::metrics::{self, EMPTY_DEPTH};
//! use canopy_core::tree::{Extrinsic, Tree};
//! use std::sync::Arc;
//!
//! let interner = Arc::new(StateInterner::new());
//! let tree = Tree::new(interner.clone());
//! assert_eq!(metrics::depth(&tree), EMPTY_DEPTH);
//!
//! let root = tree.create_container(Extrinsic::new()).unwrap();
//! tree.set_root(root).unwrap();
//! let bold = interner.intern(&RawState::tag("bold")).unwrap();
//! tree.insert_leaf(root, bold.clone(), Extrinsic::new(), None).unwrap();
//! tree.insert_leaf(root, bold, Extrinsic::new(), None).unwrap();
//!
//! assert_eq!(metrics::node_count(&tree), 3);
//! assert_eq!(metrics::distinct_state_count(&tree), 1);
//! assert_eq!(metrics::depth(&tree), 1);
//! ```

use crate::intern::SharedState;
use crate::traverse::Order;
use crate::tree::{NodeKind, Tree, TreeSnapshot};
use serde::Serialize;
use std::collections::HashSet;

/// Depth reported for a tree without a root.
pub const EMPTY_DEPTH: isize = -1;

/// Aggregates computed in a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TreeMetrics {
    /// Nodes reachable from the root.
    pub node_count: usize,
    /// Reachable leaves.
    pub leaf_count: usize,
    /// Reachable containers.
    pub container_count: usize,
    /// Distinct shared-state instances among reachable leaves.
    pub distinct_states: usize,
    /// Longest root-to-node path in edges, or [`EMPTY_DEPTH`].
    pub depth: isize,
}

/// Aggregate queries over one fixed snapshot.
///
/// Several queries on the same view always agree with each other, even if
/// the tree changes in between.
#[derive(Debug, Clone)]
pub struct MetricsView {
    snapshot: TreeSnapshot,
}

impl MetricsView {
    /// Capture a view of `tree` as it is now.
    pub fn new(tree: &Tree) -> Self {
        Self::from_snapshot(tree.snapshot())
    }

    /// View an existing snapshot.
    pub fn from_snapshot(snapshot: TreeSnapshot) -> Self {
        Self { snapshot }
    }

    /// Number of nodes reachable from the root.
    pub fn node_count(&self) -> usize {
        self.snapshot.traverse(Order::PreOrder).count()
    }

    /// Number of distinct shared-state identities held by reachable leaves.
    pub fn distinct_state_count(&self) -> usize {
        let walk = self.snapshot.traverse(Order::PreOrder);
        let mut seen: HashSet<*const SharedState> = HashSet::new();
        for id in walk {
            if let Some(state) = self.snapshot.node(id).ok().and_then(|n| n.state()) {
                seen.insert(state.as_ptr());
            }
        }
        seen.len()
    }

    /// Longest root-to-node path, root depth 0, [`EMPTY_DEPTH`] when empty.
    pub fn depth(&self) -> isize {
        self.snapshot
            .traverse(Order::LevelOrder)
            .with_depth()
            .last()
            .map_or(EMPTY_DEPTH, |(_, depth)| depth as isize)
    }

    /// All aggregates from one pass.
    pub fn summary(&self) -> TreeMetrics {
        let mut metrics = TreeMetrics {
            node_count: 0,
            leaf_count: 0,
            container_count: 0,
            distinct_states: 0,
            depth: EMPTY_DEPTH,
        };
        let mut seen: HashSet<*const SharedState> = HashSet::new();

        for (id, depth) in self.snapshot.traverse(Order::PreOrder).with_depth() {
            let Ok(node) = self.snapshot.node(id) else {
                continue;
            };
            metrics.node_count += 1;
            metrics.depth = metrics.depth.max(depth as isize);
            match node.kind() {
                NodeKind::Leaf { state } => {
                    metrics.leaf_count += 1;
                    seen.insert(state.as_ptr());
                }
                NodeKind::Container { .. } => metrics.container_count += 1,
            }
        }

        metrics.distinct_states = seen.len();
        metrics
    }
}

/// Number of nodes reachable from the root of `tree`.
pub fn node_count(tree: &Tree) -> usize {
    MetricsView::new(tree).node_count()
}

/// Number of distinct shared-state identities among reachable leaves.
pub fn distinct_state_count(tree: &Tree) -> usize {
    MetricsView::new(tree).distinct_state_count()
}

/// Longest root-to-node path of `tree`, or [`EMPTY_DEPTH`].
pub fn depth(tree: &Tree) -> isize {
    MetricsView::new(tree).depth()
}

/// All aggregates of `tree` from one snapshot.
pub fn summary(tree: &Tree) -> TreeMetrics {
    MetricsView::new(tree).summary()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::{RawState, StateInterner};
    use crate::tree::{Extrinsic, NodeId};
    use std::sync::Arc;

    fn example() -> (Tree, NodeId, NodeId) {
        let interner = Arc::new(StateInterner::new());
        let states: Vec<_> = ["bold", "italic", "bold"]
            .iter()
            .map(|t| interner.intern(&RawState::tag(*t)).unwrap())
            .collect();
        assert_eq!(interner.size(), 2);
        assert!(states[0].ptr_eq(&states[2]));

        let tree = Tree::new(interner);
        let root = tree.create_container(Extrinsic::new()).unwrap();
        tree.set_root(root).unwrap();
        tree.insert_leaf(root, states[0].clone(), Extrinsic::new(), None)
            .unwrap();
        let c = tree.insert_container(root, Extrinsic::new(), None).unwrap();
        tree.insert_leaf(c, states[1].clone(), Extrinsic::new(), None)
            .unwrap();
        (tree, root, c)
    }

    #[test]
    fn example_tree_metrics() {
        let (tree, ..) = example();

        assert_eq!(node_count(&tree), 4);
        assert_eq!(distinct_state_count(&tree), 2);
        assert_eq!(depth(&tree), 2);
    }

    #[test]
    fn summary_agrees_with_individual_queries() {
        let (tree, ..) = example();
        let summary = summary(&tree);

        assert_eq!(
            summary,
            TreeMetrics {
                node_count: 4,
                leaf_count: 2,
                container_count: 2,
                distinct_states: 2,
                depth: 2,
            }
        );
        assert_eq!(summary.leaf_count + summary.container_count, summary.node_count);
    }

    #[test]
    fn empty_tree_uses_sentinel() {
        let tree = Tree::new(Arc::new(StateInterner::new()));

        assert_eq!(node_count(&tree), 0);
        assert_eq!(distinct_state_count(&tree), 0);
        assert_eq!(depth(&tree), EMPTY_DEPTH);
        assert_eq!(summary(&tree).depth, EMPTY_DEPTH);
    }

    #[test]
    fn root_only_has_depth_zero() {
        let tree = Tree::new(Arc::new(StateInterner::new()));
        let root = tree.create_container(Extrinsic::new()).unwrap();
        tree.set_root(root).unwrap();

        assert_eq!(node_count(&tree), 1);
        assert_eq!(depth(&tree), 0);
    }

    #[test]
    fn free_subtrees_are_not_counted() {
        let (tree, _, c) = example();
        tree.detach(c).unwrap();

        assert_eq!(node_count(&tree), 2);
        assert_eq!(distinct_state_count(&tree), 1);
        assert_eq!(depth(&tree), 1);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn distinct_count_below_interner_size_when_states_unused() {
        let (tree, ..) = example();
        tree.interner().intern(&RawState::tag("underline")).unwrap();

        assert_eq!(distinct_state_count(&tree), 2);
        assert_eq!(tree.interner().size(), 3);
        assert!(distinct_state_count(&tree) <= node_count(&tree));
    }

    #[test]
    fn queries_do_not_mutate() {
        let (tree, root, _) = example();
        let interner_size = tree.interner().size();
        let constructions = tree.interner().constructions();

        summary(&tree);
        depth(&tree);

        assert_eq!(tree.interner().size(), interner_size);
        assert_eq!(tree.interner().constructions(), constructions);
        assert_eq!(tree.root(), Some(root));
    }

    #[test]
    fn view_is_stable_across_mutation() {
        let (tree, _, c) = example();
        let view = MetricsView::new(&tree);

        tree.remove_subtree(c).unwrap();

        assert_eq!(view.node_count(), 4);
        assert_eq!(view.depth(), 2);
        assert_eq!(node_count(&tree), 2);
    }

    #[test]
    fn summary_serializes() {
        let (tree, ..) = example();
        let json = serde_json::to_value(summary(&tree)).unwrap();
        assert_eq!(json["node_count"], 4);
        assert_eq!(json["depth"], 2);
    }
}
