//! Tree state management.

use super::arena::Arena;
use super::node::{Extrinsic, Node, NodeId};
use super::snapshot::TreeSnapshot;
use crate::error::{CanopyError, Result};
use crate::intern::{SharedStateRef, StateInterner, StateKey};
use parking_lot::{RwLock, RwLockWriteGuard};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Tree configuration.
#[derive(Debug, Clone, Default)]
pub struct TreeConfig {
    /// Upper bound on waiting for the write lock. `None` waits indefinitely.
    pub lock_timeout: Option<Duration>,
}

/// A tree of leaves and containers over interned shared state.
///
/// All mutations are serialized by one tree-wide lock. Reads clone the
/// current arena pointer and release the lock immediately, so snapshots and
/// traversals never hold it.
#[derive(Debug)]
pub struct Tree {
    arena: RwLock<Arc<Arena>>,
    interner: Arc<StateInterner>,
    config: TreeConfig,
}

impl Tree {
    /// Create an empty tree over `interner`.
    pub fn new(interner: Arc<StateInterner>) -> Self {
        Self::with_config(interner, TreeConfig::default())
    }

    /// Create an empty tree with the given configuration.
    pub fn with_config(interner: Arc<StateInterner>, config: TreeConfig) -> Self {
        Self {
            arena: RwLock::new(Arc::new(Arena::default())),
            interner,
            config,
        }
    }

    /// Get the interner this tree's leaves draw from.
    pub fn interner(&self) -> &Arc<StateInterner> {
        &self.interner
    }

    /// Get the tree configuration.
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Replace the configuration, consuming the tree.
    pub fn into_config(self, config: TreeConfig) -> Self {
        Self { config, ..self }
    }

    /// Take the write lock, honouring the configured timeout.
    fn write(&self) -> Result<RwLockWriteGuard<'_, Arc<Arena>>> {
        match self.config.lock_timeout {
            None => Ok(self.arena.write()),
            Some(timeout) => self.arena.try_write_for(timeout).ok_or_else(|| {
                CanopyError::ConcurrencyError(format!(
                    "tree write lock not acquired within {timeout:?}"
                ))
            }),
        }
    }

    /// Current arena, shared with the caller.
    fn current(&self) -> Arc<Arena> {
        Arc::clone(&*self.arena.read())
    }

    /// Capture an immutable view of the whole tree.
    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot::new(self.current())
    }

    /// Create a free leaf holding `state`.
    ///
    /// The state must have been issued by this tree's interner.
    pub fn create_leaf(&self, state: SharedStateRef, extrinsic: Extrinsic) -> Result<NodeId> {
        self.check_issued(&state)?;
        let mut arena = self.write()?;
        let id = Arc::make_mut(&mut *arena).insert(Node::leaf(state, extrinsic));
        trace!(node = %id, "created leaf");
        Ok(id)
    }

    /// Create a free, empty container.
    pub fn create_container(&self, extrinsic: Extrinsic) -> Result<NodeId> {
        let mut arena = self.write()?;
        let id = Arc::make_mut(&mut *arena).insert(Node::container(extrinsic));
        trace!(node = %id, "created container");
        Ok(id)
    }

    /// Create a leaf and attach it under `parent` in one step.
    pub fn insert_leaf(
        &self,
        parent: NodeId,
        state: SharedStateRef,
        extrinsic: Extrinsic,
        position: Option<usize>,
    ) -> Result<NodeId> {
        self.check_issued(&state)?;
        self.insert_with(parent, Node::leaf(state, extrinsic), position)
    }

    /// Create a container and attach it under `parent` in one step.
    pub fn insert_container(
        &self,
        parent: NodeId,
        extrinsic: Extrinsic,
        position: Option<usize>,
    ) -> Result<NodeId> {
        self.insert_with(parent, Node::container(extrinsic), position)
    }

    fn insert_with(&self, parent: NodeId, node: Node, position: Option<usize>) -> Result<NodeId> {
        let mut guard = self.write()?;

        // A fresh node is never an ancestor, so only the parent side can fail.
        let parent_node = guard.node(parent)?;
        let Some(siblings) = parent_node.child_list() else {
            return Err(CanopyError::InvalidStructure(format!(
                "{parent} is a leaf and cannot own children"
            )));
        };
        let len = siblings.len();
        let at = match position {
            None => len,
            Some(at) if at <= len => at,
            Some(at) => {
                return Err(CanopyError::InvalidStructure(format!(
                    "position {at} out of range for {parent} with {len} children"
                )))
            }
        };

        let arena = Arc::make_mut(&mut *guard);
        let id = arena.insert(node);
        arena.apply_attach(parent, id, at);
        debug!(parent = %parent, child = %id, at, "inserted node");
        Ok(id)
    }

    /// Make `id` the root. A previous root becomes a free subtree.
    pub fn set_root(&self, id: NodeId) -> Result<()> {
        let mut guard = self.write()?;
        guard.check_set_root(id)?;
        Arc::make_mut(&mut *guard).apply_set_root(id);
        debug!(root = %id, "set root");
        Ok(())
    }

    /// Current root, if any.
    pub fn root(&self) -> Option<NodeId> {
        self.arena.read().root()
    }

    /// Attach a parentless node under `parent` at `position` (default: end).
    pub fn attach_child(
        &self,
        parent: NodeId,
        child: NodeId,
        position: Option<usize>,
    ) -> Result<()> {
        let mut guard = self.write()?;
        let at = guard.check_attach(parent, child, position)?;
        Arc::make_mut(&mut *guard).apply_attach(parent, child, at);
        debug!(parent = %parent, child = %child, at, "attached child");
        Ok(())
    }

    /// Detach `id` from its parent, leaving it as a free subtree.
    pub fn detach(&self, id: NodeId) -> Result<()> {
        let mut guard = self.write()?;
        let parent = guard.check_detach(id)?;
        Arc::make_mut(&mut *guard).apply_detach(id, parent);
        debug!(parent = %parent, child = %id, "detached child");
        Ok(())
    }

    /// Destroy `id` and all of its descendants, returning how many were removed.
    ///
    /// The subtree is validated before anything is unlinked, so either the
    /// whole subtree goes or nothing does.
    pub fn remove_subtree(&self, id: NodeId) -> Result<usize> {
        let mut guard = self.write()?;
        let ids = guard.collect_subtree(id)?;
        let removed = Arc::make_mut(&mut *guard).apply_remove(&ids);
        drop(guard);

        let count = removed.len();
        let mut released: Vec<StateKey> = removed
            .iter()
            .filter_map(|node| node.state().map(|s| s.key()))
            .collect();
        released.sort_unstable();
        released.dedup();

        // Handles must be dropped before retention can see them as unreferenced.
        drop(removed);
        let evicted = self.interner.release(released);

        debug!(node = %id, count, evicted, "removed subtree");
        Ok(count)
    }

    /// Children of `id` in order; empty for leaves.
    pub fn get_children(&self, id: NodeId) -> Result<Vec<NodeId>> {
        Ok(self.arena.read().node(id)?.children().to_vec())
    }

    /// Parent of `id`, or `None` for roots and free nodes.
    pub fn get_parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.arena.read().node(id)?.parent())
    }

    /// Resolved copy of a node.
    pub fn node(&self, id: NodeId) -> Result<Node> {
        Ok(self.arena.read().node(id)?.clone())
    }

    /// Replace a node's extrinsic attributes, returning the previous ones.
    pub fn set_extrinsic(&self, id: NodeId, extrinsic: Extrinsic) -> Result<Extrinsic> {
        let mut guard = self.write()?;
        guard.node(id)?;
        let slot = Arc::make_mut(&mut *guard)
            .extrinsic_mut(id)
            .ok_or(CanopyError::NotFound(id.0))?;
        Ok(std::mem::replace(slot, extrinsic))
    }

    /// `id` followed by each ancestor up to the top of its subtree.
    pub fn ancestors(&self, id: NodeId) -> Result<Vec<NodeId>> {
        self.arena.read().ancestors(id)
    }

    /// Number of edges between `id` and the top of its subtree.
    pub fn depth_of(&self, id: NodeId) -> Result<usize> {
        Ok(self.ancestors(id)?.len() - 1)
    }

    /// Check if a node exists in the arena.
    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.read().get(id).is_some()
    }

    /// Number of nodes in the arena, free subtrees included.
    pub fn len(&self) -> usize {
        self.arena.read().len()
    }

    /// Check if the arena holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_issued(&self, state: &SharedStateRef) -> Result<()> {
        if self.interner.issued(state) {
            Ok(())
        } else {
            Err(CanopyError::InvalidStructure(format!(
                "state {} was not issued by this tree's interner",
                state.key()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::{InternerConfig, RawState, RetentionPolicy};
    use std::sync::Barrier;

    fn create_test_tree() -> Tree {
        Tree::new(Arc::new(StateInterner::new()))
    }

    fn state(tree: &Tree, tag: &str) -> SharedStateRef {
        tree.interner().intern(&RawState::tag(tag)).unwrap()
    }

    /// Root → [Leaf(bold), C → [Leaf(italic)]]
    fn build_example(tree: &Tree) -> (NodeId, NodeId, NodeId, NodeId) {
        let root = tree.create_container(Extrinsic::new()).unwrap();
        tree.set_root(root).unwrap();
        let bold = tree
            .insert_leaf(root, state(tree, "bold"), Extrinsic::new(), None)
            .unwrap();
        let c = tree.insert_container(root, Extrinsic::new(), None).unwrap();
        let italic = tree
            .insert_leaf(c, state(tree, "italic"), Extrinsic::new(), None)
            .unwrap();
        (root, bold, c, italic)
    }

    #[test]
    fn new_tree_is_empty() {
        let tree = create_test_tree();
        assert!(tree.is_empty());
        assert!(tree.root().is_none());
    }

    #[test]
    fn created_nodes_are_free() {
        let tree = create_test_tree();
        let leaf = tree
            .create_leaf(state(&tree, "bold"), Extrinsic::new())
            .unwrap();

        assert_eq!(tree.get_parent(leaf).unwrap(), None);
        assert!(tree.get_children(leaf).unwrap().is_empty());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn attach_appends_in_order() {
        let tree = create_test_tree();
        let p = tree.create_container(Extrinsic::new()).unwrap();
        let x = tree.create_container(Extrinsic::new()).unwrap();
        let y = tree.create_container(Extrinsic::new()).unwrap();
        let z = tree.create_container(Extrinsic::new()).unwrap();

        tree.attach_child(p, x, None).unwrap();
        tree.attach_child(p, z, None).unwrap();
        tree.attach_child(p, y, Some(1)).unwrap();

        assert_eq!(tree.get_children(p).unwrap(), vec![x, y, z]);
        assert_eq!(tree.get_parent(y).unwrap(), Some(p));
    }

    #[test]
    fn attach_owned_child_requires_detach() {
        let tree = create_test_tree();
        let a = tree.create_container(Extrinsic::new()).unwrap();
        let b = tree.create_container(Extrinsic::new()).unwrap();
        let c = tree.create_container(Extrinsic::new()).unwrap();
        tree.attach_child(a, c, None).unwrap();

        let result = tree.attach_child(b, c, None);
        assert!(matches!(result, Err(CanopyError::InvalidStructure(_))));
        assert_eq!(tree.get_parent(c).unwrap(), Some(a));

        tree.detach(c).unwrap();
        tree.attach_child(b, c, None).unwrap();
        assert_eq!(tree.get_parent(c).unwrap(), Some(b));
        assert!(tree.get_children(a).unwrap().is_empty());
    }

    #[test]
    fn attach_ancestor_fails_and_leaves_tree_unchanged() {
        let tree = create_test_tree();
        let a = tree.create_container(Extrinsic::new()).unwrap();
        let b = tree.insert_container(a, Extrinsic::new(), None).unwrap();
        let d = tree.insert_container(b, Extrinsic::new(), None).unwrap();

        for descendant in [b, d] {
            let result = tree.attach_child(descendant, a, None);
            assert!(matches!(result, Err(CanopyError::InvalidStructure(_))));
        }

        assert_eq!(tree.get_parent(a).unwrap(), None);
        assert_eq!(tree.get_children(a).unwrap(), vec![b]);
        assert_eq!(tree.get_children(b).unwrap(), vec![d]);
        assert!(tree.get_children(d).unwrap().is_empty());
    }

    #[test]
    fn attach_to_self_fails() {
        let tree = create_test_tree();
        let a = tree.create_container(Extrinsic::new()).unwrap();
        assert!(matches!(
            tree.attach_child(a, a, None),
            Err(CanopyError::InvalidStructure(_))
        ));
    }

    #[test]
    fn attach_root_fails() {
        let tree = create_test_tree();
        let (root, ..) = build_example(&tree);
        let other = tree.create_container(Extrinsic::new()).unwrap();

        assert!(matches!(
            tree.attach_child(other, root, None),
            Err(CanopyError::InvalidStructure(_))
        ));
    }

    #[test]
    fn attach_unknown_ids_fail_with_not_found() {
        let tree = create_test_tree();
        let a = tree.create_container(Extrinsic::new()).unwrap();
        let unknown = NodeId(u64::MAX - 1);

        assert!(matches!(
            tree.attach_child(unknown, a, None),
            Err(CanopyError::NotFound(_))
        ));
        assert!(matches!(
            tree.attach_child(a, unknown, None),
            Err(CanopyError::NotFound(_))
        ));
    }

    #[test]
    fn insert_under_leaf_creates_nothing() {
        let tree = create_test_tree();
        let (_, bold, ..) = build_example(&tree);
        let before = tree.len();

        let result = tree.insert_container(bold, Extrinsic::new(), None);
        assert!(matches!(result, Err(CanopyError::InvalidStructure(_))));
        assert_eq!(tree.len(), before);
    }

    #[test]
    fn insert_out_of_range_creates_nothing() {
        let tree = create_test_tree();
        let (root, ..) = build_example(&tree);
        let before = tree.len();

        let result = tree.insert_container(root, Extrinsic::new(), Some(5));
        assert!(matches!(result, Err(CanopyError::InvalidStructure(_))));
        assert_eq!(tree.len(), before);
    }

    #[test]
    fn detach_root_fails_with_no_parent() {
        let tree = create_test_tree();
        let (root, ..) = build_example(&tree);

        assert!(matches!(tree.detach(root), Err(CanopyError::NoParent(_))));
        assert!(matches!(
            tree.detach(NodeId(u64::MAX - 1)),
            Err(CanopyError::NotFound(_))
        ));
    }

    #[test]
    fn remove_subtree_counts_descendants() {
        let tree = create_test_tree();
        let (root, bold, c, italic) = build_example(&tree);

        assert_eq!(tree.remove_subtree(c).unwrap(), 2);
        assert_eq!(tree.get_children(root).unwrap(), vec![bold]);
        assert!(!tree.contains(c));
        assert!(!tree.contains(italic));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn remove_root_empties_tree() {
        let tree = create_test_tree();
        let (root, ..) = build_example(&tree);

        assert_eq!(tree.remove_subtree(root).unwrap(), 4);
        assert!(tree.root().is_none());
        assert!(tree.is_empty());
    }

    #[test]
    fn remove_unknown_fails() {
        let tree = create_test_tree();
        assert!(matches!(
            tree.remove_subtree(NodeId(u64::MAX - 1)),
            Err(CanopyError::NotFound(_))
        ));
    }

    #[test]
    fn retain_forever_keeps_states_after_removal() {
        let tree = create_test_tree();
        let (_, _, c, _) = build_example(&tree);

        tree.remove_subtree(c).unwrap();
        assert_eq!(tree.interner().size(), 2);
    }

    #[test]
    fn evict_unreferenced_drops_released_states() {
        let interner = Arc::new(StateInterner::with_config(InternerConfig {
            retention: RetentionPolicy::EvictUnreferenced,
        }));
        let tree = Tree::new(interner.clone());
        let (root, _, c, _) = build_example(&tree);

        // A second bold leaf keeps "bold" alive after its sibling goes.
        let extra = tree
            .insert_leaf(c, state(&tree, "bold"), Extrinsic::new(), None)
            .unwrap();
        assert_eq!(interner.size(), 2);

        tree.remove_subtree(c).unwrap();
        assert_eq!(interner.size(), 1);
        assert!(!tree.contains(extra));

        tree.remove_subtree(root).unwrap();
        assert!(interner.is_empty());
    }

    #[test]
    fn snapshot_keeps_released_states_alive() {
        let interner = Arc::new(StateInterner::with_config(InternerConfig {
            retention: RetentionPolicy::EvictUnreferenced,
        }));
        let tree = Tree::new(interner.clone());
        let (root, ..) = build_example(&tree);

        let snapshot = tree.snapshot();
        tree.remove_subtree(root).unwrap();
        assert_eq!(interner.size(), 2);

        drop(snapshot);
        assert_eq!(interner.purge_unreferenced(), 2);
    }

    #[test]
    fn leaf_from_foreign_interner_is_rejected() {
        let tree = create_test_tree();
        let foreign = StateInterner::new()
            .intern(&RawState::tag("bold"))
            .unwrap();

        assert!(matches!(
            tree.create_leaf(foreign, Extrinsic::new()),
            Err(CanopyError::InvalidStructure(_))
        ));
    }

    #[test]
    fn set_root_replaces_previous_root() {
        let tree = create_test_tree();
        let (old_root, ..) = build_example(&tree);
        let new_root = tree.create_container(Extrinsic::new()).unwrap();

        tree.set_root(new_root).unwrap();
        assert_eq!(tree.root(), Some(new_root));
        // The old root is now a free subtree and may be attached.
        tree.attach_child(new_root, old_root, None).unwrap();
        assert_eq!(tree.depth_of(old_root).unwrap(), 1);
    }

    #[test]
    fn set_root_rejects_owned_node() {
        let tree = create_test_tree();
        let (_, _, c, _) = build_example(&tree);
        assert!(matches!(
            tree.set_root(c),
            Err(CanopyError::InvalidStructure(_))
        ));
    }

    #[test]
    fn set_extrinsic_returns_previous() {
        let tree = create_test_tree();
        let id = tree
            .create_container(Extrinsic::new().with("x", 1))
            .unwrap();

        let old = tree.set_extrinsic(id, Extrinsic::new().with("x", 2)).unwrap();
        assert_eq!(old.get("x"), Some(&serde_json::Value::from(1)));
        assert_eq!(
            tree.node(id).unwrap().extrinsic().get("x"),
            Some(&serde_json::Value::from(2))
        );
    }

    #[test]
    fn ancestors_and_depth() {
        let tree = create_test_tree();
        let (root, _, c, italic) = build_example(&tree);

        assert_eq!(tree.ancestors(italic).unwrap(), vec![italic, c, root]);
        assert_eq!(tree.depth_of(italic).unwrap(), 2);
        assert_eq!(tree.depth_of(root).unwrap(), 0);
    }

    #[test]
    fn lock_timeout_reports_concurrency_error() {
        let tree = Tree::with_config(
            Arc::new(StateInterner::new()),
            TreeConfig {
                lock_timeout: Some(Duration::from_millis(10)),
            },
        );

        let held = tree.arena.read();
        let result = tree.create_container(Extrinsic::new());
        drop(held);

        let err = result.unwrap_err();
        assert!(matches!(err, CanopyError::ConcurrencyError(_)));
        assert!(err.is_retryable());
        assert!(tree.create_container(Extrinsic::new()).is_ok());
    }

    #[test]
    fn concurrent_mutations_on_disjoint_branches() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 25;

        let tree = create_test_tree();
        let root = tree.create_container(Extrinsic::new()).unwrap();
        tree.set_root(root).unwrap();
        let branches: Vec<_> = (0..THREADS)
            .map(|_| tree.insert_container(root, Extrinsic::new(), None).unwrap())
            .collect();
        let barrier = Barrier::new(THREADS);

        std::thread::scope(|s| {
            for &branch in &branches {
                let tree = &tree;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    for i in 0..PER_THREAD {
                        let st = state(tree, if i % 2 == 0 { "even" } else { "odd" });
                        tree.insert_leaf(branch, st, Extrinsic::new().with("i", i), None)
                            .unwrap();
                    }
                });
            }
        });

        for branch in branches {
            let children = tree.get_children(branch).unwrap();
            assert_eq!(children.len(), PER_THREAD);
            for child in children {
                assert_eq!(tree.get_parent(child).unwrap(), Some(branch));
            }
        }
        assert_eq!(tree.interner().size(), 2);
    }
}
