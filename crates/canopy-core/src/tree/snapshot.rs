//! Immutable views of a tree.

use super::arena::Arena;
use super::node::{Node, NodeId};
use crate::error::Result;
use crate::traverse::{Order, Traversal};
use std::sync::Arc;

/// A point-in-time view of a [`Tree`](super::Tree).
///
/// Taking a snapshot is O(1). Later mutations of the tree copy whatever they
/// touch, so the snapshot keeps seeing the structure as it was.
#[derive(Debug, Clone)]
pub struct TreeSnapshot {
    arena: Arc<Arena>,
}

impl TreeSnapshot {
    pub(crate) fn new(arena: Arc<Arena>) -> Self {
        Self { arena }
    }

    /// Root at the time of the snapshot.
    pub fn root(&self) -> Option<NodeId> {
        self.arena.root()
    }

    /// Resolve a node.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.arena.node(id)
    }

    /// Children of `id` in order.
    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(self.arena.node(id)?.children())
    }

    /// Parent of `id`.
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.arena.node(id)?.parent())
    }

    /// Check if a node exists in the snapshot.
    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.get(id).is_some()
    }

    /// Number of nodes, free subtrees included.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Check if the snapshot holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }

    /// Traverse from the root; empty if the tree has none.
    pub fn traverse(&self, order: Order) -> Traversal {
        Traversal::new(Arc::clone(&self.arena), self.root(), order)
    }

    /// Traverse the subtree rooted at `start`.
    pub fn traverse_from(&self, start: NodeId, order: Order) -> Result<Traversal> {
        self.arena.node(start)?;
        Ok(Traversal::new(Arc::clone(&self.arena), Some(start), order))
    }
}
