//! Node arena with structural validation.
//!
//! Every mutation is split into a `check_*` pass over `&self` and an
//! `apply_*` pass that cannot fail, so a rejected mutation never touches the
//! arena or forces a copy-on-write clone.

use super::node::{Extrinsic, Node, NodeId};
use crate::error::{CanopyError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// All nodes owned by a tree plus its root.
#[derive(Debug, Clone, Default)]
pub(crate) struct Arena {
    nodes: HashMap<NodeId, Arc<Node>>,
    root: Option<NodeId>,
}

impl Arena {
    pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id).map(Arc::as_ref)
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node> {
        self.get(id).ok_or(CanopyError::NotFound(id.0))
    }

    pub(crate) fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn insert(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.insert(id, Arc::new(node));
        id
    }

    /// Mutable access that copies the node if a snapshot still shares it.
    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id).map(Arc::make_mut)
    }

    /// Walk parent links from `id` upward, `id` first.
    pub(crate) fn ancestors(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut path = Vec::new();
        let mut current = Some(self.node(id)?.id());

        while let Some(cursor) = current {
            if path.len() > self.nodes.len() {
                return Err(CanopyError::InvalidStructure(format!(
                    "parent chain of {id} does not terminate"
                )));
            }
            path.push(cursor);
            current = self.get(cursor).and_then(Node::parent);
        }

        Ok(path)
    }

    /// Whether `candidate` is `id` or one of its ancestors.
    fn is_ancestor_or_self(&self, candidate: NodeId, id: NodeId) -> Result<bool> {
        Ok(self.ancestors(id)?.contains(&candidate))
    }

    /// Validate an attach and resolve the insertion index.
    pub(crate) fn check_attach(
        &self,
        parent: NodeId,
        child: NodeId,
        position: Option<usize>,
    ) -> Result<usize> {
        let parent_node = self.node(parent)?;
        let child_node = self.node(child)?;

        if parent == child {
            return Err(CanopyError::InvalidStructure(format!(
                "cannot attach {child} to itself"
            )));
        }
        let Some(siblings) = parent_node.child_list() else {
            return Err(CanopyError::InvalidStructure(format!(
                "{parent} is a leaf and cannot own children"
            )));
        };
        if let Some(owner) = child_node.parent() {
            return Err(CanopyError::InvalidStructure(format!(
                "{child} is already owned by {owner}; detach it first"
            )));
        }
        if self.root == Some(child) {
            return Err(CanopyError::InvalidStructure(format!(
                "{child} is the tree root"
            )));
        }
        if self.is_ancestor_or_self(child, parent)? {
            return Err(CanopyError::InvalidStructure(format!(
                "attaching {child} under {parent} would create a cycle"
            )));
        }

        let len = siblings.len();
        match position {
            None => Ok(len),
            Some(at) if at <= len => Ok(at),
            Some(at) => Err(CanopyError::InvalidStructure(format!(
                "position {at} out of range for {parent} with {len} children"
            ))),
        }
    }

    /// Apply an attach previously validated by [`Arena::check_attach`].
    pub(crate) fn apply_attach(&mut self, parent: NodeId, child: NodeId, at: usize) {
        if let Some(siblings) = self.node_mut(parent).and_then(Node::children_mut) {
            siblings.insert(at, child);
        }
        if let Some(node) = self.node_mut(child) {
            node.set_parent(Some(parent));
        }
    }

    /// Validate a detach and return the current parent.
    pub(crate) fn check_detach(&self, id: NodeId) -> Result<NodeId> {
        self.node(id)?.parent().ok_or(CanopyError::NoParent(id.0))
    }

    pub(crate) fn apply_detach(&mut self, id: NodeId, parent: NodeId) {
        if let Some(siblings) = self.node_mut(parent).and_then(Node::children_mut) {
            siblings.retain(|&c| c != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.set_parent(None);
        }
    }

    /// Collect `id` and all descendants in pre-order.
    ///
    /// Fails without side effects if any child link is dangling.
    pub(crate) fn collect_subtree(&self, id: NodeId) -> Result<Vec<NodeId>> {
        self.node(id)?;

        let mut collected = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if collected.len() >= self.nodes.len() {
                return Err(CanopyError::InvalidStructure(format!(
                    "subtree of {id} revisits nodes"
                )));
            }
            let node = self.get(current).ok_or_else(|| {
                CanopyError::InvalidStructure(format!("dangling child {current} under {id}"))
            })?;
            collected.push(current);
            stack.extend(node.children().iter().rev());
        }

        Ok(collected)
    }

    /// Remove a collected subtree, returning the removed nodes.
    pub(crate) fn apply_remove(&mut self, ids: &[NodeId]) -> Vec<Arc<Node>> {
        let Some(&top) = ids.first() else {
            return Vec::new();
        };

        if let Some(parent) = self.get(top).and_then(Node::parent) {
            self.apply_detach(top, parent);
        }
        if self.root == Some(top) {
            self.root = None;
        }

        ids.iter().filter_map(|id| self.nodes.remove(id)).collect()
    }

    pub(crate) fn check_set_root(&self, id: NodeId) -> Result<()> {
        match self.node(id)?.parent() {
            Some(owner) => Err(CanopyError::InvalidStructure(format!(
                "{id} is owned by {owner} and cannot become root"
            ))),
            None => Ok(()),
        }
    }

    pub(crate) fn apply_set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    pub(crate) fn extrinsic_mut(&mut self, id: NodeId) -> Option<&mut Extrinsic> {
        self.node_mut(id).map(Node::extrinsic_mut)
    }
}
