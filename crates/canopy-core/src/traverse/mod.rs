//! Snapshot-isolated traversal.
//!
//! [`traverse`] captures an O(1) snapshot of the tree and returns a lazy
//! [`Traversal`] over the subtree at the requested start node. The
//! traversal:
//! - produces ids on demand, bounded by the snapshot's size
//! - never observes mutations made after it was created
//! - holds no lock, so mutators are never blocked by a slow consumer
//! - can be dropped at any point without draining
//!
//! Calling [`traverse`] again yields a fresh, independent sequence over the
//! tree's current state.
//!
//! | Order | Visits |
//! |-------|--------|
//! | [`Order::PreOrder`] | node, then children left to right |
//! | [`Order::PostOrder`] | children left to right, then node |
//! | [`Order::LevelOrder`] | breadth first, siblings in child order |
//!
//! # Example
//!
//! ```rust
//! use canopy_core::intern::{RawState, StateInterner};
//! use canopy_core::traverse::{traverse, Order};
//! use canopy_core::tree::{Extrinsic, Tree};
//! use std::sync::Arc;
//!
//! let interner = Arc::new(StateInterner::new());
//! let tree = Tree::new(interner.clone());
//! let root = tree.create_container(Extrinsic::new()).unwrap();
//! tree.set_root(root).unwrap();
//! let c = tree.insert_container(root, Extrinsic::new(), None).unwrap();
//! let leaf = tree
//!     .insert_leaf(c, interner.intern(&RawState::tag("bold")).unwrap(), Extrinsic::new(), None)
//!     .unwrap();
//!
//! let walk = traverse(&tree, root, Order::PreOrder).unwrap();
//! tree.remove_subtree(c).unwrap();
//!
//! // The walk still sees the tree as it was when it started.
//! assert_eq!(walk.collect::<Vec<_>>(), vec![root, c, leaf]);
//! ```

mod walker;

pub use walker::{Traversal, WithDepth};

use crate::error::Result;
use crate::tree::{NodeId, Tree};
use serde::{Deserialize, Serialize};

/// Visiting order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    /// Node before its children.
    #[default]
    PreOrder,
    /// Children before their node.
    PostOrder,
    /// Breadth first.
    LevelOrder,
}

/// Traverse the subtree of `tree` rooted at `start`.
///
/// Fails with `NotFound` if `start` is not in the tree when called.
pub fn traverse(tree: &Tree, start: NodeId, order: Order) -> Result<Traversal> {
    tree.snapshot().traverse_from(start, order)
}
