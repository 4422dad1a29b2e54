//! Composite trees of leaves and containers.
//!
//! This module provides:
//! - [`Node`]s that are either leaves (one interned state) or containers
//!   (ordered children), each with per-node [`Extrinsic`] attributes
//! - [`Tree`], which owns every node in an arena addressed by [`NodeId`]
//! - [`TreeSnapshot`], an O(1) immutable view used by traversal
//!
//! # Ownership
//!
//! A container's child list is the only ownership edge. Each node also keeps
//! its parent id for upward walks (depth, ancestors, cycle checks). Every
//! mutation keeps the two directions in agreement:
//! - a non-root node has exactly one parent
//! - no node is its own ancestor
//! - sibling order only changes through explicit attach/detach
//!
//! Nodes created with [`Tree::create_leaf`] or [`Tree::create_container`]
//! start free. They join the tree through [`Tree::attach_child`] or
//! [`Tree::set_root`]. A node that already has a parent must be detached
//! before it is attached elsewhere.
//!
//! # Example
//!
//! ```rust
//! use canopy_core::intern::{RawState, StateInterner};
//! use canopy_core::tree::{Extrinsic, Tree};
//! use std::sync::Arc;
//!
//! let interner = Arc::new(StateInterner::new());
//! let tree = Tree::new(interner.clone());
//!
//! let root = tree.create_container(Extrinsic::new()).unwrap();
//! tree.set_root(root).unwrap();
//!
//! let bold = interner.intern(&RawState::tag("bold")).unwrap();
//! let leaf = tree.insert_leaf(root, bold, Extrinsic::new().with("x", 0), None).unwrap();
//! let c = tree.insert_container(root, Extrinsic::new(), None).unwrap();
//!
//! assert_eq!(tree.get_children(root).unwrap(), vec![leaf, c]);
//! assert_eq!(tree.get_parent(c).unwrap(), Some(root));
//!
//! // Re-parenting requires an explicit detach.
//! assert!(tree.attach_child(c, leaf, None).is_err());
//! tree.detach(leaf).unwrap();
//! tree.attach_child(c, leaf, None).unwrap();
//!
//! assert_eq!(tree.remove_subtree(c).unwrap(), 2);
//! ```

pub(crate) mod arena;
mod node;
mod snapshot;
mod state;

pub use node::{Extrinsic, Node, NodeId, NodeKind};
pub use snapshot::TreeSnapshot;
pub use state::{Tree, TreeConfig};
