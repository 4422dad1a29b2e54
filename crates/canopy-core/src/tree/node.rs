//! Tree node representation.

use crate::intern::SharedStateRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-node attributes that are never shared between nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Extrinsic(BTreeMap<String, Value>);

impl Extrinsic {
    /// Create empty attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Insert or replace an attribute, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    /// Look up an attribute.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Remove an attribute.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Leaf or container payload.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Terminal node holding one interned state.
    Leaf {
        /// Shared intrinsic state.
        state: SharedStateRef,
    },
    /// Node with ordered children.
    Container {
        /// Children in insertion order.
        children: Vec<NodeId>,
    },
}

/// A node in the tree.
///
/// The parent link is a lookup field used for upward walks; ownership runs
/// strictly from a container's child list.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    parent: Option<NodeId>,
    kind: NodeKind,
    extrinsic: Extrinsic,
}

impl Node {
    /// Create a free leaf.
    pub(crate) fn leaf(state: SharedStateRef, extrinsic: Extrinsic) -> Self {
        Self {
            id: NodeId::new(),
            parent: None,
            kind: NodeKind::Leaf { state },
            extrinsic,
        }
    }

    /// Create a free, empty container.
    pub(crate) fn container(extrinsic: Extrinsic) -> Self {
        Self {
            id: NodeId::new(),
            parent: None,
            kind: NodeKind::Container {
                children: Vec::new(),
            },
            extrinsic,
        }
    }

    /// Get node ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get parent node ID.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Get the leaf/container payload.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Get extrinsic attributes.
    pub fn extrinsic(&self) -> &Extrinsic {
        &self.extrinsic
    }

    /// Check if this is a leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// Shared state, for leaves.
    pub fn state(&self) -> Option<&SharedStateRef> {
        match &self.kind {
            NodeKind::Leaf { state } => Some(state),
            NodeKind::Container { .. } => None,
        }
    }

    /// Children in order; empty for leaves.
    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Leaf { .. } => &[],
            NodeKind::Container { children } => children,
        }
    }

    /// Child list for containers, `None` for leaves.
    pub(crate) fn child_list(&self) -> Option<&[NodeId]> {
        match &self.kind {
            NodeKind::Leaf { .. } => None,
            NodeKind::Container { children } => Some(children),
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match &mut self.kind {
            NodeKind::Leaf { .. } => None,
            NodeKind::Container { children } => Some(children),
        }
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }

    pub(crate) fn extrinsic_mut(&mut self) -> &mut Extrinsic {
        &mut self.extrinsic
    }
}
