//! Nested export records and re-import.
//!
//! [`export`] writes each distinct state once into a key-indexed table and
//! has leaves refer to it by [`StateKey`]. [`import`] re-interns the table
//! entries, checks that every recomputed key matches its table key, and
//! rebuilds the structure with fresh node ids. Deduplication therefore
//! survives a round trip: leaves that shared one instance before share one
//! instance afterwards.
//!
//! ```rust
//! use canopy_core::export::{export, import};
//! use canopy_core::intern::{RawState, StateInterner};
//! use canopy_core::tree::{Extrinsic, Tree};
//! use std::sync::Arc;
//!
//! let interner = Arc::new(StateInterner::new());
//! let tree = Tree::new(interner.clone());
//! let root = tree.create_container(Extrinsic::new()).unwrap();
//! tree.set_root(root).unwrap();
//! let bold = interner.intern(&RawState::tag("bold")).unwrap();
//! tree.insert_leaf(root, bold.clone(), Extrinsic::new().with("x", 1), None).unwrap();
//! tree.insert_leaf(root, bold, Extrinsic::new().with("x", 2), None).unwrap();
//!
//! let doc = export(&tree).unwrap();
//! assert_eq!(doc.states.len(), 1);
//!
//! let json = doc.to_json().unwrap();
//! let copy = import(&json.parse().unwrap(), Arc::new(StateInterner::new())).unwrap();
//! assert_eq!(export(&copy).unwrap().shape(), doc.shape());
//! ```

use crate::error::{CanopyError, Result};
use crate::intern::{RawState, SharedStateRef, StateInterner, StateKey};
use crate::traverse::Order;
use crate::tree::{Extrinsic, NodeId, NodeKind, Tree};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Kind tag of an exported node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Leaf holding a state key.
    Leaf,
    /// Container with children.
    Container,
}

/// One exported node and its exported children.
///
/// Records nest one level per tree level. Dropping, comparing and shaping
/// them uses explicit stacks, and JSON encoding grows the stack on demand,
/// so arbitrarily deep trees are handled.
#[derive(Serialize, Deserialize)]
pub struct NodeRecord {
    /// Id in the exporting tree. Not preserved by import.
    pub node_id: u64,
    /// Leaf or container.
    pub kind: RecordKind,
    /// State key, for leaves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<StateKey>,
    /// Extrinsic attributes.
    #[serde(default)]
    pub extrinsic: Extrinsic,
    /// Children in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeRecord>,
}

/// An exported tree: the state table plus the nested structure.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    /// Fields of each distinct state, by key.
    pub states: BTreeMap<StateKey, BTreeMap<String, String>>,
    /// Root record, `None` for an empty tree.
    pub root: Option<NodeRecord>,
}

/// Structure of a record tree with node ids erased.
///
/// Two documents with equal shapes describe equivalent trees.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    /// Pre-order entries; child counts make the nesting unambiguous.
    entries: Vec<ShapeEntry>,
}

#[derive(Debug, Clone, PartialEq)]
struct ShapeEntry {
    kind: RecordKind,
    state_key: Option<StateKey>,
    extrinsic: Extrinsic,
    children: usize,
}

impl Shape {
    /// Number of nodes described.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the shape describes no nodes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ExportDocument {
    /// Serialize as compact JSON.
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        String::from_utf8(buf)
            .map_err(|e| CanopyError::SerdeError(serde::ser::Error::custom(e)))
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut de = serde_json::Deserializer::from_str(json);
        de.disable_recursion_limit();
        let doc = Self::deserialize(serde_stacker::Deserializer::new(&mut de))?;
        de.end()?;
        Ok(doc)
    }

    /// Write as JSON to `writer`.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut ser = serde_json::Serializer::new(writer);
        self.serialize(serde_stacker::Serializer::new(&mut ser))?;
        Ok(())
    }

    /// Read JSON from `reader`.
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        let mut de = serde_json::Deserializer::from_reader(reader);
        de.disable_recursion_limit();
        let doc = Self::deserialize(serde_stacker::Deserializer::new(&mut de))?;
        de.end()?;
        Ok(doc)
    }

    /// Write to a JSON file at `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Load from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        Self::read_from(BufReader::new(File::open(path)?))
    }

    /// Id-free structure for equivalence checks.
    pub fn shape(&self) -> Option<Shape> {
        self.root.as_ref().map(NodeRecord::shape)
    }
}

impl FromStr for ExportDocument {
    type Err = CanopyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_json(s)
    }
}

impl NodeRecord {
    /// Id-free structure of this record.
    pub fn shape(&self) -> Shape {
        let mut entries = Vec::new();
        let mut stack = vec![self];
        while let Some(record) = stack.pop() {
            entries.push(ShapeEntry {
                kind: record.kind,
                state_key: record.state_key,
                extrinsic: record.extrinsic.clone(),
                children: record.children.len(),
            });
            stack.extend(record.children.iter().rev());
        }
        Shape { entries }
    }
}

impl Drop for NodeRecord {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut record) = pending.pop() {
            pending.append(&mut record.children);
        }
    }
}

impl PartialEq for NodeRecord {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((a, b)) = pending.pop() {
            if a.node_id != b.node_id
                || a.kind != b.kind
                || a.state_key != b.state_key
                || a.extrinsic != b.extrinsic
                || a.children.len() != b.children.len()
            {
                return false;
            }
            pending.extend(a.children.iter().zip(&b.children));
        }
        true
    }
}

impl fmt::Debug for NodeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRecord")
            .field("node_id", &self.node_id)
            .field("kind", &self.kind)
            .field("state_key", &self.state_key)
            .field("extrinsic", &self.extrinsic)
            .field("children", &self.children.len())
            .finish()
    }
}

/// Export the part of `tree` reachable from its root.
pub fn export(tree: &Tree) -> Result<ExportDocument> {
    let snapshot = tree.snapshot();
    let mut doc = ExportDocument::default();
    let Some(root) = snapshot.root() else {
        return Ok(doc);
    };

    // Post-order guarantees every child record exists before its parent.
    let mut built: HashMap<NodeId, NodeRecord> = HashMap::new();
    for id in snapshot.traverse_from(root, Order::PostOrder)? {
        let node = snapshot.node(id)?;
        let record = match node.kind() {
            NodeKind::Leaf { state } => {
                doc.states
                    .entry(state.key())
                    .or_insert_with(|| state.fields().clone());
                NodeRecord {
                    node_id: id.0,
                    kind: RecordKind::Leaf,
                    state_key: Some(state.key()),
                    extrinsic: node.extrinsic().clone(),
                    children: Vec::new(),
                }
            }
            NodeKind::Container { children } => {
                let children = children
                    .iter()
                    .map(|child| {
                        built.remove(child).ok_or_else(|| {
                            CanopyError::InvalidStructure(format!(
                                "child {child} of {id} missing from export"
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                NodeRecord {
                    node_id: id.0,
                    kind: RecordKind::Container,
                    state_key: None,
                    extrinsic: node.extrinsic().clone(),
                    children,
                }
            }
        };
        built.insert(id, record);
    }

    doc.root = built.remove(&root);
    debug!(states = doc.states.len(), "exported tree");
    Ok(doc)
}

/// Rebuild a tree from `doc`, interning its states into `interner`.
///
/// The document is fully validated before the tree is returned; on any
/// error nothing is returned and only the table's states may have been
/// interned.
pub fn import(doc: &ExportDocument, interner: Arc<StateInterner>) -> Result<Tree> {
    let mut states: HashMap<StateKey, SharedStateRef> = HashMap::with_capacity(doc.states.len());
    for (key, fields) in &doc.states {
        let raw: RawState = fields.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let state = interner.intern(&raw)?;
        if state.key() != *key {
            return Err(CanopyError::KeyComputationError(format!(
                "table key {key} does not match content key {}",
                state.key()
            )));
        }
        states.insert(*key, state);
    }

    let tree = Tree::new(interner);
    let Some(root_record) = &doc.root else {
        return Ok(tree);
    };

    validate(root_record, &states)?;

    let root = match leaf_state(root_record, &states)? {
        Some(state) => tree.create_leaf(state, root_record.extrinsic.clone())?,
        None => tree.create_container(root_record.extrinsic.clone())?,
    };
    tree.set_root(root)?;

    // Fresh children are appended directly, so no ancestor walk is needed.
    let mut stack: Vec<(NodeId, &NodeRecord)> = vec![(root, root_record)];
    while let Some((parent, record)) = stack.pop() {
        for child in &record.children {
            let extrinsic = child.extrinsic.clone();
            let id = match leaf_state(child, &states)? {
                Some(state) => tree.insert_leaf(parent, state, extrinsic, None)?,
                None => tree.insert_container(parent, extrinsic, None)?,
            };
            stack.push((id, child));
        }
    }

    debug!(nodes = tree.len(), "imported tree");
    Ok(tree)
}

/// Check record-level consistency before building anything.
fn validate(root: &NodeRecord, states: &HashMap<StateKey, SharedStateRef>) -> Result<()> {
    let mut seen = HashSet::new();
    let mut stack = vec![root];

    while let Some(record) = stack.pop() {
        if !seen.insert(record.node_id) {
            return Err(CanopyError::InvalidStructure(format!(
                "duplicate node id {} in document",
                record.node_id
            )));
        }
        match (record.kind, record.state_key) {
            (RecordKind::Leaf, None) => {
                return Err(CanopyError::InvalidStructure(format!(
                    "leaf {} has no state key",
                    record.node_id
                )));
            }
            (RecordKind::Leaf, Some(key)) => {
                if !states.contains_key(&key) {
                    return Err(CanopyError::InvalidStructure(format!(
                        "leaf {} references unknown state {key}",
                        record.node_id
                    )));
                }
                if !record.children.is_empty() {
                    return Err(CanopyError::InvalidStructure(format!(
                        "leaf {} has children",
                        record.node_id
                    )));
                }
            }
            (RecordKind::Container, Some(_)) => {
                return Err(CanopyError::InvalidStructure(format!(
                    "container {} carries a state key",
                    record.node_id
                )));
            }
            (RecordKind::Container, None) => {}
        }
        stack.extend(record.children.iter());
    }

    Ok(())
}

fn leaf_state(
    record: &NodeRecord,
    states: &HashMap<StateKey, SharedStateRef>,
) -> Result<Option<SharedStateRef>> {
    record
        .state_key
        .map(|key| {
            states
                .get(&key)
                .cloned()
                .ok_or_else(|| CanopyError::InvalidStructure(format!("unknown state {key}")))
        })
        .transpose()
}
