//! # Canopy Core
//!
//! Hierarchical trees whose leaves share deduplicated, immutable state.
//!
//! This crate provides:
//! - **State interning** keyed by a content digest, one instance per key
//! - **Arena trees** with single ownership, ordered children and no cycles
//! - **Snapshot traversal** in pre, post and level order, never blocking writers
//! - **Metrics** over reachable nodes and distinct shared states
//! - **Export/import** that preserves structure and deduplication

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod export;
pub mod intern;
pub mod metrics;
pub mod traverse;
pub mod tree;

pub use error::{CanopyError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{CanopyError, Result};
    pub use crate::export::{export, import, ExportDocument};
    pub use crate::intern::{RawState, RetentionPolicy, SharedStateRef, StateInterner, StateKey};
    pub use crate::metrics::{MetricsView, TreeMetrics};
    pub use crate::traverse::{traverse, Order, Traversal};
    pub use crate::tree::{Extrinsic, NodeId, NodeKind, Tree, TreeConfig, TreeSnapshot};
}
