//! # Canopy
//!
//! Composite trees whose leaves share deduplicated, immutable state.
//!
//! Canopy keeps one instance per distinct state content, no matter how many
//! leaves use it:
//! - **Interning**: equal content always yields the identical shared instance
//! - **Ownership**: every node has at most one parent and cycles are rejected
//! - **Snapshots**: traversals see a frozen view and never block writers
//! - **Portability**: export/import keeps structure and dedup intact
//!
//! ## Quick Start
//!
//! ```rust
//! use canopy::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let canopy = Canopy::builder()
//!         .retention(RetentionPolicy::EvictUnreferenced)
//!         .build();
//!
//!     let tree = canopy.new_tree();
//!     let root = tree.create_container(Extrinsic::new())?;
//!     tree.set_root(root)?;
//!
//!     let bold = canopy.intern(&RawState::tag("bold"))?;
//!     for x in 0..3 {
//!         tree.insert_leaf(root, bold.clone(), Extrinsic::new().with("x", x), None)?;
//!     }
//!
//!     let metrics = canopy.metrics(&tree);
//!     assert_eq!(metrics.node_count, 4);
//!     assert_eq!(metrics.distinct_states, 1);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// Re-export core crate
pub use canopy_core::*;

mod canopy;

pub use crate::canopy::{Canopy, CanopyBuilder, CanopyConfig, InternerStats};

/// Commonly used types.
pub mod prelude {
    pub use crate::canopy::{Canopy, CanopyBuilder, CanopyConfig, InternerStats};
    pub use canopy_core::{
        error::{CanopyError, Result},
        export::{export, import, ExportDocument, NodeRecord},
        intern::{RawState, RetentionPolicy, SharedStateRef, StateInterner, StateKey},
        metrics::{MetricsView, TreeMetrics, EMPTY_DEPTH},
        traverse::{traverse, Order, Traversal},
        tree::{Extrinsic, Node, NodeId, NodeKind, Tree, TreeConfig, TreeSnapshot},
    };

    // Re-export useful external types
    pub use anyhow;
    pub use tracing;
}
