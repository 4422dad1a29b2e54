//! High-level entry point.

use anyhow::{Context, Result};
use canopy_core::{
    export::{self, ExportDocument},
    intern::{InternerConfig, RawState, RetentionPolicy, SharedStateRef, StateInterner},
    metrics::{MetricsView, TreeMetrics},
    tree::{Tree, TreeConfig},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Configuration shared by every tree of a [`Canopy`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanopyConfig {
    /// What happens to states no node refers to any more.
    pub retention: RetentionPolicy,
    /// Write-lock timeout for tree mutations, in milliseconds.
    pub lock_timeout_ms: Option<u64>,
}

impl CanopyConfig {
    /// Load from JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    fn interner_config(&self) -> InternerConfig {
        InternerConfig {
            retention: self.retention,
        }
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            lock_timeout: self.lock_timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Builder for creating a [`Canopy`].
#[derive(Debug, Default)]
pub struct CanopyBuilder {
    config: CanopyConfig,
}

impl CanopyBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retention policy.
    pub fn retention(mut self, retention: RetentionPolicy) -> Self {
        self.config.retention = retention;
        self
    }

    /// Bound how long mutations wait for the tree lock.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: CanopyConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the canopy.
    pub fn build(self) -> Canopy {
        let interner = Arc::new(StateInterner::with_config(self.config.interner_config()));
        info!(retention = ?self.config.retention, "canopy ready");
        Canopy {
            config: self.config,
            interner,
        }
    }
}

/// One interner plus the trees drawing from it.
///
/// Every tree created, imported or loaded here shares the same interner, so
/// equal states are one instance across all of them.
#[derive(Debug, Clone)]
pub struct Canopy {
    config: CanopyConfig,
    interner: Arc<StateInterner>,
}

/// Interner statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InternerStats {
    /// States currently held.
    pub states: usize,
    /// States constructed over the interner's lifetime.
    pub constructions: u64,
}

impl Canopy {
    /// Create a new builder.
    pub fn builder() -> CanopyBuilder {
        CanopyBuilder::new()
    }

    /// Create with default configuration.
    pub fn new() -> Self {
        CanopyBuilder::new().build()
    }

    /// Create from a JSON configuration file.
    pub fn from_config_file(path: &Path) -> Result<Self> {
        Ok(CanopyBuilder::new().config(CanopyConfig::from_file(path)?).build())
    }

    /// Get configuration.
    pub fn config(&self) -> &CanopyConfig {
        &self.config
    }

    /// Get the shared interner.
    pub fn interner(&self) -> &Arc<StateInterner> {
        &self.interner
    }

    /// Intern a state.
    pub fn intern(&self, raw: &RawState) -> Result<SharedStateRef> {
        Ok(self.interner.intern(raw)?)
    }

    /// Create an empty tree.
    pub fn new_tree(&self) -> Tree {
        Tree::with_config(self.interner.clone(), self.config.tree_config())
    }

    /// Export a tree.
    pub fn export(&self, tree: &Tree) -> Result<ExportDocument> {
        Ok(export::export(tree)?)
    }

    /// Rebuild a tree from an exported document.
    pub fn import(&self, doc: &ExportDocument) -> Result<Tree> {
        let tree = export::import(doc, self.interner.clone())?;
        Ok(self.reconfigure(tree))
    }

    /// Export a tree to a JSON file.
    pub fn save(&self, tree: &Tree, path: &Path) -> Result<()> {
        self.export(tree)?
            .save(path)
            .with_context(|| format!("saving tree to {}", path.display()))
    }

    /// Import a tree from a JSON file.
    pub fn load(&self, path: &Path) -> Result<Tree> {
        let doc = ExportDocument::load(path)
            .with_context(|| format!("loading tree from {}", path.display()))?;
        self.import(&doc)
    }

    /// Aggregate metrics of a tree.
    pub fn metrics(&self, tree: &Tree) -> TreeMetrics {
        MetricsView::new(tree).summary()
    }

    /// Get interner statistics.
    pub fn stats(&self) -> InternerStats {
        InternerStats {
            states: self.interner.size(),
            constructions: self.interner.constructions(),
        }
    }

    /// Evict every state no node refers to, whatever the retention policy.
    pub fn purge_unreferenced(&self) -> usize {
        self.interner.purge_unreferenced()
    }

    /// Apply this canopy's tree configuration to an imported tree.
    fn reconfigure(&self, tree: Tree) -> Tree {
        if self.config.lock_timeout_ms.is_none() {
            return tree;
        }
        tree.into_config(self.config.tree_config())
    }
}

impl Default for Canopy {
    fn default() -> Self {
        Self::new()
    }
}
