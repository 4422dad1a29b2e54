//! Canonical pool of shared states.

use super::key::{RawState, SharedState, SharedStateRef, StateKey};
use crate::error::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// What happens to a state once no node refers to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Keep every state until the interner is dropped.
    #[default]
    RetainForever,
    /// Evict states released by subtree removal once unreferenced.
    EvictUnreferenced,
}

/// Interner configuration.
#[derive(Debug, Clone, Default)]
pub struct InternerConfig {
    /// Retention policy for unreferenced states.
    pub retention: RetentionPolicy,
}

/// Deduplicating store of [`SharedState`] values keyed by [`StateKey`].
#[derive(Debug, Default)]
pub struct StateInterner {
    states: RwLock<HashMap<StateKey, SharedStateRef>>,
    constructions: AtomicU64,
    config: InternerConfig,
}

impl StateInterner {
    /// Create an interner that retains every state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an interner with the given configuration.
    pub fn with_config(config: InternerConfig) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            constructions: AtomicU64::new(0),
            config,
        }
    }

    /// Get the interner configuration.
    pub fn config(&self) -> &InternerConfig {
        &self.config
    }

    /// Return the canonical state for `raw`, constructing it on first use.
    ///
    /// Concurrent calls with equal content construct at most one instance;
    /// every caller receives a handle to it.
    pub fn intern(&self, raw: &RawState) -> Result<SharedStateRef> {
        let fields = raw.normalize()?;
        let key = StateKey::from_fields(&fields);

        if let Some(existing) = self.states.read().get(&key) {
            return Ok(existing.clone());
        }

        // Re-checked under the write lock: a racing writer may have won.
        let mut states = self.states.write();
        let state = states
            .entry(key)
            .or_insert_with(|| {
                self.constructions.fetch_add(1, Ordering::Relaxed);
                trace!(%key, "constructed shared state");
                SharedStateRef::new(SharedState::new(key, fields))
            })
            .clone();

        Ok(state)
    }

    /// Look up a state without constructing it.
    pub fn get(&self, key: &StateKey) -> Option<SharedStateRef> {
        self.states.read().get(key).cloned()
    }

    /// Check whether a key is stored.
    pub fn contains(&self, key: &StateKey) -> bool {
        self.states.read().contains_key(key)
    }

    /// Whether `state` is the instance this interner stores for its key.
    pub fn issued(&self, state: &SharedStateRef) -> bool {
        self.states
            .read()
            .get(&state.key())
            .is_some_and(|stored| stored.ptr_eq(state))
    }

    /// Number of distinct stored states.
    pub fn size(&self) -> usize {
        self.states.read().len()
    }

    /// Check if no state is stored.
    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }

    /// Total number of states ever constructed.
    pub fn constructions(&self) -> u64 {
        self.constructions.load(Ordering::Relaxed)
    }

    /// All stored keys in ascending order.
    pub fn keys(&self) -> Vec<StateKey> {
        let mut keys: Vec<_> = self.states.read().keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Remove `key` if no handle outside the interner is alive.
    ///
    /// Returns `false` without side effects when the key is absent or
    /// still referenced.
    pub fn evict(&self, key: &StateKey) -> bool {
        let mut states = self.states.write();
        match states.get(key) {
            Some(state) if state.handle_count() == 1 => {
                states.remove(key);
                debug!(%key, "evicted shared state");
                true
            }
            _ => false,
        }
    }

    /// Evict every unreferenced state, returning how many were removed.
    pub fn purge_unreferenced(&self) -> usize {
        let mut states = self.states.write();
        let before = states.len();
        states.retain(|_, state| state.handle_count() > 1);
        let purged = before - states.len();
        if purged > 0 {
            debug!(purged, "purged unreferenced shared states");
        }
        purged
    }

    /// Apply the retention policy to keys whose handles were just released.
    pub(crate) fn release<I>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = StateKey>,
    {
        match self.config.retention {
            RetentionPolicy::RetainForever => 0,
            RetentionPolicy::EvictUnreferenced => {
                keys.into_iter().filter(|key| self.evict(key)).count()
            }
        }
    }
}
