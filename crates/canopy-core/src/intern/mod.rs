//! Deduplicated intrinsic state.
//!
//! This module provides:
//! - [`RawState`], the caller-supplied content of a state
//! - [`StateKey`], a deterministic content digest over normalized fields
//! - [`StateInterner`], the canonical pool that hands out one
//!   [`SharedStateRef`] per key
//!
//! # Identity
//!
//! Two raw states with the same normalized fields derive the same key, and
//! interning either returns the same stored instance. Construction happens
//! inside the interner's write lock, so concurrent first requests for a key
//! still construct exactly once.
//!
//! # Retention
//!
//! By default states are retained until the interner is dropped. With
//! [`RetentionPolicy::EvictUnreferenced`], states released by subtree removal
//! are evicted once no handle outside the interner remains.
//!
//! # Example
//!
//! ```rust
//! use canopy_core::intern::{RawState, StateInterner};
//!
//! let interner = StateInterner::new();
//!
//! let bold = interner.intern(&RawState::tag("bold")).unwrap();
//! let italic = interner.intern(&RawState::tag("italic")).unwrap();
//! let bold_again = interner.intern(&RawState::tag("bold")).unwrap();
//!
//! assert_eq!(interner.size(), 2);
//! assert!(bold.ptr_eq(&bold_again));
//! assert!(!bold.ptr_eq(&italic));
//! ```

mod interner;
mod key;

pub use interner::{InternerConfig, RetentionPolicy, StateInterner};
pub use key::{RawState, SharedState, SharedStateRef, StateKey, KEY_LEN};

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn arb_raw_state() -> impl Strategy<Value = RawState> {
        prop::collection::btree_map("[a-c]{1,2}", "[x-z]{0,2}", 0..4)
            .prop_map(|fields| fields.into_iter().collect())
    }

    proptest! {
        /// Invariant: equal keys intern to identical instances.
        #[test]
        fn invariant_equal_key_identical_ref(
            states in prop::collection::vec(arb_raw_state(), 1..40),
        ) {
            let interner = StateInterner::new();
            let refs: Vec<_> = states
                .iter()
                .map(|raw| interner.intern(raw).unwrap())
                .collect();

            for a in &refs {
                for b in &refs {
                    prop_assert_eq!(a.key() == b.key(), a.ptr_eq(b));
                }
            }
        }

        /// Invariant: pool size equals distinct keys ever interned.
        #[test]
        fn invariant_size_matches_distinct_keys(
            states in prop::collection::vec(arb_raw_state(), 0..40),
        ) {
            let interner = StateInterner::new();
            let mut keys = HashSet::new();
            for raw in &states {
                keys.insert(interner.intern(raw).unwrap().key());
            }

            prop_assert_eq!(interner.size(), keys.len());
            prop_assert_eq!(interner.constructions(), keys.len() as u64);
        }

        /// Invariant: key derivation ignores field order.
        #[test]
        fn invariant_key_order_independent(raw in arb_raw_state()) {
            let mut reversed: Vec<_> = raw.fields().to_vec();
            reversed.reverse();
            let reversed: RawState = reversed.into_iter().collect();

            prop_assert_eq!(
                StateKey::derive(&raw).unwrap(),
                StateKey::derive(&reversed).unwrap()
            );
        }
    }
}
