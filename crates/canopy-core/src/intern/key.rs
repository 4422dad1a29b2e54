//! Raw state content, state keys and shared state values.

use crate::error::{CanopyError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

/// Domain separator mixed into every key digest.
const KEY_DOMAIN: &[u8] = b"canopy.state.v1";

/// Length of a state key digest in bytes.
pub const KEY_LEN: usize = 32;

/// Caller-supplied content for a shared state.
///
/// Field order is irrelevant: two raw states with the same set of
/// `(field, value)` pairs derive the same [`StateKey`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawState {
    fields: Vec<(String, String)>,
}

impl RawState {
    /// Create an empty raw state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a raw state with a single `tag` field.
    pub fn tag(value: impl Into<String>) -> Self {
        Self::new().field("tag", value)
    }

    /// Add a field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Fields in the order they were given.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Sort fields by name and reject malformed content.
    pub(crate) fn normalize(&self) -> Result<BTreeMap<String, String>> {
        let mut normalized = BTreeMap::new();

        for (name, value) in &self.fields {
            if name.is_empty() {
                return Err(CanopyError::KeyComputationError(
                    "empty field name".into(),
                ));
            }
            match normalized.get(name) {
                Some(existing) if existing != value => {
                    return Err(CanopyError::KeyComputationError(format!(
                        "field {name:?} given conflicting values {existing:?} and {value:?}"
                    )));
                }
                Some(_) => {}
                None => {
                    normalized.insert(name.clone(), value.clone());
                }
            }
        }

        Ok(normalized)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawState {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Deterministic digest of a state's normalized fields.
///
/// Keys are totally ordered, render as lowercase hex and serialize as hex
/// strings.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateKey([u8; KEY_LEN]);

impl StateKey {
    /// Derive the key for raw content.
    pub fn derive(raw: &RawState) -> Result<Self> {
        Ok(Self::from_fields(&raw.normalize()?))
    }

    /// Digest already-normalized fields.
    ///
    /// Each name and value is length-prefixed so that no two distinct field
    /// sets share an encoding.
    pub(crate) fn from_fields(fields: &BTreeMap<String, String>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(KEY_DOMAIN);
        for (name, value) in fields {
            hasher.update(&(name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            hasher.update(&(value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        }
        StateKey(*hasher.finalize().as_bytes())
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateKey({})", &self.to_hex()[..12])
    }
}

impl FromStr for StateKey {
    type Err = CanopyError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| CanopyError::KeyComputationError(format!("bad key {s:?}: {e}")))?;
        let digest: [u8; KEY_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
            CanopyError::KeyComputationError(format!(
                "key must be {KEY_LEN} bytes, got {}",
                b.len()
            ))
        })?;
        Ok(StateKey(digest))
    }
}

impl Serialize for StateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for StateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Immutable intrinsic state shared by many nodes.
#[derive(Debug, PartialEq, Eq)]
pub struct SharedState {
    key: StateKey,
    fields: BTreeMap<String, String>,
}

impl SharedState {
    pub(crate) fn new(key: StateKey, fields: BTreeMap<String, String>) -> Self {
        Self { key, fields }
    }

    /// Content key.
    pub fn key(&self) -> StateKey {
        self.key
    }

    /// Normalized fields, sorted by name.
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Look up one field.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Rebuild raw content that derives this state's key.
    pub fn to_raw(&self) -> RawState {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }
}

/// Interner-issued handle to a [`SharedState`].
///
/// Equality is identity: two handles are equal only if they point at the
/// same stored instance. Compare with [`SharedStateRef::ptr_eq`]; the raw
/// address is not exposed.
///
/// ```compile_fail
/// use canopy_core::intern::{RawState, StateInterner};
///
/// let interner = StateInterner::new();
/// let bold = interner.intern(&RawState::tag("bold")).unwrap();
/// let _addr = bold.as_ptr();
/// ```
#[derive(Clone)]
pub struct SharedStateRef(Arc<SharedState>);

impl SharedStateRef {
    pub(crate) fn new(state: SharedState) -> Self {
        Self(Arc::new(state))
    }

    /// Whether both handles point at the same instance.
    pub fn ptr_eq(&self, other: &SharedStateRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the shared instance, usable as an identity token.
    pub(crate) fn as_ptr(&self) -> *const SharedState {
        Arc::as_ptr(&self.0)
    }

    /// Number of live handles, including the interner's own.
    pub(crate) fn handle_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl Deref for SharedStateRef {
    type Target = SharedState;

    fn deref(&self) -> &SharedState {
        &self.0
    }
}

impl PartialEq for SharedStateRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for SharedStateRef {}

impl fmt::Debug for SharedStateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedStateRef")
            .field("key", &self.0.key)
            .field("fields", &self.0.fields)
            .finish()
    }
}
