//! Error types for Canopy Core.

use thiserror::Error;

/// Result type alias for Canopy operations.
pub type Result<T> = std::result::Result<T, CanopyError>;

/// Errors that can occur in Canopy operations.
#[derive(Error, Debug)]
pub enum CanopyError {
    /// Unknown node id referenced.
    #[error("node not found: {0}")]
    NotFound(u64),

    /// Mutation would break the tree shape (cycle, second owner, bad position).
    #[error("invalid structure: {0}")]
    InvalidStructure(String),

    /// Detach requested on a node without a parent.
    #[error("node has no parent: {0}")]
    NoParent(u64),

    /// Lock acquisition timed out.
    #[error("concurrency error: {0}")]
    ConcurrencyError(String),

    /// Malformed input to state-key derivation.
    #[error("key computation error: {0}")]
    KeyComputationError(String),

    /// I/O error.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl CanopyError {
    /// Whether the caller may retry the failed call unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CanopyError::ConcurrencyError(_))
    }
}
