//! Failure taxonomy for the persistence engine.
//!
//! Storage is an unreliable external medium: APIs can be missing entirely
//! (server-side rendering, disabled storage), present but refusing (quota,
//! oversized cookies), or holding strings that no longer parse. Each of those
//! is a typed outcome here, never a panic through the public surface.

use thiserror::Error;

/// Failure reported by a storage area operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The medium is missing at the API level (no browser window, storage
    /// getter throws). Callers degrade to in-memory-only behavior and do not
    /// report this through error hooks.
    #[error("storage area unavailable: {0}")]
    Unavailable(String),

    /// The medium exists but refused the operation: quota exceeded, an
    /// oversized cookie assignment, or a write blocked by the platform.
    #[error("storage write rejected: {0}")]
    Rejected(String),
}

impl StorageError {
    /// True for the silent-degrade variant.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

/// Parse or stringify failure from a [`Serializer`](crate::serializer::Serializer).
///
/// Serializers differ wildly in their native error types, so the engine keeps
/// an opaque message. The raw string that failed to parse travels alongside
/// the error into the parse hook, not inside it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("codec error: {message}")]
pub struct CodecError {
    message: String,
}

impl CodecError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Everything that can go wrong while pushing a value into the medium.
///
/// Routed to the write-error hook; the in-memory value keeps its optimistic
/// update either way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    /// The value could not be rendered into a storable string.
    #[error("serialize failed: {0}")]
    Serialize(#[from] CodecError),

    /// The medium refused the raw string.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
