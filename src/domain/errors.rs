use thiserror::Error;

/// Domain-level errors shared across application components.
///
/// A refusal is never represented here: "no relevant context" is a normal
/// [`Decision`](crate::domain::Decision), not a failure.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The incoming payload missed a required field or violated invariants.
    #[error("validation error: {0}")]
    Validation(String),

    /// Catch-all for index/storage failures we don't want to leak directly.
    #[error("storage failure: {0}")]
    Storage(String),

    /// Embedder failure or vector incompatibility (e.g., dimension mismatch).
    #[error("embedding failure: {0}")]
    Embedding(String),

    /// Any other unexpected failure.
    #[error("unexpected error: {0}")]
    Other(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
