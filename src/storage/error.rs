//! Storage Driver Error Types

use thiserror::Error;

/// Storage driver errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Graph already present in the store
    #[error("graph already exists: {0}")]
    GraphExists(String),

    /// Graph not present in the store
    #[error("graph not found: {0}")]
    GraphMissing(String),

    /// Latest-anchor resolution combined with an explicit filter
    #[error("conflicting lookup: {0}")]
    ConflictingLookup(String),

    /// The cancellation signal fired, or the sink's consumer went away
    #[error("operation cancelled")]
    Cancelled,

    /// A producer thread died without reporting a result
    #[error("internal storage failure: {0}")]
    Internal(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
