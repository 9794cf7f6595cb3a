//! Storage error types
//!
//! Most cache operations report failures through logging and keep going.
//! These errors are returned only by the operations that do raise: the
//! fallible write behind [`CacheStore::write`](super::CacheStore::write) and
//! CSV export.

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Line-list entry contains a line break: {entry:?}")]
    MultilineEntry { entry: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
