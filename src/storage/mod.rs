//! Storage module for the on-disk document cache
//!
//! This module handles everything persisted between runs:
//! - Sanitized cache locations keyed by entity names
//! - Document shapes (records, markup, line lists) and their encodings
//! - The cache store with ordered prior-version fallback
//! - CSV exports written beside the cache

mod cache;
mod document;
mod error;
mod location;

pub use cache::{CacheStore, ENTITY_DEPTH};
pub use document::{Document, DocumentKind};
pub use error::{StorageError, StorageResult};
pub use location::{sanitize_segment, CacheLocation};
