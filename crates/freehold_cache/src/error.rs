//! Cache error types.
//!
//! Lookups never fail — absence is `None`, and a cold cache answers empty.
//! Errors only come out of the write/refresh entry points, and only when the
//! persistence layer underneath them fails.

use freehold_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by cache write/refresh operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type CacheResult<T> = Result<T, CacheError>;
