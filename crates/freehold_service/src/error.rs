//! Service construction and refresh errors.

use std::{io::Error as IoError, path::PathBuf};

use thiserror::Error;

use freehold_cache::CacheError;
use freehold_storage::StorageError;

/// Errors surfaced while opening or refreshing a [`crate::FreeholdService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Failed to read config file {0}: {1}")]
    ConfigRead(PathBuf, IoError),

    #[error("Failed to parse config file {0}: {1}")]
    ConfigParse(PathBuf, toml::de::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
