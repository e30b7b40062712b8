//! Error types for the Strata configuration management engine.

use crate::types::AssociationId;
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Unsupported store format version: {found} (expected {expected})")]
    UnsupportedVersion { expected: u32, found: u32 },

    #[error("Corrupt store record: {0}")]
    CorruptRecord(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors surfaced by repository operations.
///
/// `InvariantViolation`, `InconsistentTree` and `UnsupportedOperation` are
/// programming faults: the operation that raised them left the repository
/// untouched. The remaining variants are caller errors.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Inconsistent artifact tree: {0}")]
    InconsistentTree(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Association not found: {0}")]
    UnknownAssociation(AssociationId),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unresolved dependencies: {0}")]
    UnresolvedDependencies(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::IoError(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("sled: {}", err),
        ))
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("bincode: {}", err),
        ))
    }
}
