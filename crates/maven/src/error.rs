//! Error types for the repository engines.

use depot_storage::StorageError;
use thiserror::Error;

/// Errors raised by checksum, metadata, publish and proxy operations.
#[derive(Debug, Error)]
pub enum MavenError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("request body failed: {0}")]
    Transfer(String),

    #[error("upload exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Core(#[from] depot_core::Error),
}

impl MavenError {
    /// Whether the error means the requested object does not exist, locally or upstream.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Storage(StorageError::NotFound(_))
        )
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, MavenError>;
