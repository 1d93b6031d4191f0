//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid artifact path: {0}")]
    InvalidPath(String),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("malformed metadata document: {0}")]
    MalformedDocument(String),

    #[error("unsupported checksum algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
