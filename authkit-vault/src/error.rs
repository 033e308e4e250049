//! Error types for the credential vault.

use thiserror::Error;

/// Result type for vault operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by the credential vault and its platform backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Writing a blob to the secure store failed.
    #[error("storage write failed: {0}")]
    WriteFailed(String),

    /// Reading a blob from the secure store failed.
    #[error("storage read failed: {0}")]
    ReadFailed(String),

    /// Deleting a blob from the secure store failed.
    #[error("storage delete failed: {0}")]
    DeleteFailed(String),

    /// Sealing or opening a record under the device-bound key failed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// A sealed record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}
