//! Error types for the store.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No active record under this key.
    #[error("license not found: {0}")]
    NotFound(String),

    /// The key is already present in the active map or the archive.
    #[error("duplicate license key: {0}")]
    DuplicateKey(String),

    /// A blacklisted device was about to be bound.
    #[error("device is blacklisted: {0}")]
    DeviceBlacklisted(String),

    /// A record would exceed its device quota.
    #[error("device limit exceeded (max {0} devices)")]
    QuotaExceeded(u32),

    /// Permanent blacklist entries cannot be lifted.
    #[error("device is permanently blacklisted: {0}")]
    PermanentBlacklist(String),

    /// A record or document failed an integrity check.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
