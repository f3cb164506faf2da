//! Error types for the license engine.

use gl_store::StoreError;
use thiserror::Error;

/// License engine errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Wrong field count, wrong prefix, or a malformed year/segment.
    #[error("malformed license key: {0}")]
    MalformedKey(String),

    /// Tier token is not DEMO, BASIC, PRO or ENTERPRISE.
    #[error("unknown license tier: {0}")]
    UnknownTier(String),

    /// The checksum field does not match the key prefix.
    #[error("license key checksum mismatch (expected {expected}, found {found})")]
    ChecksumMismatch { expected: String, found: String },

    /// The key is already active or archived.
    #[error("duplicate license key: {0}")]
    DuplicateKey(String),

    /// Minting kept colliding with existing keys.
    #[error("no free license key after {0} attempts")]
    KeyspaceExhausted(u32),

    /// No license under this key.
    #[error("license not found: {0}")]
    NotFound(String),

    /// Extend or revoke on an archived license.
    #[error("license already revoked: {0}")]
    AlreadyRevoked(String),

    /// Device operation on an archived license.
    #[error("license has been revoked: {0}")]
    Revoked(String),

    /// Device operation on an expired license.
    #[error("license expired on {0}")]
    Expired(String),

    /// The device is on the blacklist.
    #[error("device is blacklisted: {0}")]
    DeviceBlacklisted(String),

    /// Device limit exceeded.
    #[error("device limit exceeded (max {0} devices)")]
    QuotaExceeded(u32),

    /// The license does not grant this feature.
    #[error("feature not enabled for this license: {0}")]
    FeatureNotEnabled(String),

    /// Permanent blacklist entries cannot be lifted.
    #[error("device is permanently blacklisted: {0}")]
    PermanentBlacklist(String),

    /// Rejected request parameters.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The document could not be written. In-memory state may be ahead of
    /// durable storage.
    #[error("IO failure: {0}")]
    IoFailure(#[source] std::io::Error),

    /// Any other store error.
    #[error("storage error: {0}")]
    Storage(#[source] StoreError),
}

impl From<StoreError> for LicenseError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => Self::NotFound(key),
            StoreError::DuplicateKey(key) => Self::DuplicateKey(key),
            StoreError::DeviceBlacklisted(device) => Self::DeviceBlacklisted(device),
            StoreError::QuotaExceeded(max) => Self::QuotaExceeded(max),
            StoreError::PermanentBlacklist(device) => Self::PermanentBlacklist(device),
            StoreError::Io(e) => Self::IoFailure(e),
            other => Self::Storage(other),
        }
    }
}

impl From<gl_types::Error> for LicenseError {
    fn from(err: gl_types::Error) -> Self {
        match err {
            gl_types::Error::UnknownTier(tier) => Self::UnknownTier(tier),
            other => Self::InvalidInput(other.to_string()),
        }
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
