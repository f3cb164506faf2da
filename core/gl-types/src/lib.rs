//! Core type definitions for the GL license engine.
//!
//! This crate defines the plain data shared by the store and the lifecycle
//! engine:
//! - License keys and device identifiers
//! - Tiers and features
//! - Persisted license, revocation and blacklist records
//! - The injectable [`Clock`]
//!
//! Key format rules, entitlement defaults and state transitions live in
//! `gl-license`; persistence lives in `gl-store`.

mod clock;
mod ids;
mod record;
mod tier;

pub use clock::{days_between, Clock, ManualClock, SystemClock, SECS_PER_DAY};
pub use ids::{DeviceId, LicenseKey};
pub use record::{
    BindingState, BlacklistEntry, DeviceBinding, LicenseRecord, LicenseStatus, OwnerInfo,
    RevocationRecord, UsageStatistics,
};
pub use tier::{Feature, LicenseTier};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when parsing core types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown license tier: {0}")]
    UnknownTier(String),

    #[error("unknown feature: {0}")]
    UnknownFeature(String),

    #[error("invalid device id: {0:?}")]
    InvalidDeviceId(String),
}
