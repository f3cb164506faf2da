//! License lifecycle and device admission.
//!
//! This crate handles:
//! - Minting and validating license keys
//! - Per-tier entitlement defaults
//! - Creating, extending, revoking and querying licenses
//! - Binding devices to licenses under a device quota, and the device
//!   blacklist
//! - Hardware fingerprinting for client machines
//!
//! # Design Principles
//!
//! - **One source of truth**: every change goes through [`gl_store::LicenseStore`],
//!   which persists the whole document atomically
//! - **Per-license serialization**: operations on the same key never
//!   interleave; different keys proceed in parallel
//! - **Injected time and randomness**: the store's [`gl_types::Clock`] and a
//!   [`SegmentSource`] make behavior reproducible in tests
//!
//! # License Key Format
//!
//! Keys are formatted as `GL-<TIER>-<YEAR>-<SEG1>-<SEG2>-<CHK4>`, for
//! example `GL-PRO-2025-KQXM-BTRA-A016`. See [`validate_key`].

mod admission;
mod catalog;
mod config;
mod device;
mod error;
mod key;
mod lifecycle;

pub use admission::{ActivationOutcome, BindingStatus, DeviceAdmission};
pub use catalog::{entitlements, entitlements_for_token, EntitlementDefaults};
pub use config::EngineConfig;
pub use device::{DeviceFingerprint, DeviceInfo};
pub use error::{LicenseError, LicenseResult};
pub use key::{
    key_checksum, mint_key, mint_random_key, validate_key, DecodedKey, RandomSegments,
    ScriptedSegments, SegmentSource, CHECKSUM_LEN, KEY_PREFIX, SEGMENT_LEN,
};
pub use lifecycle::{CreateLicense, LicenseLifecycle, LicenseLookup};
