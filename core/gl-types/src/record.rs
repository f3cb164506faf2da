//! Persisted license, revocation and blacklist records.
//!
//! Field names follow the JSON document layout that the license database has
//! always used (`expiry_date`, `device_bindings`, `usage_statistics`, ...),
//! so existing databases load without migration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::clock::days_between;
use crate::{DeviceId, Feature, LicenseKey, LicenseTier};

/// Lifecycle status of a license.
///
/// Stored records always carry `Active`; `Expired` is derived from the
/// expiry date and `Revoked` from the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Expired,
    Revoked,
}

impl std::fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        })
    }
}

/// Who a license was issued to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerInfo {
    pub name: String,
    pub email: String,
    pub registration_date: DateTime<Utc>,
}

/// Status of a single device binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingState {
    Active,
}

/// A device bound to a license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBinding {
    pub status: BindingState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    pub first_activation: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl DeviceBinding {
    /// A fresh binding first seen at `now`.
    #[must_use]
    pub fn new(device_name: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            status: BindingState::Active,
            device_name,
            first_activation: now,
            last_seen: now,
        }
    }
}

/// Usage counters kept per license.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStatistics {
    pub total_activations: u64,
    pub total_launches: u64,
    pub last_launch: Option<DateTime<Utc>>,
    #[serde(default)]
    pub features_used: Vec<Feature>,
}

/// An active (not revoked) license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    pub license_key: LicenseKey,
    pub status: LicenseStatus,
    #[serde(rename = "created_date")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "expiry_date")]
    pub expiry_at: DateTime<Utc>,
    /// Snapshot taken at the last write. Use [`LicenseRecord::days_remaining`]
    /// for the live value.
    #[serde(rename = "days_remaining")]
    pub days_remaining_snapshot: i64,
    pub max_devices: u32,
    pub current_devices: u32,
    pub owner_info: OwnerInfo,
    #[serde(default)]
    pub device_bindings: BTreeMap<DeviceId, DeviceBinding>,
    #[serde(default)]
    pub usage_statistics: UsageStatistics,
    #[serde(rename = "license_type")]
    pub tier: LicenseTier,
    #[serde(rename = "features_enabled")]
    pub features: Vec<Feature>,
}

impl LicenseRecord {
    /// Returns true once `now` is strictly past the expiry date.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry_at
    }

    /// Whole days until expiry, floored. Negative once expired.
    #[must_use]
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        days_between(now, self.expiry_at)
    }

    /// Status as seen at `now`.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> LicenseStatus {
        if self.is_expired(now) {
            LicenseStatus::Expired
        } else {
            LicenseStatus::Active
        }
    }

    /// Returns true if the device is currently bound.
    #[must_use]
    pub fn is_bound(&self, device: &DeviceId) -> bool {
        self.device_bindings.contains_key(device)
    }

    /// The bound device identifiers, in sorted order.
    pub fn bound_devices(&self) -> impl Iterator<Item = &DeviceId> {
        self.device_bindings.keys()
    }

    /// Number of bound devices.
    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.device_bindings.len()
    }

    /// Returns true if every quota slot is taken.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.bound_count() >= self.max_devices as usize
    }

    /// Returns true if the license grants `feature`.
    #[must_use]
    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    /// Recomputes the stored convenience fields (`current_devices`,
    /// `days_remaining`) from the authoritative ones.
    pub fn refresh_derived(&mut self, now: DateTime<Utc>) {
        self.current_devices = u32::try_from(self.device_bindings.len()).unwrap_or(u32::MAX);
        self.days_remaining_snapshot = self.days_remaining(now);
    }
}

/// Archive entry for a revoked license. Written once, never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRecord {
    pub license_key: LicenseKey,
    #[serde(rename = "revoked_date")]
    pub revoked_at: DateTime<Utc>,
    #[serde(rename = "revoke_reason")]
    pub reason: String,
    pub original_expiry: DateTime<Utc>,
}

/// A device barred from new bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub device_id: DeviceId,
    #[serde(rename = "blacklist_date")]
    pub blacklisted_at: DateTime<Utc>,
    pub reason: String,
    pub permanent: bool,
}
