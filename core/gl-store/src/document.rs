//! The persisted license document.
//!
//! One JSON document holds every license, the revocation archive and the
//! device blacklist:
//!
//! ```text
//! {
//!   "system_info":         { version, created, last_updated, total_licenses, ... },
//!   "license_keys":        { key -> LicenseRecord },
//!   "revoked_licenses":    { key -> RevocationRecord },
//!   "blacklisted_devices": { device_id -> BlacklistEntry }
//! }
//! ```

use chrono::{DateTime, Utc};
use gl_types::{BlacklistEntry, DeviceId, LicenseKey, LicenseRecord, RevocationRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema version written into new documents.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Summary counters stored alongside the maps.
///
/// These are always recomputed from the maps before a save; they exist in
/// the document for readers that do not want to walk it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub version: String,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub total_licenses: u64,
    pub active_licenses: u64,
    #[serde(default)]
    pub expired_licenses: u64,
}

/// Aggregate counts derived from the document at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    /// Licenses ever issued that are still on record (active + revoked).
    pub total: u64,
    /// Licenses in the active map, expired or not.
    pub active: u64,
    /// Active-map licenses whose expiry has passed.
    pub expired: u64,
    /// Licenses in the revocation archive.
    pub revoked: u64,
    /// Devices on the blacklist.
    pub blacklisted: u64,
}

/// The full persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseDocument {
    pub system_info: SystemInfo,
    #[serde(default)]
    pub license_keys: BTreeMap<LicenseKey, LicenseRecord>,
    #[serde(default)]
    pub revoked_licenses: BTreeMap<LicenseKey, RevocationRecord>,
    #[serde(default)]
    pub blacklisted_devices: BTreeMap<DeviceId, BlacklistEntry>,
}

impl LicenseDocument {
    /// An empty document created at `now`.
    #[must_use]
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            system_info: SystemInfo {
                version: SCHEMA_VERSION.to_string(),
                created: now,
                last_updated: now,
                total_licenses: 0,
                active_licenses: 0,
                expired_licenses: 0,
            },
            license_keys: BTreeMap::new(),
            revoked_licenses: BTreeMap::new(),
            blacklisted_devices: BTreeMap::new(),
        }
    }

    /// Counts derived from the maps.
    #[must_use]
    pub fn counts(&self, now: DateTime<Utc>) -> StoreCounts {
        let active = self.license_keys.len() as u64;
        let revoked = self.revoked_licenses.len() as u64;
        StoreCounts {
            total: active + revoked,
            active,
            expired: self
                .license_keys
                .values()
                .filter(|record| record.is_expired(now))
                .count() as u64,
            revoked,
            blacklisted: self.blacklisted_devices.len() as u64,
        }
    }

    /// Rewrites `system_info` counters from the maps.
    ///
    /// Returns true if the stored counters disagreed with the maps.
    pub fn recount(&mut self, now: DateTime<Utc>) -> bool {
        let counts = self.counts(now);
        let info = &mut self.system_info;
        let drifted = info.total_licenses != counts.total
            || info.active_licenses != counts.active
            || info.expired_licenses != counts.expired;
        info.total_licenses = counts.total;
        info.active_licenses = counts.active;
        info.expired_licenses = counts.expired;
        drifted
    }

    /// Returns true if the key is present in either the active map or the archive.
    #[must_use]
    pub fn contains(&self, key: &LicenseKey) -> bool {
        self.license_keys.contains_key(key) || self.revoked_licenses.contains_key(key)
    }

    /// Checks the structural invariants of a loaded document.
    ///
    /// Keys present in both maps and records over quota are reported; bound
    /// blacklisted devices are not, since blacklisting never unbinds.
    pub fn integrity_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        for key in self.license_keys.keys() {
            if self.revoked_licenses.contains_key(key) {
                violations.push(format!("{key} is both active and revoked"));
            }
        }
        for (key, record) in &self.license_keys {
            if &record.license_key != key {
                violations.push(format!("{key} is stored under a different record key"));
            }
            if record.max_devices == 0 {
                violations.push(format!("{key} has a zero device quota"));
            }
            if record.bound_count() > record.max_devices as usize {
                violations.push(format!(
                    "{key} binds {} devices over a quota of {}",
                    record.bound_count(),
                    record.max_devices
                ));
            }
        }
        violations
    }
}
