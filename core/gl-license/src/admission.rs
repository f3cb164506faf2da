//! Device admission: binding devices to licenses and the device blacklist.
//!
//! Every binding change goes through [`LicenseStore::mutate_active`], so the
//! checks and the write happen under the license's key lock.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use gl_store::LicenseStore;
use gl_types::{BlacklistEntry, Clock, DeviceBinding, DeviceId, Feature, LicenseKey, LicenseRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{LicenseError, LicenseResult};

/// Result of a successful activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationOutcome {
    /// The record after activation.
    pub record: LicenseRecord,
    /// False if the device was already bound.
    pub newly_bound: bool,
}

/// What would happen if a device tried to activate now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingStatus {
    /// The device is already bound.
    Authorized,
    /// A free slot is available.
    CanActivate,
    /// Every slot is taken by other devices.
    DeviceLimitExceeded,
    /// The device is blacklisted.
    Blacklisted,
}

/// Decides whether devices may bind to licenses.
#[derive(Clone)]
pub struct DeviceAdmission {
    store: Arc<LicenseStore>,
    clock: Arc<dyn Clock>,
}

impl DeviceAdmission {
    /// Admission control over `store`, using the store's clock.
    #[must_use]
    pub fn new(store: Arc<LicenseStore>) -> Self {
        let clock = Arc::clone(store.clock());
        Self { store, clock }
    }

    /// Binds `device` to the license, or refreshes an existing binding.
    ///
    /// Re-activating a bound device always succeeds (unless the license has
    /// expired or the device was blacklisted since) and does not use up
    /// another slot. Every successful call counts as a launch.
    pub fn activate(
        &self,
        key: &LicenseKey,
        device: &DeviceId,
        device_name: Option<&str>,
    ) -> LicenseResult<ActivationOutcome> {
        self.ensure_not_revoked(key)?;
        let now = self.clock.now();

        let result = self.store.mutate_active(key, |record| {
            ensure_not_expired(record, now)?;
            if self.store.is_blacklisted(device) {
                return Err(LicenseError::DeviceBlacklisted(device.to_string()));
            }

            let newly_bound = match record.device_bindings.get_mut(device) {
                Some(binding) => {
                    binding.last_seen = now;
                    if let Some(name) = device_name {
                        binding.device_name = Some(name.to_string());
                    }
                    false
                }
                None => {
                    if record.is_full() {
                        return Err(LicenseError::QuotaExceeded(record.max_devices));
                    }
                    record.device_bindings.insert(
                        device.clone(),
                        DeviceBinding::new(device_name.map(str::to_string), now),
                    );
                    record.usage_statistics.total_activations += 1;
                    true
                }
            };

            record.usage_statistics.total_launches += 1;
            record.usage_statistics.last_launch = Some(now);
            Ok(newly_bound)
        });

        match result {
            Ok((record, newly_bound)) => {
                if newly_bound {
                    info!(
                        license_key = %key,
                        device_id = %device,
                        devices = record.bound_count(),
                        max_devices = record.max_devices,
                        "Device activated"
                    );
                } else {
                    debug!(license_key = %key, device_id = %device, "Device re-activated");
                }
                Ok(ActivationOutcome { record, newly_bound })
            }
            Err(e) => {
                let e = self.revoked_if_archived(key, e);
                warn!(license_key = %key, device_id = %device, error = %e, "Activation refused");
                Err(e)
            }
        }
    }

    /// Reports whether `device` could activate right now, without changing
    /// anything.
    ///
    /// Unknown, revoked and expired licenses are errors, as for
    /// [`DeviceAdmission::activate`].
    pub fn check(&self, key: &LicenseKey, device: &DeviceId) -> LicenseResult<BindingStatus> {
        self.ensure_not_revoked(key)?;
        let record = self.store.get(key)?;
        ensure_not_expired(&record, self.clock.now())?;

        let status = if self.store.is_blacklisted(device) {
            BindingStatus::Blacklisted
        } else if record.is_bound(device) {
            BindingStatus::Authorized
        } else if record.is_full() {
            BindingStatus::DeviceLimitExceeded
        } else {
            BindingStatus::CanActivate
        };
        Ok(status)
    }

    /// Unbinds a device, freeing its slot.
    pub fn release(&self, key: &LicenseKey, device: &DeviceId) -> LicenseResult<LicenseRecord> {
        self.ensure_not_revoked(key)?;
        let (record, ()) = self
            .store
            .mutate_active(key, |record| {
                record
                    .device_bindings
                    .remove(device)
                    .map(|_| ())
                    .ok_or_else(|| LicenseError::NotFound(format!("{device} is not bound to {key}")))
            })
            .map_err(|e| self.revoked_if_archived(key, e))?;

        info!(license_key = %key, device_id = %device, "Device released");
        Ok(record)
    }

    /// Records that a feature was used under this license.
    ///
    /// Fails if the license does not grant the feature or has expired.
    pub fn record_feature_use(&self, key: &LicenseKey, feature: Feature) -> LicenseResult<LicenseRecord> {
        self.ensure_not_revoked(key)?;
        let now = self.clock.now();
        let (record, ()) = self
            .store
            .mutate_active(key, |record| {
                ensure_not_expired(record, now)?;
                if !record.has_feature(feature) {
                    return Err(LicenseError::FeatureNotEnabled(feature.to_string()));
                }
                if !record.usage_statistics.features_used.contains(&feature) {
                    record.usage_statistics.features_used.push(feature);
                }
                Ok(())
            })
            .map_err(|e| self.revoked_if_archived(key, e))?;
        Ok(record)
    }

    /// Permanently bars a device from new bindings.
    ///
    /// Existing bindings are left alone; see
    /// [`DeviceAdmission::sweep_blacklisted`].
    pub fn blacklist_device(&self, device: &DeviceId, reason: &str) -> LicenseResult<BlacklistEntry> {
        let entry = self.store.add_blacklist(self.entry(device, reason, true))?;
        info!(device_id = %device, reason, "Device blacklisted");
        Ok(entry)
    }

    /// Bars a device from new bindings until the suspension is lifted.
    pub fn suspend_device(&self, device: &DeviceId, reason: &str) -> LicenseResult<BlacklistEntry> {
        let entry = self.store.add_blacklist(self.entry(device, reason, false))?;
        info!(device_id = %device, reason, permanent = entry.permanent, "Device suspended");
        Ok(entry)
    }

    /// Lifts a temporary suspension. Returns `None` if the device was not listed.
    pub fn lift_suspension(&self, device: &DeviceId) -> LicenseResult<Option<BlacklistEntry>> {
        let removed = self.store.remove_blacklist(device)?;
        if removed.is_some() {
            info!(device_id = %device, "Device suspension lifted");
        }
        Ok(removed)
    }

    /// Unbinds every blacklisted device from every active license.
    ///
    /// Returns the removed `(license, device)` pairs.
    pub fn sweep_blacklisted(&self) -> LicenseResult<Vec<(LicenseKey, DeviceId)>> {
        let mut removed = Vec::new();

        for key in self.store.active_keys() {
            let needs_sweep = match self.store.get(&key) {
                Ok(record) => record.bound_devices().any(|d| self.store.is_blacklisted(d)),
                Err(_) => false,
            };
            if !needs_sweep {
                continue;
            }

            let result = self.store.mutate_active(&key, |record| {
                let barred: Vec<DeviceId> = record
                    .bound_devices()
                    .filter(|d| self.store.is_blacklisted(d))
                    .cloned()
                    .collect();
                for device in &barred {
                    record.device_bindings.remove(device);
                }
                Ok::<_, LicenseError>(barred)
            });

            match result {
                Ok((_, barred)) => {
                    for device in barred {
                        info!(license_key = %key, device_id = %device, "Blacklisted device unbound");
                        removed.push((key.clone(), device));
                    }
                }
                // Revoked while sweeping.
                Err(LicenseError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(removed)
    }

    fn entry(&self, device: &DeviceId, reason: &str, permanent: bool) -> BlacklistEntry {
        BlacklistEntry {
            device_id: device.clone(),
            blacklisted_at: self.clock.now(),
            reason: reason.to_string(),
            permanent,
        }
    }

    fn ensure_not_revoked(&self, key: &LicenseKey) -> LicenseResult<()> {
        if self.store.is_revoked(key) {
            return Err(LicenseError::Revoked(key.to_string()));
        }
        Ok(())
    }

    /// A key can be revoked between the up-front check and the key lock.
    fn revoked_if_archived(&self, key: &LicenseKey, err: LicenseError) -> LicenseError {
        match err {
            LicenseError::NotFound(_) if self.store.is_revoked(key) => {
                LicenseError::Revoked(key.to_string())
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for DeviceAdmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceAdmission").finish_non_exhaustive()
    }
}

fn ensure_not_expired(record: &LicenseRecord, now: DateTime<Utc>) -> LicenseResult<()> {
    if record.is_expired(now) {
        return Err(LicenseError::Expired(
            record.expiry_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        ));
    }
    Ok(())
}
