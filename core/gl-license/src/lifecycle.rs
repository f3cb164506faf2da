//! License lifecycle: create, extend, revoke and query.
//!
//! A license is `Active` from creation, reads as `Expired` once the clock
//! passes its expiry, and becomes `Revoked` when it is moved into the
//! revocation archive. Extending an expired license makes it active again;
//! revocation is terminal.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc};
use gl_store::{LicenseStore, StoreCounts, StoreError};
use gl_types::{
    Clock, DeviceId, LicenseKey, LicenseRecord, LicenseStatus, LicenseTier, OwnerInfo,
    RevocationRecord, UsageStatistics,
};
use tracing::{debug, info, warn};

use crate::admission::{ActivationOutcome, DeviceAdmission};
use crate::catalog::entitlements;
use crate::config::EngineConfig;
use crate::error::{LicenseError, LicenseResult};
use crate::key::{self, mint_random_key, DecodedKey, RandomSegments, SegmentSource};

/// Parameters for [`LicenseLifecycle::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateLicense {
    pub tier: LicenseTier,
    pub owner_name: String,
    pub owner_email: String,
    /// Overrides the tier's default duration.
    pub duration_days: Option<u32>,
    /// Overrides the tier's default device limit.
    pub max_devices: Option<u32>,
}

impl CreateLicense {
    /// A request using the tier's defaults.
    pub fn new(tier: LicenseTier, owner_name: impl Into<String>, owner_email: impl Into<String>) -> Self {
        Self {
            tier,
            owner_name: owner_name.into(),
            owner_email: owner_email.into(),
            duration_days: None,
            max_devices: None,
        }
    }

    #[must_use]
    pub fn with_duration_days(mut self, days: u32) -> Self {
        self.duration_days = Some(days);
        self
    }

    #[must_use]
    pub fn with_max_devices(mut self, max: u32) -> Self {
        self.max_devices = Some(max);
        self
    }
}

/// Where a key was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseLookup {
    Active(LicenseRecord),
    Revoked(RevocationRecord),
}

impl LicenseLookup {
    /// The license key.
    #[must_use]
    pub fn key(&self) -> &LicenseKey {
        match self {
            Self::Active(record) => &record.license_key,
            Self::Revoked(revocation) => &revocation.license_key,
        }
    }

    /// Effective status at `now`.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> LicenseStatus {
        match self {
            Self::Active(record) => record.status_at(now),
            Self::Revoked(_) => LicenseStatus::Revoked,
        }
    }
}

/// Issues and manages licenses over a [`LicenseStore`].
pub struct LicenseLifecycle {
    store: Arc<LicenseStore>,
    clock: Arc<dyn Clock>,
    segments: Arc<dyn SegmentSource>,
    config: EngineConfig,
    admission: DeviceAdmission,
}

impl LicenseLifecycle {
    /// A lifecycle over `store` with random key segments and default config.
    ///
    /// All time reads go through the store's clock.
    #[must_use]
    pub fn new(store: Arc<LicenseStore>) -> Self {
        let clock = Arc::clone(store.clock());
        let admission = DeviceAdmission::new(Arc::clone(&store));
        Self {
            store,
            clock,
            segments: Arc::new(RandomSegments),
            config: EngineConfig::default(),
            admission,
        }
    }

    /// Replaces the source of random key segments.
    #[must_use]
    pub fn with_segment_source(mut self, segments: Arc<dyn SegmentSource>) -> Self {
        self.segments = segments;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<LicenseStore> {
        &self.store
    }

    /// Device admission over the same store.
    #[must_use]
    pub fn admission(&self) -> &DeviceAdmission {
        &self.admission
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Creates a new active license and returns its key.
    ///
    /// The key is minted for the current year. A minted key that is already
    /// active or revoked is discarded and another is drawn, up to
    /// `max_mint_attempts` times.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty owner name or email, a zero duration or
    /// device limit, or a duration that runs past the last representable
    /// date. `KeyspaceExhausted` if every attempt collided.
    pub fn create(&self, request: CreateLicense) -> LicenseResult<LicenseKey> {
        let owner_name = request.owner_name.trim();
        let owner_email = request.owner_email.trim();
        if owner_name.is_empty() {
            return Err(LicenseError::InvalidInput("owner name must not be empty".into()));
        }
        if owner_email.is_empty() {
            return Err(LicenseError::InvalidInput("owner email must not be empty".into()));
        }

        let defaults = entitlements(request.tier);
        let duration_days = request.duration_days.unwrap_or(defaults.duration_days);
        let max_devices = request.max_devices.unwrap_or(defaults.max_devices);
        if duration_days == 0 {
            return Err(LicenseError::InvalidInput("duration must be at least one day".into()));
        }
        if max_devices == 0 {
            return Err(LicenseError::InvalidInput("device limit must be at least one".into()));
        }

        let now = self.clock.now();
        let year = u16::try_from(now.year())
            .map_err(|_| LicenseError::InvalidInput(format!("clock year {} out of range", now.year())))?;
        let expiry_at = add_days(now, duration_days)?;

        for attempt in 1..=self.config.max_mint_attempts {
            let key = mint_random_key(request.tier, year, self.segments.as_ref())?;
            if self.store.contains(&key) {
                debug!(license_key = %key, attempt, "Minted key collides, retrying");
                continue;
            }

            let record = LicenseRecord {
                license_key: key.clone(),
                status: LicenseStatus::Active,
                created_at: now,
                expiry_at,
                days_remaining_snapshot: i64::from(duration_days),
                max_devices,
                current_devices: 0,
                owner_info: OwnerInfo {
                    name: owner_name.to_string(),
                    email: owner_email.to_string(),
                    registration_date: now,
                },
                device_bindings: Default::default(),
                usage_statistics: UsageStatistics::default(),
                tier: request.tier,
                features: defaults.features.to_vec(),
            };

            match self.store.put_active(record) {
                Ok(()) => {
                    info!(
                        license_key = %key,
                        tier = %request.tier,
                        duration_days,
                        max_devices,
                        "License created"
                    );
                    return Ok(key);
                }
                Err(StoreError::DuplicateKey(_)) => {
                    debug!(license_key = %key, attempt, "Key taken concurrently, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(
            tier = %request.tier,
            attempts = self.config.max_mint_attempts,
            "Could not mint a free license key"
        );
        Err(LicenseError::KeyspaceExhausted(self.config.max_mint_attempts))
    }

    /// Pushes the expiry of an active license back by `additional_days`.
    ///
    /// Days are added to the stored expiry, not to today, so an expired
    /// license only comes back if the extension covers the lapse.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for zero days or an expiry past the last representable
    /// date; the record is left unchanged.
    pub fn extend(&self, key: &LicenseKey, additional_days: u32) -> LicenseResult<LicenseRecord> {
        if additional_days == 0 {
            return Err(LicenseError::InvalidInput("extension must be at least one day".into()));
        }
        self.ensure_not_archived(key)?;

        let now = self.clock.now();
        let (record, ()) = self
            .store
            .mutate_active(key, |record| {
                record.expiry_at = add_days(record.expiry_at, additional_days)?;
                record.refresh_derived(now);
                Ok::<_, LicenseError>(())
            })
            .map_err(|e| self.already_revoked_if_archived(key, e))?;

        info!(
            license_key = %key,
            additional_days,
            expiry = %record.expiry_at,
            "License extended"
        );
        Ok(record)
    }

    /// Revokes a license, moving it into the archive.
    ///
    /// The archive entry keeps the expiry the license had when revoked.
    pub fn revoke(&self, key: &LicenseKey, reason: &str) -> LicenseResult<RevocationRecord> {
        self.ensure_not_archived(key)?;

        let now = self.clock.now();
        let revocation = self
            .store
            .remove_active_and_archive(key, |record| RevocationRecord {
                license_key: record.license_key.clone(),
                revoked_at: now,
                reason: reason.to_string(),
                original_expiry: record.expiry_at,
            })
            .map_err(|e| match e {
                StoreError::DuplicateKey(_) => LicenseError::AlreadyRevoked(key.to_string()),
                other => self.already_revoked_if_archived(key, other.into()),
            })?;

        info!(license_key = %key, reason, "License revoked");
        Ok(revocation)
    }

    /// Looks a key up in the active map, then the archive.
    pub fn query(&self, key: &LicenseKey) -> LicenseResult<LicenseLookup> {
        match self.store.get(key) {
            Ok(record) => return Ok(LicenseLookup::Active(record)),
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        match self.store.get_revoked(key) {
            Ok(revocation) => Ok(LicenseLookup::Revoked(revocation)),
            Err(e) => Err(e.into()),
        }
    }

    /// Effective status of a key right now.
    pub fn status(&self, key: &LicenseKey) -> LicenseResult<LicenseStatus> {
        Ok(self.query(key)?.status_at(self.clock.now()))
    }

    /// True if the record's expiry is strictly in the past.
    #[must_use]
    pub fn is_expired(&self, record: &LicenseRecord) -> bool {
        record.is_expired(self.clock.now())
    }

    /// Whole days until expiry, rounded down. Negative once expired.
    #[must_use]
    pub fn days_remaining(&self, record: &LicenseRecord) -> i64 {
        record.days_remaining(self.clock.now())
    }

    /// Checks a key's format and checksum. Says nothing about whether it
    /// was issued; use [`LicenseLifecycle::query`] for that.
    pub fn validate_key(&self, candidate: &str) -> LicenseResult<DecodedKey> {
        key::validate_key(candidate)
    }

    /// Current license and blacklist counts.
    #[must_use]
    pub fn summary(&self) -> StoreCounts {
        self.store.snapshot_counts()
    }

    /// Shorthand for [`DeviceAdmission::activate`].
    pub fn activate(
        &self,
        key: &LicenseKey,
        device: &DeviceId,
        device_name: Option<&str>,
    ) -> LicenseResult<ActivationOutcome> {
        self.admission.activate(key, device, device_name)
    }

    fn ensure_not_archived(&self, key: &LicenseKey) -> LicenseResult<()> {
        if self.store.is_revoked(key) {
            return Err(LicenseError::AlreadyRevoked(key.to_string()));
        }
        Ok(())
    }

    fn already_revoked_if_archived(&self, key: &LicenseKey, err: LicenseError) -> LicenseError {
        match err {
            LicenseError::NotFound(_) if self.store.is_revoked(key) => {
                LicenseError::AlreadyRevoked(key.to_string())
            }
            other => other,
        }
    }
}

fn add_days(from: DateTime<Utc>, days: u32) -> LicenseResult<DateTime<Utc>> {
    from.checked_add_signed(Duration::days(i64::from(days)))
        .ok_or_else(|| LicenseError::InvalidInput(format!("{days} days from {from} is out of range")))
}

impl std::fmt::Debug for LicenseLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseLifecycle")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
