//! Shared test helpers for store tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use gl_types::{
    DeviceBinding, DeviceId, Feature, LicenseKey, LicenseRecord, LicenseStatus, LicenseTier,
    ManualClock, OwnerInfo, UsageStatistics,
};
use std::sync::Arc;

/// Fixed starting instant for every test clock.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

/// A manual clock frozen at [`epoch`].
pub fn test_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(epoch()))
}

pub fn device(id: &str) -> DeviceId {
    DeviceId::parse(id).unwrap()
}

/// A BASIC-like record with no bindings, expiring 30 days after [`epoch`].
pub fn sample_record(key: &str, max_devices: u32) -> LicenseRecord {
    let now = epoch();
    LicenseRecord {
        license_key: LicenseKey::new(key),
        status: LicenseStatus::Active,
        created_at: now,
        expiry_at: now + Duration::days(30),
        days_remaining_snapshot: 30,
        max_devices,
        current_devices: 0,
        owner_info: OwnerInfo {
            name: "Test User".into(),
            email: "test@example.com".into(),
            registration_date: now,
        },
        device_bindings: Default::default(),
        usage_statistics: UsageStatistics::default(),
        tier: LicenseTier::Basic,
        features: vec![Feature::AutoUpdate, Feature::Management],
    }
}

/// Adds a binding for `id` to `record`.
pub fn bind(record: &mut LicenseRecord, id: &str) {
    record
        .device_bindings
        .insert(device(id), DeviceBinding::new(None, epoch()));
}
