use chrono::{Duration, TimeZone, Utc};
use gl_types::{
    days_between, Clock, DeviceBinding, DeviceId, Feature, LicenseRecord, LicenseStatus,
    LicenseTier, ManualClock,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const LEGACY_RECORD: &str = r#"{
    "license_key": "GL-BASIC-2025-ABCD-EFGH-1234",
    "status": "active",
    "created_date": "2025-01-01T00:00:00.000000Z",
    "expiry_date": "2025-01-31T00:00:00.000000Z",
    "days_remaining": 30,
    "max_devices": 3,
    "current_devices": 0,
    "owner_info": {
        "name": "Basic User",
        "email": "basic@example.com",
        "registration_date": "2025-01-01T00:00:00.000000Z"
    },
    "device_bindings": {},
    "usage_statistics": {
        "total_activations": 0,
        "total_launches": 0,
        "last_launch": null,
        "features_used": []
    },
    "license_type": "basic",
    "features_enabled": ["pubg_auto_update", "gameloop_management"]
}"#;

fn legacy_record() -> LicenseRecord {
    serde_json::from_str(LEGACY_RECORD).unwrap()
}

// ── Document compatibility ───────────────────────────────────────

#[test]
fn legacy_record_loads() {
    let record = legacy_record();
    assert_eq!(record.license_key.as_str(), "GL-BASIC-2025-ABCD-EFGH-1234");
    assert_eq!(record.tier, LicenseTier::Basic);
    assert_eq!(record.status, LicenseStatus::Active);
    assert_eq!(record.max_devices, 3);
    assert_eq!(record.features, vec![Feature::AutoUpdate, Feature::Management]);
    assert_eq!(record.expiry_at, Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap());
    assert!(record.usage_statistics.last_launch.is_none());
}

#[test]
fn record_serializes_with_document_field_names() {
    let value = serde_json::to_value(legacy_record()).unwrap();
    for field in [
        "license_key",
        "created_date",
        "expiry_date",
        "days_remaining",
        "current_devices",
        "device_bindings",
        "usage_statistics",
        "license_type",
        "features_enabled",
    ] {
        assert!(value.get(field).is_some(), "missing field {field}");
    }
    assert_eq!(value["license_type"], "basic");
    assert_eq!(value["features_enabled"][0], "auto_update");
}

#[test]
fn timestamps_serialize_with_trailing_z() {
    let value = serde_json::to_value(legacy_record()).unwrap();
    let expiry = value["expiry_date"].as_str().unwrap();
    assert!(expiry.ends_with('Z'), "{expiry}");
}

// ── Derived state ────────────────────────────────────────────────

#[test]
fn expiry_is_strictly_after() {
    let record = legacy_record();
    assert!(!record.is_expired(record.expiry_at));
    assert!(record.is_expired(record.expiry_at + Duration::seconds(1)));
    assert_eq!(record.status_at(record.expiry_at), LicenseStatus::Active);
    assert_eq!(
        record.status_at(record.expiry_at + Duration::days(1)),
        LicenseStatus::Expired
    );
}

#[test]
fn days_remaining_floors_toward_negative() {
    let record = legacy_record();
    let expiry = record.expiry_at;
    assert_eq!(record.days_remaining(expiry - Duration::hours(36)), 1);
    assert_eq!(record.days_remaining(expiry - Duration::hours(1)), 0);
    assert_eq!(record.days_remaining(expiry + Duration::hours(1)), -1);
    assert_eq!(record.days_remaining(expiry + Duration::days(10)), -10);
}

#[test]
fn refresh_derived_counts_bindings() {
    let mut record = legacy_record();
    let now = record.created_at;
    record
        .device_bindings
        .insert(DeviceId::parse("HWID-A").unwrap(), DeviceBinding::new(None, now));
    record.device_bindings.insert(
        DeviceId::parse("HWID-B").unwrap(),
        DeviceBinding::new(Some("laptop".into()), now),
    );
    record.refresh_derived(now);
    assert_eq!(record.current_devices, 2);
    assert_eq!(record.days_remaining_snapshot, 30);
    assert!(!record.is_full());
    assert!(record.is_bound(&DeviceId::parse("HWID-B").unwrap()));
}

// ── Clock ────────────────────────────────────────────────────────

#[test]
fn manual_clock_advances() {
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    assert_eq!(clock.now(), start);
    clock.advance_days(3);
    assert_eq!(clock.now(), start + Duration::days(3));
    clock.set(start);
    assert_eq!(clock.now(), start);
}

proptest! {
    #[test]
    fn days_between_is_floor_division(secs in -10_000_000i64..10_000_000i64) {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let until = now + Duration::seconds(secs);
        let days = days_between(now, until);
        prop_assert!(days * 86_400 <= secs);
        prop_assert!((days + 1) * 86_400 > secs);
    }
}
