mod common;

use std::sync::Arc;
use std::thread;

use chrono::Duration;
use common::{create, device, epoch, harness, Harness};
use gl_license::{BindingStatus, CreateLicense, LicenseError};
use gl_types::{Feature, LicenseTier};
use pretty_assertions::assert_eq;

// ── Activation ───────────────────────────────────────────────────

#[test]
fn activate_binds_device() {
    let Harness { engine, clock, .. } = harness();
    let key = create(&engine, LicenseTier::Basic);
    clock.advance(Duration::hours(2));

    let outcome = engine.activate(&key, &device("HWID-1"), Some("Gaming PC")).unwrap();
    assert!(outcome.newly_bound);

    let record = outcome.record;
    assert_eq!(record.current_devices, 1);
    let binding = &record.device_bindings[&device("HWID-1")];
    assert_eq!(binding.device_name.as_deref(), Some("Gaming PC"));
    assert_eq!(binding.first_activation, epoch() + Duration::hours(2));
    assert_eq!(binding.last_seen, binding.first_activation);
    assert_eq!(record.usage_statistics.total_activations, 1);
    assert_eq!(record.usage_statistics.total_launches, 1);
    assert_eq!(record.usage_statistics.last_launch, Some(epoch() + Duration::hours(2)));
}

#[test]
fn reactivation_is_idempotent_for_quota() {
    let Harness { engine, clock, .. } = harness();
    let key = create(&engine, LicenseTier::Demo);

    engine.activate(&key, &device("HWID-1"), None).unwrap();
    clock.advance_days(1);
    let outcome = engine.activate(&key, &device("HWID-1"), None).unwrap();

    assert!(!outcome.newly_bound);
    let record = outcome.record;
    assert_eq!(record.current_devices, 1);
    assert_eq!(record.usage_statistics.total_activations, 1);
    assert_eq!(record.usage_statistics.total_launches, 2);
    let binding = &record.device_bindings[&device("HWID-1")];
    assert_eq!(binding.first_activation, epoch());
    assert_eq!(binding.last_seen, epoch() + Duration::days(1));
}

#[test]
fn quota_admits_exactly_max_devices() {
    let Harness { engine, .. } = harness();
    let key = create(&engine, LicenseTier::Basic);

    for i in 1..=3 {
        engine.activate(&key, &device(&format!("HWID-{i}")), None).unwrap();
    }
    let err = engine.activate(&key, &device("HWID-4"), None).unwrap_err();
    assert!(matches!(err, LicenseError::QuotaExceeded(3)));

    // Bound devices still get in.
    engine.activate(&key, &device("HWID-2"), None).unwrap();
    assert_eq!(engine.store().get(&key).unwrap().current_devices, 3);
}

#[test]
fn concurrent_activations_respect_quota() {
    let Harness { engine, .. } = harness();
    let key = engine
        .create(CreateLicense::new(LicenseTier::Pro, "Ann", "ann@example.com").with_max_devices(4))
        .unwrap();
    let engine = Arc::new(engine);

    let results: Vec<bool> = thread::scope(|s| {
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let engine = Arc::clone(&engine);
                let key = key.clone();
                s.spawn(move || engine.activate(&key, &device(&format!("HWID-{i}")), None).is_ok())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|ok| **ok).count(), 4);
    let record = engine.store().get(&key).unwrap();
    assert_eq!(record.bound_count(), 4);
    assert_eq!(record.current_devices, 4);
    assert_eq!(record.usage_statistics.total_activations, 4);
}

#[test]
fn activate_unknown_license() {
    let Harness { engine, .. } = harness();
    let missing = gl_license::mint_key(LicenseTier::Basic, 2025, "NOPE", "NOPE").unwrap();
    assert!(matches!(
        engine.activate(&missing, &device("HWID-1"), None),
        Err(LicenseError::NotFound(_))
    ));
}

#[test]
fn activate_expired_license() {
    let Harness { engine, clock, .. } = harness();
    let key = create(&engine, LicenseTier::Demo);
    engine.activate(&key, &device("HWID-1"), None).unwrap();
    clock.advance_days(8);

    // Even a bound device is refused.
    let err = engine.activate(&key, &device("HWID-1"), None).unwrap_err();
    assert!(matches!(err, LicenseError::Expired(ref at) if at.starts_with("2025-03-08")));

    engine.extend(&key, 7).unwrap();
    engine.activate(&key, &device("HWID-1"), None).unwrap();
}

#[test]
fn refused_activation_changes_nothing() {
    let Harness { engine, backend, .. } = harness();
    let key = create(&engine, LicenseTier::Demo);
    engine.activate(&key, &device("HWID-1"), None).unwrap();
    let before = engine.store().get(&key).unwrap();
    let saves = backend.save_count();

    assert!(engine.activate(&key, &device("HWID-2"), None).is_err());
    assert_eq!(engine.store().get(&key).unwrap(), before);
    assert_eq!(backend.save_count(), saves);
}

// ── Blacklist ────────────────────────────────────────────────────

#[test]
fn blacklist_blocks_new_bindings_everywhere() {
    let Harness { engine, .. } = harness();
    let first = create(&engine, LicenseTier::Basic);
    let second = create(&engine, LicenseTier::Basic);
    let admission = engine.admission();

    engine.activate(&first, &device("HWID-BAD"), None).unwrap();
    let entry = admission.blacklist_device(&device("HWID-BAD"), "key sharing").unwrap();
    assert!(entry.permanent);
    assert_eq!(entry.reason, "key sharing");
    assert_eq!(entry.blacklisted_at, epoch());

    // Existing binding is kept.
    assert!(engine.store().get(&first).unwrap().is_bound(&device("HWID-BAD")));

    for key in [&first, &second] {
        assert!(matches!(
            engine.activate(key, &device("HWID-BAD"), None),
            Err(LicenseError::DeviceBlacklisted(_))
        ));
    }
}

#[test]
fn blacklist_is_checked_before_quota() {
    let Harness { engine, .. } = harness();
    let key = create(&engine, LicenseTier::Demo);
    engine.activate(&key, &device("HWID-1"), None).unwrap();
    engine.admission().blacklist_device(&device("HWID-2"), "abuse").unwrap();

    assert!(matches!(
        engine.activate(&key, &device("HWID-2"), None),
        Err(LicenseError::DeviceBlacklisted(_))
    ));
}

#[test]
fn suspension_can_be_lifted() {
    let Harness { engine, .. } = harness();
    let key = create(&engine, LicenseTier::Basic);
    let admission = engine.admission();

    let entry = admission.suspend_device(&device("HWID-1"), "chargeback review").unwrap();
    assert!(!entry.permanent);
    assert!(engine.activate(&key, &device("HWID-1"), None).is_err());

    let lifted = admission.lift_suspension(&device("HWID-1")).unwrap();
    assert_eq!(lifted.map(|e| e.reason), Some("chargeback review".to_string()));
    engine.activate(&key, &device("HWID-1"), None).unwrap();

    assert_eq!(admission.lift_suspension(&device("HWID-1")).unwrap(), None);
}

#[test]
fn permanent_blacklist_cannot_be_lifted() {
    let Harness { engine, .. } = harness();
    let admission = engine.admission();
    admission.blacklist_device(&device("HWID-1"), "fraud").unwrap();

    // A later suspension does not downgrade the entry.
    let entry = admission.suspend_device(&device("HWID-1"), "review").unwrap();
    assert!(entry.permanent);

    assert!(matches!(
        admission.lift_suspension(&device("HWID-1")),
        Err(LicenseError::PermanentBlacklist(_))
    ));
    assert!(engine.store().is_blacklisted(&device("HWID-1")));
}

#[test]
fn sweep_unbinds_blacklisted_devices() {
    let Harness { engine, .. } = harness();
    let first = create(&engine, LicenseTier::Pro);
    let second = create(&engine, LicenseTier::Pro);
    let admission = engine.admission();

    engine.activate(&first, &device("HWID-BAD"), None).unwrap();
    engine.activate(&first, &device("HWID-OK"), None).unwrap();
    engine.activate(&second, &device("HWID-BAD"), None).unwrap();
    admission.blacklist_device(&device("HWID-BAD"), "abuse").unwrap();

    let mut removed = admission.sweep_blacklisted().unwrap();
    removed.sort();
    let mut expected = vec![(first.clone(), device("HWID-BAD")), (second.clone(), device("HWID-BAD"))];
    expected.sort();
    assert_eq!(removed, expected);

    let record = engine.store().get(&first).unwrap();
    assert_eq!(record.bound_devices().cloned().collect::<Vec<_>>(), vec![device("HWID-OK")]);
    assert_eq!(record.current_devices, 1);
    assert!(admission.sweep_blacklisted().unwrap().is_empty());
}

// ── Check ────────────────────────────────────────────────────────

#[test]
fn check_reports_binding_status() {
    let Harness { engine, .. } = harness();
    let key = create(&engine, LicenseTier::Demo);
    let admission = engine.admission();

    assert_eq!(admission.check(&key, &device("HWID-1")).unwrap(), BindingStatus::CanActivate);
    engine.activate(&key, &device("HWID-1"), None).unwrap();
    assert_eq!(admission.check(&key, &device("HWID-1")).unwrap(), BindingStatus::Authorized);
    assert_eq!(
        admission.check(&key, &device("HWID-2")).unwrap(),
        BindingStatus::DeviceLimitExceeded
    );
    admission.suspend_device(&device("HWID-1"), "review").unwrap();
    assert_eq!(admission.check(&key, &device("HWID-1")).unwrap(), BindingStatus::Blacklisted);
}

#[test]
fn check_does_not_write() {
    let Harness { engine, backend, .. } = harness();
    let key = create(&engine, LicenseTier::Basic);
    let saves = backend.save_count();
    engine.admission().check(&key, &device("HWID-1")).unwrap();
    assert_eq!(backend.save_count(), saves);
}

#[test]
fn check_revoked_and_expired() {
    let Harness { engine, clock, .. } = harness();
    let revoked = create(&engine, LicenseTier::Basic);
    let expiring = create(&engine, LicenseTier::Demo);
    engine.revoke(&revoked, "test").unwrap();
    clock.advance_days(8);

    let admission = engine.admission();
    assert!(matches!(admission.check(&revoked, &device("HWID-1")), Err(LicenseError::Revoked(_))));
    assert!(matches!(admission.check(&expiring, &device("HWID-1")), Err(LicenseError::Expired(_))));
}

// ── Release and features ─────────────────────────────────────────

#[test]
fn release_frees_a_slot() {
    let Harness { engine, .. } = harness();
    let key = create(&engine, LicenseTier::Demo);
    let admission = engine.admission();

    engine.activate(&key, &device("HWID-1"), None).unwrap();
    let record = admission.release(&key, &device("HWID-1")).unwrap();
    assert_eq!(record.current_devices, 0);

    engine.activate(&key, &device("HWID-2"), None).unwrap();
    assert!(matches!(admission.release(&key, &device("HWID-1")), Err(LicenseError::NotFound(_))));
}

#[test]
fn feature_use_is_recorded_once() {
    let Harness { engine, .. } = harness();
    let key = create(&engine, LicenseTier::Pro);
    let admission = engine.admission();

    admission.record_feature_use(&key, Feature::RegistryTools).unwrap();
    let record = admission.record_feature_use(&key, Feature::RegistryTools).unwrap();
    assert_eq!(record.usage_statistics.features_used, vec![Feature::RegistryTools]);

    assert!(matches!(
        admission.record_feature_use(&key, Feature::BulkOperations),
        Err(LicenseError::FeatureNotEnabled(_))
    ));
}
