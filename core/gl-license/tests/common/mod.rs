//! Shared test helpers for license tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use gl_license::{CreateLicense, LicenseLifecycle, ScriptedSegments};
use gl_store::{InMemoryBackend, LicenseStore};
use gl_types::{DeviceId, LicenseKey, LicenseTier, ManualClock};
use std::sync::Arc;

/// Fixed starting instant for every test clock.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

/// Everything a lifecycle test needs to poke at.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub backend: InMemoryBackend,
    pub engine: LicenseLifecycle,
}

/// A lifecycle over an empty in-memory store, clock frozen at [`epoch`].
pub fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(epoch()));
    let backend = InMemoryBackend::new();
    let store = LicenseStore::open(backend.clone(), clock.clone()).unwrap();
    let engine = LicenseLifecycle::new(Arc::new(store));
    Harness { clock, backend, engine }
}

/// Like [`harness`], but minting keys from a fixed segment list.
pub fn scripted_harness(segments: &[&str]) -> Harness {
    let Harness { clock, backend, engine } = harness();
    let engine = engine.with_segment_source(Arc::new(ScriptedSegments::cycle(segments.iter().copied())));
    Harness { clock, backend, engine }
}

pub fn device(id: &str) -> DeviceId {
    DeviceId::parse(id).unwrap()
}

/// Creates a license with the tier's defaults.
pub fn create(engine: &LicenseLifecycle, tier: LicenseTier) -> LicenseKey {
    engine
        .create(CreateLicense::new(tier, "Test User", "test@example.com"))
        .unwrap()
}
