//! The license store: in-memory document, per-key locking and atomic commits.
//!
//! Locking model:
//!
//! - `key_locks` hands out one mutex per license key. Every mutation of a
//!   key holds it for the whole read-modify-write, so same-key operations
//!   are totally ordered while different keys proceed independently. An
//!   entry lives only while some caller holds or waits on it.
//! - `backend` is the commit mutex. Every mutation takes it, applies the
//!   change to the in-memory document and saves a snapshot, so saves happen
//!   in the same order as the changes they contain.
//! - `state` is held only for short in-memory sections, never across IO.
//!
//! Lock order is always key lock, then commit mutex, then `state`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use gl_types::{BlacklistEntry, Clock, DeviceId, LicenseKey, LicenseRecord, RevocationRecord};
use tracing::{debug, info, warn};

use crate::backend::DocumentBackend;
use crate::document::{LicenseDocument, StoreCounts, SystemInfo};
use crate::error::{StoreError, StoreResult};

/// Durable mapping of license keys to records, plus the revocation archive
/// and the device blacklist.
pub struct LicenseStore {
    state: RwLock<LicenseDocument>,
    backend: Mutex<Box<dyn DocumentBackend>>,
    key_locks: Mutex<HashMap<LicenseKey, Arc<Mutex<()>>>>,
    clock: Arc<dyn Clock>,
}

impl LicenseStore {
    /// Opens the store, loading the persisted document or starting empty.
    ///
    /// Counters in a loaded document are recomputed from its maps. A document
    /// that breaks the structural invariants (a key both active and revoked,
    /// a record over quota) is rejected.
    pub fn open(backend: impl DocumentBackend + 'static, clock: Arc<dyn Clock>) -> StoreResult<Self> {
        let now = clock.now();
        let document = match backend.load()? {
            Some(mut document) => {
                let violations = document.integrity_violations();
                if !violations.is_empty() {
                    return Err(StoreError::InvalidData(violations.join("; ")));
                }
                if document.recount(now) {
                    warn!("Stored license counters disagreed with the document, recomputed");
                }
                info!(
                    active = document.license_keys.len(),
                    revoked = document.revoked_licenses.len(),
                    blacklisted = document.blacklisted_devices.len(),
                    "License document loaded"
                );
                document
            }
            None => {
                info!("No license document found, starting empty");
                LicenseDocument::empty(now)
            }
        };

        Ok(Self {
            state: RwLock::new(document),
            backend: Mutex::new(Box::new(backend)),
            key_locks: Mutex::new(HashMap::new()),
            clock,
        })
    }

    /// The clock used for counters and timestamps.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Returns the active record for `key`.
    pub fn get(&self, key: &LicenseKey) -> StoreResult<LicenseRecord> {
        self.read()
            .license_keys
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    /// Returns the archived revocation for `key`.
    pub fn get_revoked(&self, key: &LicenseKey) -> StoreResult<RevocationRecord> {
        self.read()
            .revoked_licenses
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    /// Returns true if the key is active or archived.
    #[must_use]
    pub fn contains(&self, key: &LicenseKey) -> bool {
        self.read().contains(key)
    }

    /// Returns true if the key is in the revocation archive.
    #[must_use]
    pub fn is_revoked(&self, key: &LicenseKey) -> bool {
        self.read().revoked_licenses.contains_key(key)
    }

    /// Returns true if the device is on the blacklist.
    #[must_use]
    pub fn is_blacklisted(&self, device: &DeviceId) -> bool {
        self.read().blacklisted_devices.contains_key(device)
    }

    /// Returns the blacklist entry for a device, if any.
    #[must_use]
    pub fn blacklist_entry(&self, device: &DeviceId) -> Option<BlacklistEntry> {
        self.read().blacklisted_devices.get(device).cloned()
    }

    /// Counts derived from the current maps.
    #[must_use]
    pub fn snapshot_counts(&self) -> StoreCounts {
        let now = self.clock.now();
        self.read().counts(now)
    }

    /// Keys of every active license, sorted.
    #[must_use]
    pub fn active_keys(&self) -> Vec<LicenseKey> {
        self.read().license_keys.keys().cloned().collect()
    }

    /// Every active record, sorted by key.
    #[must_use]
    pub fn active_records(&self) -> Vec<LicenseRecord> {
        self.read().license_keys.values().cloned().collect()
    }

    /// Every archived revocation, sorted by key.
    #[must_use]
    pub fn revoked_records(&self) -> Vec<RevocationRecord> {
        self.read().revoked_licenses.values().cloned().collect()
    }

    /// Every blacklist entry, sorted by device.
    #[must_use]
    pub fn blacklisted_devices(&self) -> Vec<BlacklistEntry> {
        self.read().blacklisted_devices.values().cloned().collect()
    }

    /// The document header as of the last commit.
    #[must_use]
    pub fn system_info(&self) -> SystemInfo {
        self.read().system_info.clone()
    }

    /// A copy of the whole in-memory document.
    #[must_use]
    pub fn document(&self) -> LicenseDocument {
        self.read().clone()
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Inserts a new active record.
    ///
    /// Fails with `DuplicateKey` if the key is already active or archived.
    pub fn put_active(&self, mut record: LicenseRecord) -> StoreResult<()> {
        let key = record.license_key.clone();
        check_quota(&record)?;
        record.refresh_derived(self.clock.now());

        self.with_key_lock(&key, || {
            self.commit(|document| {
                if document.contains(&key) {
                    return Err(StoreError::DuplicateKey(key.to_string()));
                }
                if let Some(device) = record
                    .bound_devices()
                    .find(|device| document.blacklisted_devices.contains_key(*device))
                {
                    return Err(StoreError::DeviceBlacklisted(device.to_string()));
                }
                document.license_keys.insert(key.clone(), record);
                Ok(())
            })
        })?;

        debug!(license_key = %key, "Active record inserted");
        Ok(())
    }

    /// Moves an active record into the revocation archive.
    ///
    /// `build` receives the record being archived, under the key lock, so the
    /// revocation captures exactly the state it replaces.
    pub fn remove_active_and_archive<F>(&self, key: &LicenseKey, build: F) -> StoreResult<RevocationRecord>
    where
        F: FnOnce(&LicenseRecord) -> RevocationRecord,
    {
        let revocation = self.with_key_lock(key, || {
            self.commit(|document| {
                if document.revoked_licenses.contains_key(key) {
                    return Err(StoreError::DuplicateKey(key.to_string()));
                }
                let record = document
                    .license_keys
                    .get(key)
                    .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
                let revocation = build(record);
                if &revocation.license_key != key {
                    return Err(StoreError::InvalidData(format!(
                        "revocation for {} archived under {key}",
                        revocation.license_key
                    )));
                }
                document.license_keys.remove(key);
                document.revoked_licenses.insert(key.clone(), revocation.clone());
                Ok(revocation)
            })
        })?;

        debug!(license_key = %key, "Active record archived");
        Ok(revocation)
    }

    /// Applies `f` to the active record for `key` under that key's lock and
    /// commits the result.
    ///
    /// `f` works on a copy; if it fails nothing is written. It may read from
    /// the store but must not mutate the same key, which would deadlock.
    /// Before installing, the store re-checks that the record is within its
    /// device quota and binds no newly blacklisted device.
    pub fn mutate_active<T, E, F>(&self, key: &LicenseKey, f: F) -> Result<(LicenseRecord, T), E>
    where
        F: FnOnce(&mut LicenseRecord) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.with_key_lock(key, || -> Result<(LicenseRecord, T), E> {
            let before = self.get(key)?;
            let mut record = before.clone();
            let value = f(&mut record)?;

            if record.license_key != before.license_key {
                return Err(StoreError::InvalidData(format!("license key of {key} is immutable")).into());
            }
            record.current_devices = u32::try_from(record.bound_count()).unwrap_or(u32::MAX);
            if record == before {
                return Ok((record, value));
            }
            check_quota(&record)?;

            let installed = record.clone();
            self.commit(|document| {
                if let Some(device) = installed
                    .bound_devices()
                    .filter(|device| !before.is_bound(device))
                    .find(|device| document.blacklisted_devices.contains_key(*device))
                {
                    return Err(StoreError::DeviceBlacklisted(device.to_string()));
                }
                let slot = document
                    .license_keys
                    .get_mut(key)
                    .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
                *slot = installed;
                Ok(())
            })?;

            Ok((record, value))
        })
    }

    /// Inserts or overwrites a blacklist entry.
    ///
    /// A permanent entry stays permanent even if overwritten by a
    /// temporary one.
    pub fn add_blacklist(&self, mut entry: BlacklistEntry) -> StoreResult<BlacklistEntry> {
        let stored = self.commit(|document| {
            if let Some(existing) = document.blacklisted_devices.get(&entry.device_id) {
                entry.permanent |= existing.permanent;
            }
            document
                .blacklisted_devices
                .insert(entry.device_id.clone(), entry.clone());
            Ok(entry)
        })?;
        debug!(device_id = %stored.device_id, permanent = stored.permanent, "Blacklist entry stored");
        Ok(stored)
    }

    /// Removes a temporary blacklist entry.
    ///
    /// Returns `Ok(None)` if the device was not listed. Permanent entries are
    /// never removed.
    pub fn remove_blacklist(&self, device: &DeviceId) -> StoreResult<Option<BlacklistEntry>> {
        if !self.is_blacklisted(device) {
            return Ok(None);
        }
        self.commit(|document| {
            match document.blacklisted_devices.get(device) {
                None => return Ok(None),
                Some(entry) if entry.permanent => {
                    return Err(StoreError::PermanentBlacklist(device.to_string()));
                }
                Some(_) => {}
            }
            Ok(document.blacklisted_devices.remove(device))
        })
    }

    /// Saves the current in-memory document again.
    ///
    /// Use after a failed save to bring durable storage back in line.
    pub fn persist(&self) -> StoreResult<()> {
        let mut backend = lock(&self.backend);
        let snapshot = self.read().clone();
        backend.save(&snapshot)
    }

    // ── Internals ────────────────────────────────────────────────

    fn commit<T>(&self, apply: impl FnOnce(&mut LicenseDocument) -> StoreResult<T>) -> StoreResult<T> {
        let mut backend = lock(&self.backend);
        let now = self.clock.now();

        let (value, snapshot) = {
            let mut document = self.write();
            let value = apply(&mut document)?;
            document.recount(now);
            document.system_info.last_updated = now;
            (value, document.clone())
        };

        if let Err(e) = backend.save(&snapshot) {
            warn!(error = %e, "License document save failed, in-memory state is ahead of storage");
            return Err(e);
        }
        Ok(value)
    }

    /// Runs `f` holding the lock for `key`, then drops the table entry if no
    /// other caller is holding or waiting on it.
    fn with_key_lock<T>(&self, key: &LicenseKey, f: impl FnOnce() -> T) -> T {
        let key_lock = self.key_lock(key);
        let value = {
            let _guard = lock(&key_lock);
            f()
        };
        self.release_key_lock(key, key_lock);
        value
    }

    fn key_lock(&self, key: &LicenseKey) -> Arc<Mutex<()>> {
        let mut locks = lock(&self.key_locks);
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    // Handles are only cloned under `key_locks`, so a count of one here
    // means the table holds the last reference.
    fn release_key_lock(&self, key: &LicenseKey, key_lock: Arc<Mutex<()>>) {
        let mut locks = lock(&self.key_locks);
        drop(key_lock);
        if locks.get(key).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(key);
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, LicenseDocument> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LicenseDocument> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for LicenseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseStore")
            .field("counts", &self.snapshot_counts())
            .finish_non_exhaustive()
    }
}

fn check_quota(record: &LicenseRecord) -> StoreResult<()> {
    if record.max_devices == 0 {
        return Err(StoreError::InvalidData(format!(
            "{} must allow at least one device",
            record.license_key
        )));
    }
    if record.bound_count() > record.max_devices as usize {
        return Err(StoreError::QuotaExceeded(record.max_devices));
    }
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
