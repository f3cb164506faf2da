//! Durable license document store.
//!
//! Holds every license record, the revocation archive and the device
//! blacklist in one document, and guarantees that each mutation is applied
//! atomically and persisted as a whole.
//!
//! # Architecture
//!
//! - [`LicenseStore`] owns the in-memory document and serializes writes per
//!   license key
//! - [`DocumentBackend`] persists whole documents; [`JsonFileBackend`] uses
//!   write-to-temp-then-rename, [`InMemoryBackend`] is for tests
//! - Aggregate counters in `system_info` are recomputed from the maps on every
//!   commit, never updated on their own

mod backend;
mod document;
mod error;
mod store;

pub use backend::{DocumentBackend, InMemoryBackend, JsonFileBackend};
pub use document::{LicenseDocument, StoreCounts, SystemInfo, SCHEMA_VERSION};
pub use error::{StoreError, StoreResult};
pub use store::LicenseStore;
