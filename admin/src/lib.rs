//! Shared helpers and report rendering for the GL license admin CLI.

pub mod report;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use gl_license::LicenseLifecycle;
use gl_store::{JsonFileBackend, LicenseStore, StoreResult};
use gl_types::{Clock, LicenseKey, SystemClock};

pub use report::{render_license, render_revocation, render_summary, LicenseView};

/// Salt mixed into fingerprints produced by this tool.
pub const FINGERPRINT_SALT: &str = "gl-license";

/// Default location of the license document: `<data dir>/gl-license/licenses.json`.
pub fn default_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("gl-license").join("licenses.json"))
}

/// Opens the document at `path` with the system clock.
pub fn open_lifecycle(path: &Path) -> StoreResult<LicenseLifecycle> {
    open_lifecycle_with_clock(path, Arc::new(SystemClock))
}

/// Opens the document at `path`, creating an empty one on first write.
pub fn open_lifecycle_with_clock(path: &Path, clock: Arc<dyn Clock>) -> StoreResult<LicenseLifecycle> {
    let store = LicenseStore::open(JsonFileBackend::new(path), clock)?;
    Ok(LicenseLifecycle::new(Arc::new(store)))
}

/// Checks the key's format before it is looked up, so typos get a precise error.
pub fn parse_key(engine: &LicenseLifecycle, raw: &str) -> Result<LicenseKey> {
    let decoded = engine
        .validate_key(raw)
        .with_context(|| format!("Invalid license key {raw:?}"))?;
    Ok(decoded.key)
}
