//! Document persistence backends.
//!
//! The store never touches the file system directly. It hands whole
//! documents to a [`DocumentBackend`], which must make each `save` atomic:
//! after a crash, the persisted document is either the previous one or the
//! new one, never a mix.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;
use uuid::Uuid;

use crate::document::LicenseDocument;
use crate::error::{StoreError, StoreResult};

/// Crash-safe storage of the license document.
pub trait DocumentBackend: Send {
    /// Loads the persisted document, or `None` if nothing has been saved yet.
    fn load(&self) -> StoreResult<Option<LicenseDocument>>;

    /// Atomically replaces the persisted document.
    fn save(&mut self, document: &LicenseDocument) -> StoreResult<()>;
}

/// Stores the document as a JSON file.
///
/// Saves go to a uniquely named sibling file which is fsynced and then
/// renamed over the target.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
    pretty: bool,
}

impl JsonFileBackend {
    /// A backend writing pretty-printed JSON to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pretty: true,
        }
    }

    /// Switches between pretty-printed and compact output.
    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// The target file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "licenses.json".to_string());
        self.path
            .with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()))
    }
}

impl DocumentBackend for JsonFileBackend {
    fn load(&self) -> StoreResult<Option<LicenseDocument>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let document = serde_json::from_slice(&bytes)?;
        Ok(Some(document))
    }

    fn save(&mut self, document: &LicenseDocument) -> StoreResult<()> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(document)?
        } else {
            serde_json::to_vec(document)?
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp = self.temp_path();
        let written = File::create(&temp).and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|()| fs::rename(&temp, &self.path)) {
            let _ = fs::remove_file(&temp);
            return Err(StoreError::Io(e));
        }

        debug!(path = %self.path.display(), size_bytes = bytes.len(), "License document saved");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    document: Option<LicenseDocument>,
    fail_on_save: bool,
    save_count: u64,
}

/// In-memory backend for tests and embedding.
///
/// Clones share the same state, so a test can keep a handle after moving
/// one into a store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryBackend {
    /// An empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that starts out holding `document`.
    #[must_use]
    pub fn with_document(document: LicenseDocument) -> Self {
        let backend = Self::default();
        backend.lock().document = Some(document);
        backend
    }

    /// The last saved document.
    #[must_use]
    pub fn saved(&self) -> Option<LicenseDocument> {
        self.lock().document.clone()
    }

    /// Number of successful saves.
    #[must_use]
    pub fn save_count(&self) -> u64 {
        self.lock().save_count
    }

    /// Makes subsequent saves fail with an IO error.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.lock().fail_on_save = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentBackend for InMemoryBackend {
    fn load(&self) -> StoreResult<Option<LicenseDocument>> {
        Ok(self.lock().document.clone())
    }

    fn save(&mut self, document: &LicenseDocument) -> StoreResult<()> {
        let mut state = self.lock();
        if state.fail_on_save {
            return Err(StoreError::Io(std::io::Error::other("simulated save failure")));
        }
        state.document = Some(document.clone());
        state.save_count += 1;
        Ok(())
    }
}
