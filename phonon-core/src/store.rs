//! Where the set of user-enabled modules lives between runs.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::lock;

pub trait EnabledModuleStore: Send {
    fn load_enabled(&self) -> Result<BTreeSet<String>, StoreError>;
    fn save_enabled(&self, names: &BTreeSet<String>) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EnabledFile {
    #[serde(default)]
    modules: Vec<String>,
}

/// Enabled set stored as a small JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/phonon/<file_name>`.
    pub fn in_config_dir(file_name: &str) -> Self {
        let dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("phonon");
        Self::new(dir.join(file_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EnabledModuleStore for JsonFileStore {
    /// A missing file is an empty set, not an error.
    fn load_enabled(&self) -> Result<BTreeSet<String>, StoreError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e.into()),
        };
        let file: EnabledFile = serde_json::from_str(&contents)?;
        Ok(file.modules.into_iter().collect())
    }

    fn save_enabled(&self, names: &BTreeSet<String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = EnabledFile {
            modules: names.iter().cloned().collect(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}

/// In-memory store. Clones share state, so a test can keep one clone and
/// inspect what the manager saved through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    names: Arc<Mutex<BTreeSet<String>>>,
    saves: Arc<AtomicUsize>,
    fail_saves: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::default();
        *lock(&store.names) = names.into_iter().map(Into::into).collect();
        store
    }

    pub fn names(&self) -> BTreeSet<String> {
        lock(&self.names).clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make every following save fail with an IO error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl EnabledModuleStore for MemoryStore {
    fn load_enabled(&self) -> Result<BTreeSet<String>, StoreError> {
        Ok(self.names())
    }

    fn save_enabled(&self, names: &BTreeSet<String>) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "store is read-only",
            )));
        }
        *lock(&self.names) = names.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
