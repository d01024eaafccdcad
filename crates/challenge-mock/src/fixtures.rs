//! Fixture loading with a write-once cache
//!
//! Each fixture is read from disk at most once per store. Entries are never
//! evicted, so repeated loads hand back the same shared bytes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::debug;

use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};

/// Raw fixture content shared between every caller that loaded it
pub type FixtureBytes = Arc<[u8]>;

pub struct FixtureStore {
    dir: PathBuf,
    cache: RwLock<HashMap<String, FixtureBytes>>,
    disk_reads: AtomicUsize,
}

impl FixtureStore {
    /// Create an empty store reading from `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
            disk_reads: AtomicUsize::new(0),
        }
    }

    /// Process-wide store over the configured fixtures directory.
    ///
    /// Created on first use and kept for the lifetime of the process, so the
    /// config (file and `CHALLENGE_MOCK_*` env) is read only once.
    pub fn shared() -> &'static FixtureStore {
        static SHARED: OnceLock<FixtureStore> = OnceLock::new();
        SHARED.get_or_init(|| {
            let config = HarnessConfig::load_or_default();
            FixtureStore::new(config.fixtures_dir)
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load a fixture by file name, reading it from disk only on first use
    pub fn load(&self, name: &str) -> Result<FixtureBytes> {
        if let Some(bytes) = self.read_cache().get(name) {
            return Ok(Arc::clone(bytes));
        }

        // Read outside the lock so lookups of cached entries never wait on disk
        let path = self.dir.join(name);
        let content = std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => HarnessError::FixtureNotFound {
                name: name.to_string(),
                path: path.clone(),
            },
            _ => HarnessError::FixtureRead {
                path: path.clone(),
                source: e,
            },
        })?;
        self.disk_reads.fetch_add(1, Ordering::Relaxed);
        debug!(fixture = name, bytes = content.len(), "loaded fixture from disk");

        // First insert wins; a racing loader gets the stored bytes back
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let bytes = cache
            .entry(name.to_string())
            .or_insert_with(|| Arc::from(content));
        Ok(Arc::clone(bytes))
    }

    /// Whether `name` has already been loaded
    pub fn is_cached(&self, name: &str) -> bool {
        self.read_cache().contains_key(name)
    }

    /// Number of fixture files actually read from disk
    pub fn disk_reads(&self) -> usize {
        self.disk_reads.load(Ordering::Relaxed)
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, FixtureBytes>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }
}
