// Response cache store.
// One JSON file per signature, best-effort reads and writes, manual invalidation.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::paths;

/// Wrapper for cached data with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    /// The cached data.
    pub data: T,
    /// When the data was cached.
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    /// Create a new cached data entry.
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }
}

/// Outcome of a cache write. Failures are reported here instead of as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheWrite {
    Stored,
    Failed(String),
}

impl CacheWrite {
    pub fn is_stored(&self) -> bool {
        matches!(self, CacheWrite::Stored)
    }
}

/// Entry count and on-disk size of the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
}

/// Disk-backed response cache keyed by request signature.
///
/// Entries never expire. There is no locking: concurrent writers to the same
/// signature race and the last rename wins.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    /// Create a cache rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default per-user cache directory, if the platform has one.
    pub fn default_dir() -> Option<PathBuf> {
        paths::responses_dir()
    }

    /// Directory holding the entries.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Look up a cached value.
    ///
    /// Unknown signatures return `None`. An entry that cannot be read or
    /// decoded is deleted and also reported as `None`.
    pub fn get<T: DeserializeOwned>(&self, signature: &str) -> Option<T> {
        let path = paths::entry_path(&self.dir, signature)?;

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(signature = %short(signature), "Cache miss");
                return None;
            }
            Err(e) => {
                warn!("Failed to read cache entry {}: {}", path.display(), e);
                discard(&path);
                return None;
            }
        };

        match serde_json::from_str::<CachedData<T>>(&contents) {
            Ok(cached) => {
                debug!(signature = %short(signature), cached_at = %cached.cached_at, "Cache hit");
                Some(cached.data)
            }
            Err(e) => {
                warn!("Cache entry {} is corrupt, discarding: {}", path.display(), e);
                discard(&path);
                None
            }
        }
    }

    /// Store a value, silently replacing any previous entry.
    pub fn put<T: Serialize>(&self, signature: &str, data: &T) -> CacheWrite {
        let Some(path) = paths::entry_path(&self.dir, signature) else {
            return CacheWrite::Failed("empty signature".to_string());
        };

        match self.write_entry(&path, data) {
            Ok(()) => {
                debug!(signature = %short(signature), "Cached response");
                CacheWrite::Stored
            }
            Err(e) => {
                warn!("Failed to write cache entry {}: {}", path.display(), e);
                let _ = fs::remove_file(path.with_extension("tmp"));
                CacheWrite::Failed(e.to_string())
            }
        }
    }

    /// Remove a single entry. Returns whether an entry was removed.
    pub fn remove(&self, signature: &str) -> bool {
        paths::entry_path(&self.dir, signature).is_some_and(|path| fs::remove_file(path).is_ok())
    }

    /// Remove all entries, returning how many were deleted.
    pub fn clear(&self) -> usize {
        let mut removed = 0;
        for path in self.entry_paths() {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove cache entry {}: {}", path.display(), e),
            }
        }
        debug!(removed, dir = %self.dir.display(), "Cleared response cache");
        removed
    }

    /// Count entries and their total size in bytes.
    pub fn stats(&self) -> CacheStats {
        self.entry_paths()
            .iter()
            .fold(CacheStats::default(), |mut stats, path| {
                if let Ok(meta) = fs::metadata(path) {
                    stats.entries += 1;
                    stats.total_bytes += meta.len();
                }
                stats
            })
    }

    fn write_entry<T: Serialize>(&self, path: &Path, data: &T) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let cached = CachedData::new(data);
        let json = serde_json::to_string(&cached)?;

        // Write atomically via temp file
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    fn entry_paths(&self) -> Vec<PathBuf> {
        match fs::read_dir(&self.dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| paths::is_entry(path))
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("Failed to list cache directory {}: {}", self.dir.display(), e);
                Vec::new()
            }
        }
    }
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Failed to delete cache entry {}: {}", path.display(), e);
        }
    }
}

fn short(signature: &str) -> &str {
    signature.get(..8).unwrap_or(signature)
}
