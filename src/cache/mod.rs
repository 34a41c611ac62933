//! Content-addressed validity cache.
//!
//! Maps a file's SHA-256 to the last verdict the validator returned for those
//! bytes, so unchanged files are never probed twice. The cache is a flat JSON
//! object `{hash: {hash, corrupted}}`, loaded once per scan and replaced
//! atomically when saved.

pub mod hash;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use loopcast_core::{CacheEntry, Error, Result};

pub use hash::{hash_file, hash_file_async};

/// In-memory cache contents keyed by content hash.
pub type CacheMap = BTreeMap<String, CacheEntry>;

/// Persistent validity cache backed by a JSON file.
#[derive(Debug, Clone)]
pub struct ValidityCache {
    path: PathBuf,
}

impl ValidityCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the cache. A missing file is an empty cache, not an error.
    pub fn load(&self) -> Result<CacheMap> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No validity cache yet");
                return Ok(CacheMap::new());
            }
            Err(e) => return Err(Error::cache(&self.path, e)),
        };

        let map: CacheMap =
            serde_json::from_slice(&data).map_err(|e| Error::cache(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), entries = map.len(), "Loaded validity cache");
        Ok(map)
    }

    /// Replace the cache file with `map`.
    ///
    /// The JSON is written to a temporary file next to the target and renamed
    /// over it, so readers never observe a partial cache.
    pub fn save(&self, map: &CacheMap) -> Result<()> {
        let json = serde_json::to_vec(map).map_err(|e| Error::cache(&self.path, e))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::cache(&self.path, e))?;
        tmp.write_all(&json).map_err(|e| Error::cache(&self.path, e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| Error::cache(&self.path, e))?;
        tmp.persist(&self.path)
            .map_err(|e| Error::cache(&self.path, e.error))?;

        tracing::debug!(path = %self.path.display(), entries = map.len(), "Saved validity cache");
        Ok(())
    }
}
