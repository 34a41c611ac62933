//! Validity scanner.
//!
//! Classifies every file in the managed directory as playable or corrupted,
//! consulting the [`ValidityCache`] by content hash so that only files with
//! never-seen bytes reach the validator.

pub mod cleanup;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use loopcast_av::Validator;
use loopcast_core::{CacheEntry, Error, Result};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::cache::{hash_file_async, ValidityCache};

pub use cleanup::remove_corrupted;

/// Outcome of one scan pass.
#[derive(Debug)]
pub struct ScanReport {
    /// Names of files judged playable, in scan order.
    pub valid: Vec<String>,
    /// Files whose verdict came from the validator.
    pub validated: usize,
    /// Files whose verdict came from the cache.
    pub cache_hits: usize,
    /// Set when classification succeeded but the cache could not be saved.
    pub cache_error: Option<Error>,
}

impl ScanReport {
    /// The valid list, or the cache write failure if there was one.
    pub fn into_result(self) -> Result<Vec<String>> {
        match self.cache_error {
            Some(e) => Err(e),
            None => Ok(self.valid),
        }
    }
}

/// Scanner for one managed directory.
pub struct ValidityScanner {
    dir: PathBuf,
    cache: ValidityCache,
    validator: Arc<dyn Validator>,
}

impl ValidityScanner {
    pub fn new(
        dir: impl Into<PathBuf>,
        cache: ValidityCache,
        validator: Arc<dyn Validator>,
    ) -> Self {
        Self {
            dir: dir.into(),
            cache,
            validator,
        }
    }


    /// Classify every regular file in the directory.
    ///
    /// Any hashing or validation failure aborts the whole scan. The cache is
    /// saved once at the end even when nothing changed; a save failure is
    /// reported in [`ScanReport::cache_error`] rather than discarding the
    /// classification.
    pub async fn scan(&self) -> Result<ScanReport> {
        let mut cache = self.cache.load()?;
        let files = list_files(&self.dir)?;

        info!(dir = %self.dir.display(), files = files.len(), "Scanning for valid videos");

        let mut valid = Vec::new();
        let mut validated = 0;
        let mut cache_hits = 0;

        for (name, path) in files {
            let hash = hash_file_async(&path).await?;

            let corrupted = match cache.get(&hash) {
                Some(entry) => {
                    cache_hits += 1;
                    debug!(file = %name, corrupted = entry.corrupted, "Cache hit");
                    entry.corrupted
                }
                None => {
                    let corrupted = self.validator.is_corrupted(&path).await?;
                    validated += 1;
                    debug!(file = %name, corrupted, validator = self.validator.name(), "Validated");
                    cache.insert(hash.clone(), CacheEntry::new(hash, corrupted));
                    corrupted
                }
            };

            if !corrupted {
                valid.push(name);
            }
        }

        let cache_error = match self.cache.save(&cache) {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(error = %e, "Failed to write validity cache");
                Some(e)
            }
        };

        info!(
            valid = valid.len(),
            validated,
            cache_hits,
            "Scan complete"
        );

        Ok(ScanReport {
            valid,
            validated,
            cache_hits,
            cache_error,
        })
    }
}

/// Regular files directly inside `dir` as `(name, path)`, sorted by name.
///
/// Subdirectories are skipped, not descended into.
pub fn list_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            Error::file(path, e.into())
        })?;

        if entry.file_type().is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        files.push((name, entry.into_path()));
    }

    Ok(files)
}
