//! Removal of corrupted files from the managed directory.

use std::path::Path;

use loopcast_av::Validator;
use loopcast_core::{Error, Result};

use super::list_files;

/// Validate every file directly (no cache) and delete the corrupted ones.
///
/// Returns the names removed. The first validation or removal failure
/// aborts the pass.
pub async fn remove_corrupted(dir: &Path, validator: &dyn Validator) -> Result<Vec<String>> {
    let mut removed = Vec::new();

    for (name, path) in list_files(dir)? {
        if !validator.is_corrupted(&path).await? {
            continue;
        }

        std::fs::remove_file(&path).map_err(|e| Error::file(&path, e))?;
        tracing::info!(file = %name, "Removed corrupted video");
        removed.push(name);
    }

    Ok(removed)
}
