//! Content fingerprints for cache keys.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;

/// SHA-256 of the file's current bytes as lowercase hex.
///
/// The file is streamed through the hasher, never read into memory whole.
pub fn hash_file(path: &Path) -> loopcast_core::Result<String> {
    let mut file = File::open(path).map_err(|e| loopcast_core::Error::file(path, e))?;
    let mut hasher = Sha256::new();

    io::copy(&mut file, &mut hasher).map_err(|e| loopcast_core::Error::file(path, e))?;

    Ok(hex::encode(hasher.finalize()))
}

/// [`hash_file`] on the blocking pool.
pub async fn hash_file_async(path: &Path) -> loopcast_core::Result<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || hash_file(&path))
        .await
        .map_err(|e| loopcast_core::Error::Internal(format!("hash task failed: {e}")))?
}
