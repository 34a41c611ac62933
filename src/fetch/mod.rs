//! Download coordinator.
//!
//! Fetches manifest assets into the managed directory with one task per
//! asset, at most `fetch.concurrency` of them doing work at once. A failing
//! asset is logged where it fails and never affects its siblings or the
//! caller.

pub mod gate;
pub mod manifest;
pub mod progress;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use loopcast_av::Validator;
use loopcast_core::config::FetchConfig;
use loopcast_core::{Error, FetchLimit, RemoteAsset, Result};

pub use gate::{AdmissionGate, AdmissionPermit};
pub use manifest::AssetManifest;
pub use progress::ProgressReporter;

/// Totals for one [`Downloader::fetch_all`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// State shared by every download task.
struct Shared {
    client: reqwest::Client,
    video_dir: PathBuf,
    validator: Arc<dyn Validator>,
    progress_interval: Duration,
}

/// Concurrent fetcher for one managed directory.
pub struct Downloader {
    shared: Arc<Shared>,
    gate: AdmissionGate,
}

impl Downloader {
    pub fn new(
        video_dir: impl Into<PathBuf>,
        validator: Arc<dyn Validator>,
        config: &FetchConfig,
    ) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build download HTTP client: {e}");
                reqwest::Client::new()
            });

        Self {
            shared: Arc::new(Shared {
                client,
                video_dir: video_dir.into(),
                validator,
                progress_interval: config.progress_interval(),
            }),
            gate: AdmissionGate::new(config.concurrency),
        }
    }

    /// The gate bounding in-flight downloads.
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }


    /// Download the first `limit` assets of `manifest`.
    ///
    /// Returns once every launched task has finished. Per-asset failures are
    /// counted in the summary, never returned.
    pub async fn fetch_all(&self, manifest: &AssetManifest, limit: FetchLimit) -> FetchSummary {
        let count = limit.apply(manifest.len());
        info!(
            total = manifest.len(),
            attempting = count,
            limit = %limit,
            "Fetching assets"
        );

        let mut tasks = JoinSet::new();
        for asset in manifest.assets().iter().take(count).cloned() {
            let shared = self.shared.clone();
            let gate = self.gate.clone();
            tasks.spawn(async move {
                let _permit = gate.acquire().await?;
                let name = asset.name.clone();
                shared.fetch_one(&asset).await.map_err(|e| {
                    warn!(asset = %name, error = %e, "Download failed");
                    e
                })
            });
        }

        let mut summary = FetchSummary {
            attempted: count,
            ..FetchSummary::default()
        };

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(bytes)) => {
                    summary.succeeded += 1;
                    debug!(bytes, "Download task finished");
                }
                Ok(Err(_)) => summary.failed += 1,
                Err(e) => {
                    warn!(error = %e, "Download task panicked");
                    summary.failed += 1;
                }
            }
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Fetch complete"
        );
        summary
    }
}

impl Shared {
    /// Fetch one asset, returning the number of bytes written.
    async fn fetch_one(&self, asset: &RemoteAsset) -> Result<u64> {
        let dest = self.destination(&asset.name)?;

        match tokio::fs::metadata(&dest).await {
            Ok(_) => {
                if self.validator.is_corrupted(&dest).await? {
                    tokio::fs::remove_file(&dest)
                        .await
                        .map_err(|e| Error::file(&dest, e))?;
                    info!(asset = %asset.name, "Removed corrupted local copy");
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::file(&dest, e)),
        }

        let mut response = self
            .client
            .get(&asset.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::http(&asset.url, e))?;

        let total = response.content_length();
        let file = tokio::fs::File::create(&dest)
            .await
            .map_err(|e| Error::file(&dest, e))?;
        let mut writer = BufWriter::new(file);
        let mut progress = ProgressReporter::new(&asset.name, total, self.progress_interval);

        loop {
            let chunk = match response.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    discard_partial(&dest).await;
                    return Err(Error::http(&asset.url, e));
                }
            };
            if let Err(e) = writer.write_all(&chunk).await {
                discard_partial(&dest).await;
                return Err(Error::file(&dest, e));
            }
            progress.advance(chunk.len() as u64);
        }

        writer.flush().await.map_err(|e| Error::file(&dest, e))?;

        info!(asset = %asset.name, bytes = progress.received(), "Downloaded");
        Ok(progress.received())
    }

    /// Local path for an asset name. Names must be a single plain component.
    fn destination(&self, name: &str) -> Result<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.video_dir.join(name)),
            _ => Err(Error::Validation(format!(
                "asset name '{name}' is not a plain file name"
            ))),
        }
    }
}

/// Best-effort removal of a half-written download.
async fn discard_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        debug!(path = %path.display(), error = %e, "Could not remove partial download");
    }
}
