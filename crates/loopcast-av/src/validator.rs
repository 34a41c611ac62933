//! Video corruption checks.
//!
//! A [`Validator`] answers "is this file corrupted?" within a bounded time.
//! [`FfprobeValidator`] asks ffprobe to read the first video stream and
//! decides from its diagnostic text. The decision is a substring heuristic:
//! false positives and negatives are possible and accepted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::command::{ToolCommand, ToolOutput, ToolRun};
use crate::tools::ToolRegistry;

/// Diagnostic fragments that mark a file as corrupted.
const CORRUPTION_MARKERS: &[&str] = &["error", "Invalid data found when processing input"];

/// Bounded-time corruption check for a local file.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Human-readable name identifying this validator.
    fn name(&self) -> &'static str;

    /// Return `Ok(true)` if the file looks corrupted, `Ok(false)` if it looks
    /// playable or the check ran out of time, and an error if the check
    /// itself failed for another reason.
    async fn is_corrupted(&self, path: &Path) -> loopcast_core::Result<bool>;
}

/// Validator backed by `ffprobe -v error`.
#[derive(Debug, Clone)]
pub struct FfprobeValidator {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl FfprobeValidator {
    /// Probe with the ffprobe binary at `ffprobe`.
    pub fn new(ffprobe: impl Into<PathBuf>, timeout: Duration) -> Self {
        let args = [
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=codec_type",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        Self {
            program: ffprobe.into(),
            args,
            timeout,
        }
    }

    /// Probe with the ffprobe found by `registry`.
    pub fn from_registry(
        registry: &ToolRegistry,
        timeout: Duration,
    ) -> loopcast_core::Result<Self> {
        Ok(Self::new(registry.require("ffprobe")?, timeout))
    }

    /// Run `program args... <path>` instead of ffprobe, applying the same
    /// verdict rules to its output.
    pub fn with_command(
        program: impl Into<PathBuf>,
        args: impl IntoIterator<Item = impl Into<String>>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Validator for FfprobeValidator {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn is_corrupted(&self, path: &Path) -> loopcast_core::Result<bool> {
        let mut cmd = ToolCommand::new(self.program.clone());
        cmd.args(self.args.iter().cloned())
            .arg(path.to_string_lossy())
            .timeout(self.timeout);

        match cmd.run().await? {
            ToolRun::TimedOut => {
                tracing::debug!(
                    file = %path.display(),
                    "Probe exceeded {:?}; treating as playable",
                    self.timeout
                );
                Ok(false)
            }
            ToolRun::Completed(output) => verdict(&cmd.program_name(), path, &output),
        }
    }
}

/// Turn a completed probe into a verdict.
fn verdict(tool: &str, path: &Path, output: &ToolOutput) -> loopcast_core::Result<bool> {
    let text = output.combined();

    if looks_corrupted(&text) {
        tracing::warn!(file = %path.display(), "Video is corrupted: {}", text.trim());
        return Ok(true);
    }

    if !output.status.success() {
        return Err(loopcast_core::Error::tool(
            tool,
            format!(
                "{}: exited with status {}: {}",
                path.display(),
                output.status,
                text.trim()
            ),
        ));
    }

    Ok(false)
}

/// Whether probe diagnostics contain a corruption marker.
pub fn looks_corrupted(diagnostics: &str) -> bool {
    CORRUPTION_MARKERS
        .iter()
        .any(|marker| diagnostics.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_match() {
        assert!(looks_corrupted("[mov,mp4] error reading header"));
        assert!(looks_corrupted(
            "clip.mp4: Invalid data found when processing input"
        ));
        assert!(!looks_corrupted("video\n"));
        assert!(!looks_corrupted(""));
    }

    #[test]
    fn marker_match_is_case_sensitive() {
        assert!(!looks_corrupted("Error"));
    }

    #[test]
    fn ffprobe_args_end_before_path() {
        let v = FfprobeValidator::new("/usr/bin/ffprobe", Duration::from_secs(5));
        assert_eq!(v.args.first().map(String::as_str), Some("-v"));
        assert_eq!(
            v.args.last().map(String::as_str),
            Some("default=noprint_wrappers=1:nokey=1")
        );
        assert_eq!(v.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn from_registry_requires_ffprobe() {
        let registry = ToolRegistry::default();
        assert!(FfprobeValidator::from_registry(&registry, Duration::from_secs(5)).is_err());
    }

    #[cfg(unix)]
    fn shell(script: &str, timeout: Duration) -> FfprobeValidator {
        // `sh -c <script> sh <path>`: the probed path arrives as $1.
        FfprobeValidator::with_command("sh", ["-c", script, "sh"], timeout)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clean_probe_is_not_corrupted() {
        let v = shell("echo video", Duration::from_secs(5));
        assert!(!v.is_corrupted(Path::new("clip.mp4")).await.unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn invalid_data_is_corrupted() {
        let v = shell(
            "echo \"$1: Invalid data found when processing input\" >&2; exit 1",
            Duration::from_secs(5),
        );
        assert!(v.is_corrupted(Path::new("clip.mp4")).await.unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn error_text_with_zero_exit_is_corrupted() {
        let v = shell("echo 'decode error at frame 12' >&2", Duration::from_secs(5));
        assert!(v.is_corrupted(Path::new("clip.mp4")).await.unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn silent_failure_is_an_error() {
        let v = shell("exit 3", Duration::from_secs(5));
        let err = v.is_corrupted(Path::new("clip.mp4")).await.unwrap_err();
        assert!(matches!(err, loopcast_core::Error::Tool { .. }));
        assert!(err.to_string().contains("clip.mp4"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_probe_is_not_corrupted() {
        let v = shell("sleep 10", Duration::from_millis(100));
        let started = std::time::Instant::now();
        let corrupted = v.is_corrupted(Path::new("clip.mp4")).await.unwrap();
        assert!(!corrupted);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        let v = FfprobeValidator::new("nonexistent_ffprobe_xyz", Duration::from_secs(1));
        assert!(v.is_corrupted(Path::new("clip.mp4")).await.is_err());
    }
}
