//! Loop re-stream command construction.
//!
//! A [`RestreamLauncher`] turns a source file and a stream name into a ready
//! to spawn process. [`FfmpegRestream`] re-encodes the file in an endless
//! loop at native frame rate and publishes it to the media server.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use loopcast_core::config::RestreamConfig;

use crate::tools::ToolRegistry;

/// Builds the subprocess that publishes one looping stream.
pub trait RestreamLauncher: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Command publishing `source` under `stream_name`. Stdio is configured
    /// by the caller.
    fn command(&self, source: &Path, stream_name: &str) -> Command;
}

/// ffmpeg-based loop re-streamer.
#[derive(Debug, Clone)]
pub struct FfmpegRestream {
    ffmpeg: PathBuf,
    config: RestreamConfig,
}

impl FfmpegRestream {
    pub fn new(ffmpeg: impl Into<PathBuf>, config: RestreamConfig) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            config,
        }
    }

    /// Use the ffmpeg found by `registry`.
    pub fn from_registry(
        registry: &ToolRegistry,
        config: RestreamConfig,
    ) -> loopcast_core::Result<Self> {
        Ok(Self::new(registry.require("ffmpeg")?, config))
    }

    /// Publish URL for a stream, e.g. `rtsp://localhost:8554/lobby`.
    pub fn target_url(&self, stream_name: &str) -> String {
        format!(
            "{}/{}",
            self.config.target_base.trim_end_matches('/'),
            stream_name
        )
    }

    /// Muxer matching the target URL scheme.
    fn output_format(&self) -> &'static str {
        let base = self.config.target_base.as_str();
        if base.starts_with("srt://") {
            "mpegts"
        } else if base.starts_with("rtmp://") {
            "flv"
        } else {
            "rtsp"
        }
    }

    /// Build ffmpeg arguments.
    pub fn args(&self, source: &Path, stream_name: &str) -> Vec<String> {
        let cfg = &self.config;
        let gop = cfg.gop.to_string();
        let mut args: Vec<String> = Vec::new();

        // Read at native rate, loop forever.
        args.extend(["-re", "-stream_loop", "-1", "-i"].map(String::from));
        args.push(source.to_string_lossy().to_string());

        args.push("-c:v".into());
        args.push(cfg.video_codec.clone());
        if cfg.video_codec == "libx264" {
            // No B-frames keeps RTSP clients from stalling on reordering.
            args.extend(["-x264opts", "bframes=0"].map(String::from));
        }
        args.extend(["-g".to_string(), gop.clone(), "-keyint_min".to_string(), gop]);

        args.push("-c:a".into());
        args.push(cfg.audio_codec.clone());

        let format = self.output_format();
        args.push("-f".into());
        args.push(format.into());
        if format == "rtsp" {
            args.push("-rtsp_transport".into());
            args.push(cfg.rtsp_transport.clone());
        }

        args.push(self.target_url(stream_name));
        args
    }
}

impl RestreamLauncher for FfmpegRestream {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn command(&self, source: &Path, stream_name: &str) -> Command {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(self.args(source, stream_name))
            .stdin(Stdio::null());
        cmd
    }
}
