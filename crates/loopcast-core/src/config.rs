//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries the
//! sub-configs for managed paths, fetching, validation, restreaming, the media
//! server, and the listing endpoint. Every section defaults sensibly so a
//! completely empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

/// Locations searched by [`Config::load_or_default`] when no path is given.
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "./loopcast.toml",
    "~/.config/loopcast/config.toml",
    "/etc/loopcast/config.toml",
];

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub fetch: FetchConfig,
    pub validator: ValidatorConfig,
    pub tools: ToolsConfig,
    pub restream: RestreamConfig,
    pub media_server: MediaServerConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file, failing if it is unreadable or malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::file(path, e))?;
        Self::from_toml(&contents)
            .map_err(|e| Error::Validation(format!("{}: {e}", path.display())))
    }

    /// Load configuration from `path` if given, otherwise from the first
    /// default location that exists, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        for candidate in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(candidate);
            let candidate = Path::new(expanded.as_ref());
            if candidate.exists() {
                tracing::info!("Loading config from {}", candidate.display());
                return Self::load(candidate);
            }
        }

        tracing::debug!("No config file found; using defaults");
        Ok(Self::default())
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.fetch.concurrency == 0 {
            warnings.push("fetch.concurrency is 0; downloads will use 1 slot".into());
        }

        if self.validator.timeout_secs == 0 {
            warnings.push(
                "validator.timeout_secs is 0; every check will time out and pass".into(),
            );
        }

        if self.media_server.ready_marker.trim().is_empty() {
            warnings.push("media_server.ready_marker is empty; any output line means ready".into());
        }

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if !self.restream.target_base.contains("://") {
            warnings.push(format!(
                "restream.target_base '{}' has no URL scheme",
                self.restream.target_base
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Locations of the managed files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding downloaded assets; scanned non-recursively.
    pub video_dir: PathBuf,
    /// Validity cache file.
    pub cache_file: PathBuf,
    /// Asset manifest (JSON object of name -> URL).
    pub manifest: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            video_dir: PathBuf::from("Video"),
            cache_file: PathBuf::from("cache.json"),
            manifest: PathBuf::from("dataset.json"),
        }
    }
}

/// Download coordinator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub concurrency: usize,
    pub progress_interval_secs: u64,
    pub user_agent: String,
}

impl FetchConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            progress_interval_secs: 5,
            user_agent: format!("loopcast/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Corruption check settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub timeout_secs: u64,
}

impl ValidatorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self { timeout_secs: 5 }
    }
}

/// Custom paths for external tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Loop re-stream encoding and publishing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestreamConfig {
    /// Base URL streams are published under, e.g. `rtsp://localhost:8554`.
    pub target_base: String,
    pub rtsp_transport: String,
    pub video_codec: String,
    pub audio_codec: String,
    /// GOP size and minimum keyframe interval, in frames.
    pub gop: u32,
    /// Stream name used in single-stream mode.
    pub single_stream_name: String,
}

impl Default for RestreamConfig {
    fn default() -> Self {
        Self {
            target_base: "rtsp://localhost:8554".into(),
            rtsp_transport: "tcp".into(),
            video_codec: "libx264".into(),
            audio_codec: "aac".into(),
            gop: 50,
            single_stream_name: "mystream".into(),
        }
    }
}

/// Media server subprocess settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaServerConfig {
    pub command: PathBuf,
    pub args: Vec<String>,
    /// Substring of a stdout line that signals the server is ready.
    pub ready_marker: String,
    pub ready_timeout_secs: u64,
}

impl MediaServerConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

impl Default for MediaServerConfig {
    fn default() -> Self {
        Self {
            command: PathBuf::from("./mediamtx/mediamtx"),
            args: Vec::new(),
            ready_marker: "[SRT] listener opened on :8890 (UDP)".into(),
            ready_timeout_secs: 30,
        }
    }
}

/// Stream listing HTTP endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}
