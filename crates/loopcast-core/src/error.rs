//! Unified error type for loopcast.
//!
//! Every library failure funnels into [`Error`]. Variants that originate from
//! a specific file, URL, or tool carry it so fatal errors can be diagnosed
//! from the message alone.

use std::fmt;
use std::path::{Path, PathBuf};

/// Unified error type covering all failure modes in loopcast.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O operation failed without a known path.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An I/O operation on a specific file or directory failed.
    #[error("IO error at {}: {source}", path.display())]
    File {
        /// The path being read, written, or removed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An external tool (ffmpeg, ffprobe, media server) failed.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// An HTTP transfer failed.
    #[error("HTTP error [{url}]: {message}")]
    Http {
        /// The URL being fetched.
        url: String,
        /// Human-readable error description.
        message: String,
    },

    /// The asset manifest could not be read or parsed.
    #[error("Manifest error [{}]: {message}", path.display())]
    Manifest {
        /// Manifest file path.
        path: PathBuf,
        /// Human-readable error description.
        message: String,
    },

    /// The validity cache could not be read or written.
    #[error("Cache error [{}]: {message}", path.display())]
    Cache {
        /// Cache file path.
        path: PathBuf,
        /// Human-readable error description.
        message: String,
    },

    /// Input or configuration failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A supervised server never reported readiness.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::File`].
    pub fn file(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::File {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Http`].
    pub fn http(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::Http {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Cache`].
    pub fn cache(path: impl AsRef<Path>, message: impl fmt::Display) -> Self {
        Error::Cache {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Manifest`].
    pub fn manifest(path: impl AsRef<Path>, message: impl fmt::Display) -> Self {
        Error::Manifest {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
