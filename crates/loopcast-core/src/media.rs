//! Media-domain types shared across crates.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// A remote video named in the asset manifest.
///
/// The name doubles as the local file name inside the managed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAsset {
    pub name: String,
    pub url: String,
}

impl RemoteAsset {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Last known verdict for one content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    pub corrupted: bool,
}

impl CacheEntry {
    pub fn new(hash: impl Into<String>, corrupted: bool) -> Self {
        Self {
            hash: hash.into(),
            corrupted,
        }
    }
}

/// A stream published by the supervisor, keyed by `stream_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamAssignment {
    pub stream_name: String,
    /// File name inside the managed directory.
    pub source_file: String,
}

impl StreamAssignment {
    /// Assignment under the name derived from the file name.
    pub fn derived(source_file: impl Into<String>) -> Self {
        let source_file = source_file.into();
        Self {
            stream_name: derive_stream_name(&source_file),
            source_file,
        }
    }
}

/// Lower-cased file name up to the first `.`.
///
/// `"Clip.Final.MP4"` becomes `"clip"`; a dot-less name is only lower-cased.
pub fn derive_stream_name(file_name: &str) -> String {
    file_name
        .split('.')
        .next()
        .unwrap_or(file_name)
        .to_lowercase()
}

/// How many manifest entries a fetch attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchLimit {
    /// Every entry.
    #[default]
    All,
    /// At most this many entries.
    AtMost(usize),
}

impl FetchLimit {
    /// Interpret the raw CLI form: `-1` means all, `n >= 0` caps at `n`.
    pub fn from_raw(raw: i64) -> Result<Self> {
        match raw {
            -1 => Ok(FetchLimit::All),
            n if n >= 0 => Ok(FetchLimit::AtMost(n as usize)),
            n => Err(Error::Validation(format!(
                "fetch limit must be -1 or non-negative, got {n}"
            ))),
        }
    }

    /// Number of entries attempted out of `total`.
    pub fn apply(self, total: usize) -> usize {
        match self {
            FetchLimit::All => total,
            FetchLimit::AtMost(n) => n.min(total),
        }
    }
}

impl fmt::Display for FetchLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchLimit::All => write!(f, "all"),
            FetchLimit::AtMost(n) => write!(f, "{n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_name_strips_extension_and_lowercases() {
        assert_eq!(derive_stream_name("VIRAT_S_000001.mp4"), "virat_s_000001");
        assert_eq!(derive_stream_name("Clip.Final.MP4"), "clip");
        assert_eq!(derive_stream_name("NoExt"), "noext");
    }

    #[test]
    fn derived_assignment_keeps_source_name() {
        let a = StreamAssignment::derived("Lobby.mkv");
        assert_eq!(a.stream_name, "lobby");
        assert_eq!(a.source_file, "Lobby.mkv");
    }

    #[test]
    fn cache_entry_json_shape() {
        let entry = CacheEntry::new("abc", true);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json, serde_json::json!({"hash": "abc", "corrupted": true}));
    }

    #[test]
    fn fetch_limit_from_raw() {
        assert_eq!(FetchLimit::from_raw(-1).unwrap(), FetchLimit::All);
        assert_eq!(FetchLimit::from_raw(0).unwrap(), FetchLimit::AtMost(0));
        assert_eq!(FetchLimit::from_raw(2).unwrap(), FetchLimit::AtMost(2));
        assert!(matches!(FetchLimit::from_raw(-2), Err(Error::Validation(_))));
    }

    #[test]
    fn fetch_limit_apply() {
        assert_eq!(FetchLimit::All.apply(5), 5);
        assert_eq!(FetchLimit::AtMost(2).apply(5), 2);
        assert_eq!(FetchLimit::AtMost(9).apply(5), 5);
    }
}
