//! Asset manifest: the `{name: url}` JSON object listing remote videos.

use std::collections::BTreeMap;
use std::path::Path;

use loopcast_core::{Error, RemoteAsset, Result};

/// Remote assets ordered by name.
///
/// The on-disk form is an unordered JSON object; reading it into a sorted
/// sequence makes "the first N assets" the same on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetManifest {
    assets: Vec<RemoteAsset>,
}

impl AssetManifest {
    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| Error::manifest(path, e))?;
        Self::from_json(&data).map_err(|e| match e {
            Error::Validation(msg) => Error::manifest(path, msg),
            other => other,
        })
    }

    /// Parse the JSON object form.
    pub fn from_json(json: &str) -> Result<Self> {
        let map: BTreeMap<String, String> = serde_json::from_str(json)
            .map_err(|e| Error::Validation(format!("invalid asset manifest: {e}")))?;
        Ok(map.into_iter().collect())
    }

    pub fn assets(&self) -> &[RemoteAsset] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl FromIterator<(String, String)> for AssetManifest {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut assets: Vec<RemoteAsset> = iter
            .into_iter()
            .map(|(name, url)| RemoteAsset::new(name, url))
            .collect();
        assets.sort_by(|a, b| a.name.cmp(&b.name));
        assets.dedup_by(|later, earlier| later.name == earlier.name);
        Self { assets }
    }
}
