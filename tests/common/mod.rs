//! Shared fixtures for integration tests.
//!
//! Provides [`CountingValidator`], a [`Validator`] whose verdicts (or errors)
//! are decided by file name and which records every call, plus helpers for populating a
//! temporary video directory.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use loopcast_av::Validator;
use loopcast_core::{Error, Result};

/// Validator that marks files corrupted by name and counts invocations.
#[derive(Default)]
pub struct CountingValidator {
    corrupted: Mutex<HashSet<String>>,
    failing: HashSet<String>,
    calls: AtomicUsize,
    checked: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl CountingValidator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Validator that reports every name in `names` as corrupted.
    pub fn corrupting(names: &[&str]) -> Arc<Self> {
        let v = Self::default();
        v.corrupted
            .lock()
            .extend(names.iter().map(|n| n.to_string()));
        Arc::new(v)
    }

    /// Validator whose check errors for every name in `names`.
    pub fn failing(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            failing: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        })
    }

    /// Validator that sleeps for `delay` on every call.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn mark_corrupted(&self, name: &str) {
        self.corrupted.lock().insert(name.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// File names checked so far, in call order.
    pub fn checked(&self) -> Vec<String> {
        self.checked.lock().clone()
    }
}

#[async_trait]
impl Validator for CountingValidator {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn is_corrupted(&self, path: &Path) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.checked.lock().push(name.clone());
        if self.failing.contains(&name) {
            return Err(Error::tool("counting", format!("cannot inspect {name}")));
        }
        Ok(self.corrupted.lock().contains(&name))
    }
}

/// Temporary workspace with a video directory and a cache path.
pub struct Workspace {
    pub root: TempDir,
    pub video_dir: PathBuf,
    pub cache_file: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("failed to create temp dir");
        let video_dir = root.path().join("Video");
        std::fs::create_dir(&video_dir).expect("failed to create video dir");
        let cache_file = root.path().join("cache.json");
        Self {
            root,
            video_dir,
            cache_file,
        }
    }

    /// Write a file into the video directory.
    pub fn add_video(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.video_dir.join(name);
        std::fs::write(&path, content).expect("failed to write video");
        path
    }
}
