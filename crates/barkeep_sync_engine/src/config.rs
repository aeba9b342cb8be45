//! Configuration for the sync engine.

use crate::manifest::DocumentManifest;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of concurrent transfer workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Default pause between recurring sync cycles.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Local directory mirrored against the remote store.
    pub root: PathBuf,
    /// Size of the transfer worker pool.
    pub workers: usize,
    /// Host used for the raw connectivity probe.
    pub probe_host: String,
    /// Port used for the raw connectivity probe.
    pub probe_port: u16,
    /// Upper bound for the connectivity probe.
    pub probe_timeout: Duration,
    /// Fixed documents transferred on every cycle.
    pub manifest: DocumentManifest,
    /// Asset directory, relative to `root`.
    pub asset_dir: PathBuf,
    /// Remote prefix under which assets live.
    pub asset_prefix: String,
    /// Remote prefix under which fixed documents live.
    pub document_prefix: String,
    /// Offline marker file name, relative to `root`.
    pub marker_file: PathBuf,
    /// Pause between cycles of [`run_periodic`](crate::SyncEngine::run_periodic).
    pub sync_interval: Duration,
}

impl SyncConfig {
    /// Creates a configuration with appliance defaults for the given root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            workers: DEFAULT_WORKERS,
            probe_host: "8.8.8.8".into(),
            probe_port: 53,
            probe_timeout: Duration::from_secs(3),
            manifest: DocumentManifest::default(),
            asset_dir: PathBuf::from("assets"),
            asset_prefix: "img/".into(),
            document_prefix: "data/".into(),
            marker_file: PathBuf::from("offline.marker"),
            sync_interval: DEFAULT_SYNC_INTERVAL,
        }
    }

    /// Sets the worker pool size (at least one worker is always used).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Sets the connectivity probe target.
    pub fn with_probe_target(mut self, host: impl Into<String>, port: u16) -> Self {
        self.probe_host = host.into();
        self.probe_port = port;
        self
    }

    /// Sets the connectivity probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Replaces the document manifest.
    pub fn with_manifest(mut self, manifest: DocumentManifest) -> Self {
        self.manifest = manifest;
        self
    }

    /// Sets the local asset directory.
    pub fn with_asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.asset_dir = dir.into();
        self
    }

    /// Sets the remote asset prefix. A trailing `/` is added if missing.
    pub fn with_asset_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.asset_prefix = normalize_prefix(prefix.into());
        self
    }

    /// Sets the remote document prefix. A trailing `/` is added if missing.
    pub fn with_document_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.document_prefix = normalize_prefix(prefix.into());
        self
    }

    /// Sets the offline marker file, relative to the root.
    pub fn with_marker_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.marker_file = file.into();
        self
    }

    /// Sets the interval for recurring sync.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Returns the absolute asset directory.
    pub fn asset_root(&self) -> PathBuf {
        self.root.join(&self.asset_dir)
    }

    /// Returns the absolute offline marker path.
    pub fn marker_path(&self) -> PathBuf {
        self.root.join(&self.marker_file)
    }

    /// Returns the sync root.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

fn normalize_prefix(prefix: String) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix
    } else {
        format!("{prefix}/")
    }
}
