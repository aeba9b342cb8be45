//! CLI command implementations.

pub mod credentials;
pub mod init;
pub mod status;
pub mod sync;
pub mod transfer;

use crate::error::CliResult;
use barkeep_sync_engine::{
    Credentials, HttpBlobStore, ReqwestClient, SyncConfig, SyncEngine, TcpProbe,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Engine wired to the production store and network probe.
pub type Engine = SyncEngine<HttpBlobStore<ReqwestClient>, TcpProbe>;

/// Settings shared by every engine-backed command.
#[derive(Debug, Clone)]
pub struct Context {
    /// Sync root directory.
    pub root: PathBuf,
    /// Encoded credentials file.
    pub credentials: PathBuf,
    /// Transfer worker count override.
    pub workers: Option<usize>,
    /// Pause between `watch` cycles.
    pub sync_interval: Option<Duration>,
}

impl Context {
    /// Builds the sync configuration for this invocation.
    pub fn config(&self) -> SyncConfig {
        let mut config = SyncConfig::new(&self.root);
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if let Some(interval) = self.sync_interval {
            config = config.with_sync_interval(interval);
        }
        config
    }

    /// Loads credentials and starts an engine.
    pub fn engine(&self) -> CliResult<Engine> {
        let credentials = Credentials::load(&resolve(&self.root, &self.credentials))?;
        debug!(bucket = %credentials.bucket, "credentials loaded");
        Ok(SyncEngine::from_credentials(self.config(), &credentials)?)
    }
}

/// Resolves a relative credentials path against the sync root.
fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
