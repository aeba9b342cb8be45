//! Sync engine state machine.

use crate::config::SyncConfig;
use crate::credentials::Credentials;
use crate::error::SyncResult;
use crate::http::{HttpBlobStore, ReqwestClient};
use crate::inventory::{
    list_remote_assets, list_remote_keys_exist, local_asset_path, missing_from,
    scan_local_assets, AssetInventory,
};
use crate::marker::OfflineMarker;
use crate::probe::{self, ConnectivityState, NetworkProbe, TcpProbe};
use crate::scheduler::{BatchOutcome, TransferBatch, TransferScheduler};
use crate::store::BlobStore;
use crate::transfer::{TransferExecutor, TransferTask};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// The last observed state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncState {
    /// No cycle has run yet.
    Idle,
    /// Checking connectivity.
    Probing,
    /// The last cycle found the appliance offline.
    Offline,
    /// Pushing offline changes to the remote store.
    Pushing,
    /// Pulling the latest state from the remote store.
    Pulling,
    /// The last cycle completed online.
    Synced,
}

impl SyncState {
    /// Returns true if a cycle is in progress.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncState::Probing | SyncState::Pushing | SyncState::Pulling
        )
    }
}

/// The branch a cycle took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncMode {
    /// Offline: the marker was set, nothing was transferred.
    Offline,
    /// Online with a pending offline episode: local changes were pushed.
    Push,
    /// Online with nothing pending: the remote state was pulled.
    Pull,
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Total number of sync cycles completed.
    pub cycles_completed: u64,
    /// Cycles that found the appliance offline.
    pub offline_cycles: u64,
    /// Total number of files uploaded.
    pub files_uploaded: u64,
    /// Total number of files downloaded.
    pub files_downloaded: u64,
    /// Total number of failed transfers.
    pub failed_transfers: u64,
    /// Last sync time.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Result of a sync cycle.
#[derive(Debug, Clone)]
pub struct SyncCycleResult {
    /// Branch taken.
    pub mode: SyncMode,
    /// Aggregated transfer outcome (empty when offline).
    pub outcome: BatchOutcome,
    /// Whether the offline marker is set after the cycle.
    pub marker_set: bool,
    /// Whether the cycle completed without any failure.
    pub success: bool,
    /// Duration of the sync cycle.
    pub duration: Duration,
}

/// Snapshot of local and remote state, for operators.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    /// Whether the network and store were reachable.
    pub online: bool,
    /// Whether offline changes are pending push.
    pub marker_set: bool,
    /// Fixed documents present locally (logical names).
    pub local_documents: Vec<String>,
    /// Fixed documents present remotely (logical names).
    pub remote_documents: Vec<String>,
    /// Number of local assets.
    pub local_assets: usize,
    /// Number of remote assets.
    pub remote_assets: usize,
    /// Assets that a push would upload.
    pub pending_upload: Vec<String>,
    /// Assets that a pull would download.
    pub pending_download: Vec<String>,
}

/// The sync engine mirrors the sync root against a remote blob store.
///
/// One engine is built per process with its store, probe, marker and worker
/// pool; all operations go through it. `sync` must not be called
/// concurrently with itself.
pub struct SyncEngine<S: BlobStore, N: NetworkProbe> {
    config: SyncConfig,
    store: Arc<S>,
    network: N,
    marker: OfflineMarker,
    executor: TransferExecutor<S>,
    scheduler: TransferScheduler,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
}

impl SyncEngine<HttpBlobStore<ReqwestClient>, TcpProbe> {
    /// Creates an engine talking to the production object store.
    ///
    /// # Errors
    ///
    /// Fails if the credentials are unusable or the worker pool cannot start.
    pub fn from_credentials(config: SyncConfig, credentials: &Credentials) -> SyncResult<Self> {
        let store = HttpBlobStore::from_credentials(credentials)?;
        let probe = TcpProbe::new(
            config.probe_host.clone(),
            config.probe_port,
            config.probe_timeout,
        );
        Self::new(config, store, probe)
    }
}

impl<S: BlobStore + 'static, N: NetworkProbe> SyncEngine<S, N> {
    /// Creates a new sync engine.
    ///
    /// # Errors
    ///
    /// Fails if the worker pool cannot start.
    pub fn new(config: SyncConfig, store: S, network: N) -> SyncResult<Self> {
        Self::with_shared_store(config, Arc::new(store), network)
    }

    /// Creates a new sync engine over a store shared with the caller.
    pub fn with_shared_store(config: SyncConfig, store: Arc<S>, network: N) -> SyncResult<Self> {
        let scheduler = TransferScheduler::new(config.workers)?;
        let marker = OfflineMarker::new(config.marker_path());
        let executor = TransferExecutor::new(Arc::clone(&store));

        Ok(Self {
            config,
            store,
            network,
            marker,
            executor,
            scheduler,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
        })
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Gets the remote store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Gets the offline marker.
    pub fn marker(&self) -> &OfflineMarker {
        &self.marker
    }

    /// Gets the last observed state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Returns true if the raw network probe succeeds.
    pub fn check_internet(&self) -> bool {
        self.network.check_internet()
    }

    /// Returns true if the remote store answers a minimal listing.
    pub fn check_remote_store(&self) -> bool {
        probe::check_remote_store(self.store.as_ref(), &self.config.document_prefix)
    }

    /// Derives connectivity for this moment. Never cached.
    pub fn connectivity(&self) -> ConnectivityState {
        probe::connectivity(
            &self.network,
            self.store.as_ref(),
            &self.config.document_prefix,
        )
    }

    /// Returns true if both the network and the remote store are reachable.
    pub fn is_online(&self) -> bool {
        self.connectivity().is_online()
    }

    /// Creates any missing fixed document as an empty JSON array.
    pub fn initialize_files(&self) -> bool {
        match self.config.manifest.initialize(&self.config.root) {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "failed to initialize documents");
                false
            }
        }
    }

    /// Performs one orchestration cycle.
    ///
    /// | connectivity | marker | action                                   |
    /// |--------------|--------|------------------------------------------|
    /// | offline      | any    | set marker                               |
    /// | online       | set    | push documents and local-only assets     |
    /// | online       | clear  | pull documents and remote-only assets    |
    ///
    /// The marker is cleared only after a push batch fully succeeds.
    pub fn sync(&self) -> SyncCycleResult {
        let start = Instant::now();

        self.set_state(SyncState::Probing);
        let connectivity = self.connectivity();
        debug!(?connectivity, "connectivity probed");

        let mut result = match connectivity {
            ConnectivityState::Offline => self.handle_offline(),
            ConnectivityState::Online if self.marker.is_marked() => self.reconcile_push(),
            ConnectivityState::Online => self.refresh_pull(),
        };
        result.duration = start.elapsed();

        self.record_cycle(&result);
        result
    }

    fn handle_offline(&self) -> SyncCycleResult {
        self.set_state(SyncState::Offline);

        let mut success = true;
        if let Err(e) = self.marker.mark() {
            // Retried on the next cycle.
            error!(error = %e, "failed to set offline marker");
            success = false;
        }
        success &= self.initialize_files();
        info!("appliance is offline; changes will be pushed on reconnect");

        SyncCycleResult {
            mode: SyncMode::Offline,
            outcome: BatchOutcome::default(),
            marker_set: self.marker.is_marked(),
            success,
            duration: Duration::ZERO,
        }
    }

    fn reconcile_push(&self) -> SyncCycleResult {
        self.set_state(SyncState::Pushing);
        info!("offline changes pending; pushing local state");

        let outcome = self.push(true, true);
        let mut success = outcome.success();

        if success {
            match self.marker.clear() {
                Ok(()) => info!("offline changes pushed; marker cleared"),
                Err(e) => {
                    error!(error = %e, "failed to clear offline marker");
                    success = false;
                }
            }
        } else {
            warn!(
                failed = outcome.failed.len(),
                "push incomplete; marker kept for retry"
            );
        }
        self.set_state(SyncState::Synced);

        SyncCycleResult {
            mode: SyncMode::Push,
            outcome,
            marker_set: self.marker.is_marked(),
            success,
            duration: Duration::ZERO,
        }
    }

    fn refresh_pull(&self) -> SyncCycleResult {
        self.set_state(SyncState::Pulling);
        debug!("nothing pending; pulling remote state");

        let outcome = self.pull(true, true);
        // Documents missing remotely still need a local placeholder.
        let initialized = self.initialize_files();
        let success = outcome.success() && initialized;
        self.set_state(SyncState::Synced);

        SyncCycleResult {
            mode: SyncMode::Pull,
            outcome,
            marker_set: self.marker.is_marked(),
            success,
            duration: Duration::ZERO,
        }
    }

    /// Uploads documents and/or local-only assets. Returns false when offline.
    ///
    /// The offline marker is not touched.
    pub fn upload_all(&self, documents: bool, assets: bool) -> bool {
        if !self.is_online() {
            warn!("cannot upload: appliance is offline");
            return false;
        }
        let outcome = self.push(documents, assets);
        self.record_transfers(&outcome);
        outcome.success()
    }

    /// Downloads documents and/or remote-only assets. Returns false when
    /// offline.
    pub fn download_all(&self, documents: bool, assets: bool) -> bool {
        if !self.is_online() {
            warn!("cannot download: appliance is offline");
            return false;
        }
        let outcome = self.pull(documents, assets);
        self.record_transfers(&outcome);
        let initialized = self.initialize_files();
        outcome.success() && initialized
    }

    /// Reconciles assets in both directions in one batch. Returns false when
    /// offline.
    pub fn sync_assets(&self) -> bool {
        if !self.is_online() {
            warn!("cannot sync assets: appliance is offline");
            return false;
        }
        let outcome = match self.asset_inventories() {
            Ok((local, remote)) => {
                let batch: TransferBatch = self
                    .asset_upload_tasks(&local, &remote)
                    .into_iter()
                    .chain(self.asset_download_tasks(&remote, &local))
                    .collect();
                self.scheduler.run(&self.executor, batch)
            }
            Err(_) => self.skipped_assets(),
        };
        self.record_transfers(&outcome);
        outcome.success()
    }

    /// Calls [`sync`](Self::sync) every configured
    /// [`sync_interval`](SyncConfig::sync_interval), `cycles` times or forever.
    ///
    /// Returns the number of cycles run.
    pub fn run_periodic(&self, cycles: Option<u64>) -> u64 {
        let interval = self.config.sync_interval;
        let mut completed = 0u64;
        loop {
            let result = self.sync();
            completed += 1;
            debug!(cycle = completed, mode = ?result.mode, success = result.success, "periodic sync");

            if cycles.is_some_and(|max| completed >= max) {
                return completed;
            }
            std::thread::sleep(interval);
        }
    }

    /// Collects a status snapshot. Remote fields stay empty when offline.
    pub fn status(&self) -> SyncStatus {
        let online = self.is_online();
        let manifest = &self.config.manifest;

        let local_documents = manifest
            .entries()
            .iter()
            .filter(|e| e.path_in(&self.config.root).is_file())
            .map(|e| e.name.clone())
            .collect();

        let local = match self.local_assets() {
            Ok(local) => Some(local),
            Err(e) => {
                warn!(error = %e, "local asset scan failed; asset diff unavailable");
                None
            }
        };
        let (remote_documents, remote) = if online {
            let present = list_remote_keys_exist(
                self.store.as_ref(),
                &self.config.document_prefix,
                manifest.entries().iter().map(|e| e.remote_key.as_str()),
            );
            let names = manifest
                .entries()
                .iter()
                .filter(|e| present.contains(&e.remote_key))
                .map(|e| e.name.clone())
                .collect();
            (names, self.remote_assets())
        } else {
            (Vec::new(), AssetInventory::new())
        };

        let (pending_upload, pending_download) = match &local {
            Some(local) if online => (missing_from(local, &remote), missing_from(&remote, local)),
            Some(local) => (local.iter().cloned().collect(), Vec::new()),
            None => (Vec::new(), Vec::new()),
        };

        SyncStatus {
            online,
            marker_set: self.marker.is_marked(),
            local_documents,
            remote_documents,
            local_assets: local.as_ref().map_or(0, |local| local.len()),
            remote_assets: remote.len(),
            pending_upload,
            pending_download,
        }
    }

    fn push(&self, documents: bool, assets: bool) -> BatchOutcome {
        let mut batch = TransferBatch::new();
        if documents {
            batch.extend(self.document_upload_tasks());
        }
        let inventories = assets.then(|| self.asset_inventories());
        if let Some(Ok((local, remote))) = &inventories {
            batch.extend(self.asset_upload_tasks(local, remote));
        }

        let mut outcome = self.scheduler.run(&self.executor, batch);
        if let Some(Err(_)) = inventories {
            outcome.merge(self.skipped_assets());
        }
        outcome
    }

    fn pull(&self, documents: bool, assets: bool) -> BatchOutcome {
        let mut batch = TransferBatch::new();
        if documents {
            batch.extend(self.document_download_tasks());
        }
        let inventories = assets.then(|| self.asset_inventories());
        if let Some(Ok((local, remote))) = &inventories {
            batch.extend(self.asset_download_tasks(remote, local));
        }

        let mut outcome = self.scheduler.run(&self.executor, batch);
        if let Some(Err(_)) = inventories {
            outcome.merge(self.skipped_assets());
        }
        outcome
    }

    fn document_upload_tasks(&self) -> Vec<TransferTask> {
        self.config
            .manifest
            .entries()
            .iter()
            .filter_map(|entry| {
                let path = entry.path_in(&self.config.root);
                if path.is_file() {
                    Some(TransferTask::upload(path, entry.remote_key.clone()))
                } else {
                    debug!(document = %entry.name, "document absent locally; not uploading");
                    None
                }
            })
            .collect()
    }

    fn document_download_tasks(&self) -> Vec<TransferTask> {
        self.config
            .manifest
            .entries()
            .iter()
            .map(|entry| {
                TransferTask::download(entry.remote_key.clone(), entry.path_in(&self.config.root))
            })
            .collect()
    }

    fn asset_upload_tasks(
        &self,
        local: &AssetInventory,
        remote: &AssetInventory,
    ) -> Vec<TransferTask> {
        let asset_root = self.config.asset_root();
        missing_from(local, remote)
            .into_iter()
            .map(|relative| {
                TransferTask::upload(
                    local_asset_path(&asset_root, &relative),
                    format!("{}{relative}", self.config.asset_prefix),
                )
            })
            .collect()
    }

    fn asset_download_tasks(
        &self,
        remote: &AssetInventory,
        local: &AssetInventory,
    ) -> Vec<TransferTask> {
        let asset_root = self.config.asset_root();
        missing_from(remote, local)
            .into_iter()
            .map(|relative| {
                TransferTask::download(
                    format!("{}{relative}", self.config.asset_prefix),
                    local_asset_path(&asset_root, &relative),
                )
            })
            .collect()
    }

    fn local_assets(&self) -> SyncResult<AssetInventory> {
        scan_local_assets(&self.config.asset_root())
    }

    /// Local and remote inventories. A failed local scan skips the remote
    /// listing; the asset category is then reported as failed, never empty.
    fn asset_inventories(&self) -> SyncResult<(AssetInventory, AssetInventory)> {
        let local = self
            .local_assets()
            .inspect_err(|e| error!(error = %e, "local asset scan failed; skipping assets"))?;
        Ok((local, self.remote_assets()))
    }

    fn skipped_assets(&self) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        outcome.record_skipped(self.config.asset_prefix.clone());
        outcome
    }

    fn remote_assets(&self) -> AssetInventory {
        list_remote_assets(self.store.as_ref(), &self.config.asset_prefix)
    }

    fn record_transfers(&self, outcome: &BatchOutcome) {
        let mut stats = self.stats.write();
        stats.files_uploaded += outcome.uploaded as u64;
        stats.files_downloaded += outcome.downloaded as u64;
        stats.failed_transfers += outcome.failed.len() as u64;
        if !outcome.failed.is_empty() {
            stats.last_error = Some(format!("transfers failed: {}", outcome.failed.join(", ")));
        }
    }

    fn record_cycle(&self, result: &SyncCycleResult) {
        self.record_transfers(&result.outcome);

        let mut stats = self.stats.write();
        stats.cycles_completed += 1;
        if result.mode == SyncMode::Offline {
            stats.offline_cycles += 1;
        }
        stats.last_sync_time = Some(Instant::now());
        if result.success {
            stats.last_error = None;
        } else if stats.last_error.is_none() {
            stats.last_error = Some(format!("{:?} cycle did not complete", result.mode));
        }
    }
}
