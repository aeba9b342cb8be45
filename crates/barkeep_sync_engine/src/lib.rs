//! # Barkeep Sync Engine
//!
//! Offline-first mirroring of the appliance's local data against a remote
//! object store.
//!
//! This crate provides:
//! - Connectivity detection (network probe plus store probe)
//! - A persistent offline marker
//! - Local and remote asset inventories with presence-only diffing
//! - Single-object transfers and a bounded transfer worker pool
//! - The sync state machine driving all of the above
//! - An HTTP blob store for the production bucket
//!
//! ## Architecture
//!
//! Each call to [`SyncEngine::sync`] runs one cycle:
//! 1. Probe connectivity; offline cycles only set the marker
//! 2. Online with the marker set: push local documents and local-only assets,
//!    then clear the marker if every transfer succeeded
//! 3. Online without the marker: pull documents and remote-only assets
//!
//! ## Key Invariants
//!
//! - The marker is cleared only after a fully successful push
//! - Push uploads exactly local ∖ remote; pull downloads exactly remote ∖ local
//! - Assets present on both sides are never transferred
//! - At most `workers` transfers run at once
//! - Offline cycles never contact the remote store

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod credentials;
mod error;
mod http;
mod inventory;
mod manifest;
mod marker;
mod probe;
mod scheduler;
mod state;
mod store;
mod transfer;

pub use config::{SyncConfig, DEFAULT_SYNC_INTERVAL, DEFAULT_WORKERS};
pub use credentials::{decode_file, encode_file, Credentials, DEFAULT_ENDPOINT};
pub use error::{SyncError, SyncResult};
pub use http::{HttpBlobStore, HttpClient, HttpResponse, ReqwestClient};
pub use inventory::{
    is_asset_name, list_remote_assets, list_remote_keys, list_remote_keys_exist, local_asset_path,
    missing_from, scan_local_assets, validate_relative_path, AssetInventory, ASSET_EXTENSIONS,
};
pub use manifest::{DocumentEntry, DocumentManifest, EMPTY_DOCUMENT};
pub use marker::OfflineMarker;
pub use probe::{
    check_internet, check_remote_store, connectivity, ConnectivityState, NetworkProbe,
    StaticProbe, TcpProbe,
};
pub use scheduler::{BatchOutcome, TransferBatch, TransferScheduler};
pub use state::{SyncCycleResult, SyncEngine, SyncMode, SyncState, SyncStats, SyncStatus};
pub use store::{BlobStore, MemoryBlobStore};
pub use transfer::{TransferDirection, TransferExecutor, TransferTask};
