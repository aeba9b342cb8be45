//! Remote object store abstraction.

use crate::error::{SyncError, SyncResult};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A remote blob store holding the mirrored documents and assets.
///
/// This trait abstracts the storage service, allowing for different
/// implementations (HTTP object storage, in-memory for testing, etc.).
/// Implementations must be shareable across transfer workers.
pub trait BlobStore: Send + Sync {
    /// Lists keys starting with `prefix`.
    ///
    /// `max_results` bounds the number of keys returned; `None` lists
    /// everything.
    fn list(&self, prefix: &str, max_results: Option<u32>) -> SyncResult<Vec<String>>;

    /// Downloads the object stored under `key`.
    fn download(&self, key: &str) -> SyncResult<Vec<u8>>;

    /// Uploads `data` under `key`, replacing any existing object.
    fn upload(&self, key: &str, data: Vec<u8>) -> SyncResult<()>;
}

impl<S: BlobStore + ?Sized> BlobStore for std::sync::Arc<S> {
    fn list(&self, prefix: &str, max_results: Option<u32>) -> SyncResult<Vec<String>> {
        (**self).list(prefix, max_results)
    }

    fn download(&self, key: &str) -> SyncResult<Vec<u8>> {
        (**self).download(key)
    }

    fn upload(&self, key: &str, data: Vec<u8>) -> SyncResult<()> {
        (**self).upload(key, data)
    }
}

/// An in-memory blob store for testing.
///
/// Supports failure injection (whole-store outage, per-key upload and
/// download failures) and counts every call so tests can assert on the
/// traffic a sync cycle produced.
#[derive(Debug)]
pub struct MemoryBlobStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    reachable: AtomicBool,
    failing_uploads: RwLock<BTreeSet<String>>,
    failing_downloads: RwLock<BTreeSet<String>>,
    list_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    download_calls: AtomicUsize,
}

impl MemoryBlobStore {
    /// Creates a new, empty, reachable store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            reachable: AtomicBool::new(true),
            failing_uploads: RwLock::new(BTreeSet::new()),
            failing_downloads: RwLock::new(BTreeSet::new()),
            list_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
        }
    }

    /// Inserts an object directly, bypassing counters and failure injection.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.objects.write().insert(key.into(), data.into());
    }

    /// Returns a copy of the object under `key`.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().get(key).cloned()
    }

    /// Returns true if an object exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().contains_key(key)
    }

    /// Returns all keys currently stored.
    pub fn keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    /// Makes every call fail as if the store were down.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Makes uploads of `key` fail.
    pub fn fail_upload(&self, key: impl Into<String>) {
        self.failing_uploads.write().insert(key.into());
    }

    /// Makes downloads of `key` fail.
    pub fn fail_download(&self, key: impl Into<String>) {
        self.failing_downloads.write().insert(key.into());
    }

    /// Removes all injected per-key failures.
    pub fn clear_failures(&self) {
        self.failing_uploads.write().clear();
        self.failing_downloads.write().clear();
    }

    /// Number of `list` calls so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `upload` calls so far.
    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    /// Number of `download` calls so far.
    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    /// Resets all call counters to zero.
    pub fn reset_counters(&self) {
        self.list_calls.store(0, Ordering::SeqCst);
        self.upload_calls.store(0, Ordering::SeqCst);
        self.download_calls.store(0, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> SyncResult<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::Connectivity("memory store unreachable".into()))
        }
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for MemoryBlobStore {
    fn list(&self, prefix: &str, max_results: Option<u32>) -> SyncResult<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;

        let limit = max_results.map_or(usize::MAX, |n| n as usize);
        Ok(self
            .objects
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .take(limit)
            .cloned()
            .collect())
    }

    fn download(&self, key: &str) -> SyncResult<Vec<u8>> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;

        if self.failing_downloads.read().contains(key) {
            return Err(SyncError::store_retryable(format!(
                "injected download failure for {key}"
            )));
        }
        self.get(key)
            .ok_or_else(|| SyncError::NotFound(key.to_string()))
    }

    fn upload(&self, key: &str, data: Vec<u8>) -> SyncResult<()> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;

        if self.failing_uploads.read().contains(key) {
            return Err(SyncError::store_retryable(format!(
                "injected upload failure for {key}"
            )));
        }
        self.insert(key, data);
        Ok(())
    }
}
