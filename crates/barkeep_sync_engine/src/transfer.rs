//! Single-object transfers between local disk and the remote store.

use crate::error::{SyncError, SyncResult};
use crate::store::BlobStore;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Local file to remote key.
    Upload,
    /// Remote key to local file.
    Download,
}

/// One unit of transfer work.
///
/// Tasks are immutable once built and are owned by the worker executing
/// them. Tasks in one batch never share a local path or a remote key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    direction: TransferDirection,
    local_path: PathBuf,
    remote_key: String,
}

impl TransferTask {
    /// Creates an upload task.
    pub fn upload(local_path: impl Into<PathBuf>, remote_key: impl Into<String>) -> Self {
        Self {
            direction: TransferDirection::Upload,
            local_path: local_path.into(),
            remote_key: remote_key.into(),
        }
    }

    /// Creates a download task.
    pub fn download(remote_key: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            direction: TransferDirection::Download,
            local_path: local_path.into(),
            remote_key: remote_key.into(),
        }
    }

    /// Returns the transfer direction.
    pub fn direction(&self) -> TransferDirection {
        self.direction
    }

    /// Returns the local path.
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Returns the remote key.
    pub fn remote_key(&self) -> &str {
        &self.remote_key
    }
}

/// Performs single transfers against a shared store.
///
/// Every failure (I/O, store, auth) is logged and reported as `false`; the
/// caller decides whether it is fatal to the batch. Re-running a transfer
/// overwrites the destination.
pub struct TransferExecutor<S: BlobStore> {
    store: Arc<S>,
}

impl<S: BlobStore> Clone for TransferExecutor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: BlobStore> TransferExecutor<S> {
    /// Creates an executor over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Runs a task, returning whether it succeeded.
    pub fn execute(&self, task: &TransferTask) -> bool {
        match task.direction {
            TransferDirection::Upload => self.upload(&task.local_path, &task.remote_key),
            TransferDirection::Download => self.download(&task.remote_key, &task.local_path),
        }
    }

    /// Uploads `local_path` to `remote_key`.
    pub fn upload(&self, local_path: &Path, remote_key: &str) -> bool {
        match self.try_upload(local_path, remote_key) {
            Ok(()) => {
                debug!(key = remote_key, path = %local_path.display(), "uploaded");
                true
            }
            Err(e) => {
                warn!(key = remote_key, path = %local_path.display(), error = %e, "upload failed");
                false
            }
        }
    }

    /// Downloads `remote_key` to `local_path`, creating parent directories.
    pub fn download(&self, remote_key: &str, local_path: &Path) -> bool {
        match self.try_download(remote_key, local_path) {
            Ok(()) => {
                debug!(key = remote_key, path = %local_path.display(), "downloaded");
                true
            }
            Err(e) => {
                warn!(key = remote_key, path = %local_path.display(), error = %e, "download failed");
                false
            }
        }
    }

    /// Uploads, returning the underlying error on failure.
    pub fn try_upload(&self, local_path: &Path, remote_key: &str) -> SyncResult<()> {
        let data = fs::read(local_path).map_err(|e| transfer_error(remote_key, e))?;
        self.store
            .upload(remote_key, data)
            .map_err(|e| transfer_error(remote_key, e))
    }

    /// Downloads, returning the underlying error on failure.
    ///
    /// The object is written to a sibling temporary file and renamed into
    /// place, so readers never observe a half-written file.
    pub fn try_download(&self, remote_key: &str, local_path: &Path) -> SyncResult<()> {
        let data = self
            .store
            .download(remote_key)
            .map_err(|e| transfer_error(remote_key, e))?;

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent).map_err(|e| transfer_error(remote_key, e))?;
        }

        let staging = staging_path(local_path);
        let written = fs::write(&staging, &data).and_then(|()| fs::rename(&staging, local_path));
        if let Err(e) = written {
            let _ = fs::remove_file(&staging);
            return Err(transfer_error(remote_key, e));
        }
        Ok(())
    }
}

fn staging_path(local_path: &Path) -> PathBuf {
    let name = local_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    local_path.with_file_name(format!(".{name}.part"))
}

fn transfer_error(key: &str, error: impl std::fmt::Display) -> SyncError {
    SyncError::Transfer {
        key: key.to_string(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlobStore;
    use tempfile::tempdir;

    #[test]
    fn upload_reads_local_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(&path, b"[1]").unwrap();

        let store = Arc::new(MemoryBlobStore::new());
        let executor = TransferExecutor::new(Arc::clone(&store));

        assert!(executor.upload(&path, "data/db.json"));
        assert_eq!(store.get("data/db.json").unwrap(), b"[1]");

        // Idempotent: uploading again overwrites.
        fs::write(&path, b"[2]").unwrap();
        assert!(executor.execute(&TransferTask::upload(&path, "data/db.json")));
        assert_eq!(store.get("data/db.json").unwrap(), b"[2]");
    }

    #[test]
    fn upload_of_missing_file_fails() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MemoryBlobStore::new());
        let executor = TransferExecutor::new(Arc::clone(&store));

        assert!(!executor.upload(&dir.path().join("absent.json"), "data/db.json"));
        assert_eq!(store.upload_calls(), 0);
    }

    #[test]
    fn download_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MemoryBlobStore::new());
        store.insert("img/upload/sour.png", vec![7u8; 16]);
        let executor = TransferExecutor::new(Arc::clone(&store));

        let target = dir.path().join("assets").join("upload").join("sour.png");
        assert!(executor.download("img/upload/sour.png", &target));
        assert_eq!(fs::read(&target).unwrap(), vec![7u8; 16]);
        assert!(!staging_path(&target).exists());
    }

    #[test]
    fn failed_download_leaves_destination_untouched() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("db.json");
        fs::write(&target, b"[\"local\"]").unwrap();

        let store = Arc::new(MemoryBlobStore::new());
        store.insert("data/db.json", "[]");
        store.fail_download("data/db.json");
        let executor = TransferExecutor::new(store);

        assert!(!executor.execute(&TransferTask::download("data/db.json", &target)));
        assert_eq!(fs::read(&target).unwrap(), b"[\"local\"]");

        let err = executor.try_download("data/db.json", &target).unwrap_err();
        assert!(matches!(err, SyncError::Transfer { .. }));
    }

    #[test]
    fn task_accessors() {
        let task = TransferTask::download("img/a.png", "/tmp/a.png");
        assert_eq!(task.direction(), TransferDirection::Download);
        assert_eq!(task.remote_key(), "img/a.png");
        assert_eq!(task.local_path(), Path::new("/tmp/a.png"));
    }
}
