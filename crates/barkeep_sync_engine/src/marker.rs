//! Durable "offline changes pending" flag.

use crate::error::{SyncError, SyncResult};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// A sentinel file whose existence means "local mutations happened while
/// offline and must be pushed on reconnect".
///
/// The file is empty; only its presence carries meaning. Any entry at the
/// path counts as set, so an entry that cannot be removed keeps the push
/// pending. The marker is touched by the single orchestration thread only and
/// does no locking.
#[derive(Debug, Clone)]
pub struct OfflineMarker {
    path: PathBuf,
}

impl OfflineMarker {
    /// Creates a marker handle for the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path of the sentinel file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the sentinel file if it is absent. Idempotent.
    pub fn mark(&self) -> SyncResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(SyncError::Marker)?;
        }
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(SyncError::Marker)?;
        Ok(())
    }

    /// Reports whether anything exists at the sentinel path.
    pub fn is_marked(&self) -> bool {
        self.path.exists()
    }

    /// Removes the sentinel file. Idempotent: an absent file is not an error.
    pub fn clear(&self) -> SyncResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::Marker(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn mark_and_clear_are_idempotent() {
        let dir = tempdir().unwrap();
        let marker = OfflineMarker::new(dir.path().join("offline.marker"));

        assert!(!marker.is_marked());
        marker.clear().unwrap();

        marker.mark().unwrap();
        marker.mark().unwrap();
        assert!(marker.is_marked());
        assert_eq!(fs::read(marker.path()).unwrap().len(), 0);

        marker.clear().unwrap();
        marker.clear().unwrap();
        assert!(!marker.is_marked());
    }

    #[test]
    fn marker_survives_handle_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("offline.marker");

        OfflineMarker::new(&path).mark().unwrap();
        assert!(OfflineMarker::new(&path).is_marked());
    }

    #[test]
    fn mark_reports_io_failure() {
        let dir = tempdir().unwrap();
        // A directory in the way of the sentinel file.
        let path = dir.path().join("offline.marker");
        fs::create_dir(&path).unwrap();

        let marker = OfflineMarker::new(&path);
        assert!(marker.is_marked());
        assert!(matches!(marker.mark(), Err(SyncError::Marker(_))));
        assert!(matches!(marker.clear(), Err(SyncError::Marker(_))));
        assert!(marker.is_marked());
    }

    #[test]
    fn mark_reports_unusable_parent() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("state"), b"").unwrap();

        let marker = OfflineMarker::new(dir.path().join("state").join("offline.marker"));
        assert!(matches!(marker.mark(), Err(SyncError::Marker(_))));
        assert!(!marker.is_marked());
    }
}
