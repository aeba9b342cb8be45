//! The fixed set of JSON documents mirrored on every cycle.

use crate::error::SyncResult;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Contents written to a fixed document that does not exist yet.
pub const EMPTY_DOCUMENT: &[u8] = b"[]";

/// One fixed document: a logical name, its path under the sync root and its
/// remote key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    /// Logical name (`documents`, `catalog`, `configuration`).
    pub name: String,
    /// Path relative to the sync root.
    pub local_path: PathBuf,
    /// Key in the remote store.
    pub remote_key: String,
}

impl DocumentEntry {
    /// Creates a new entry.
    pub fn new(
        name: impl Into<String>,
        local_path: impl Into<PathBuf>,
        remote_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            local_path: local_path.into(),
            remote_key: remote_key.into(),
        }
    }

    /// Returns the absolute local path of this document under `root`.
    pub fn path_in(&self, root: &Path) -> PathBuf {
        root.join(&self.local_path)
    }
}

/// Static mapping from logical document name to local path and remote key.
///
/// The manifest is configuration: it is never mutated by the engine, and its
/// documents are always transferred whole, never diffed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentManifest {
    entries: Vec<DocumentEntry>,
}

impl DocumentManifest {
    /// Creates a manifest from explicit entries.
    pub fn new(entries: Vec<DocumentEntry>) -> Self {
        Self { entries }
    }

    /// Returns all entries in declaration order.
    pub fn entries(&self) -> &[DocumentEntry] {
        &self.entries
    }

    /// Looks up an entry by logical name.
    pub fn get(&self, name: &str) -> Option<&DocumentEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Returns the number of documents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the manifest has no documents.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Creates every missing document under `root` with an empty JSON array.
    ///
    /// Existing documents are left untouched. Returns the number of documents
    /// created.
    pub fn initialize(&self, root: &Path) -> SyncResult<usize> {
        let mut created = 0;
        for entry in &self.entries {
            let path = entry.path_in(root);
            if path.exists() {
                continue;
            }
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, EMPTY_DOCUMENT)?;
            debug!(document = %entry.name, path = %path.display(), "created empty document");
            created += 1;
        }
        if created > 0 {
            info!(created, "initialized missing documents");
        }
        Ok(created)
    }
}

impl Default for DocumentManifest {
    fn default() -> Self {
        Self::new(vec![
            DocumentEntry::new("documents", "documents/db.json", "data/db.json"),
            DocumentEntry::new("catalog", "documents/products.json", "data/products.json"),
            DocumentEntry::new("configuration", "documents/config.json", "data/config.json"),
        ])
    }
}
