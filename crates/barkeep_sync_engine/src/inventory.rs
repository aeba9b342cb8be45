//! Local and remote inventories.
//!
//! Both sides are reduced to the same shape: a set of forward-slash paths
//! relative to the asset root (`cocktails/negroni.png`), so that the local
//! file `assets/cocktails/negroni.png` and the remote key
//! `img/cocktails/negroni.png` compare equal. Only presence is compared.

use crate::error::{SyncError, SyncResult};
use crate::store::BlobStore;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// File extensions treated as assets (compared case-insensitively).
pub const ASSET_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Set of asset paths relative to the asset root.
pub type AssetInventory = BTreeSet<String>;

/// Returns true if the file name carries an allowed image extension.
pub fn is_asset_name(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => ASSET_EXTENSIONS
            .iter()
            .any(|allowed| ext.eq_ignore_ascii_case(allowed)),
        None => false,
    }
}

/// Checks that a relative asset path stays inside the asset root.
///
/// Rejects empty paths, absolute paths, backslashes, and `.`, `..` or empty
/// segments.
pub fn validate_relative_path(relative: &str) -> SyncResult<()> {
    if relative.is_empty() || relative.starts_with('/') || relative.contains('\\') {
        return Err(SyncError::InvalidKey(relative.to_string()));
    }
    if relative
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(SyncError::InvalidKey(relative.to_string()));
    }
    Ok(())
}

/// Maps a validated relative asset path onto the local asset root.
pub fn local_asset_path(asset_root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .fold(asset_root.to_path_buf(), |path, segment| path.join(segment))
}

/// Walks the asset directory and returns every asset file in it.
///
/// Symlinks are followed, so a linked image counts like a regular file. A
/// missing directory yields an empty inventory (first run). Files whose names
/// are not valid UTF-8, and links whose target vanished, are skipped.
///
/// # Errors
///
/// Returns [`SyncError::Scan`] if the root is not a directory or part of the
/// tree cannot be read. Callers must not treat this as "no local assets".
pub fn scan_local_assets(asset_root: &Path) -> SyncResult<AssetInventory> {
    match fs::metadata(asset_root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(scan_error(asset_root, "not a directory")),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(AssetInventory::new()),
        Err(e) => return Err(scan_error(asset_root, e)),
    }

    let mut inventory = AssetInventory::new();
    for entry in WalkDir::new(asset_root).follow_links(true).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if is_vanished(&e) => {
                warn!(path = ?e.path(), "skipping dangling asset entry");
                continue;
            }
            Err(e) => {
                let path = e.path().unwrap_or(asset_root).to_path_buf();
                return Err(scan_error(&path, e));
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(relative) = relative_asset_path(asset_root, entry.path()) else {
            warn!(path = %entry.path().display(), "skipping non UTF-8 asset name");
            continue;
        };
        if is_asset_name(&relative) {
            inventory.insert(relative);
        }
    }

    debug!(root = %asset_root.display(), count = inventory.len(), "scanned local assets");
    Ok(inventory)
}

/// Joins the components below `root` with `/`, or `None` if any is not UTF-8.
fn relative_asset_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(segments.join("/"))
}

fn is_vanished(error: &walkdir::Error) -> bool {
    error
        .io_error()
        .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
}

fn scan_error(path: &Path, error: impl std::fmt::Display) -> SyncError {
    SyncError::Scan {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}

/// Lists every key under `prefix`, wrapping failures as [`SyncError::Listing`].
pub fn list_remote_keys<S>(store: &S, prefix: &str) -> SyncResult<Vec<String>>
where
    S: BlobStore + ?Sized,
{
    store.list(prefix, None).map_err(|e| SyncError::Listing {
        prefix: prefix.to_string(),
        message: e.to_string(),
    })
}

/// Lists remote assets under `prefix`, stripped of the prefix.
///
/// A listing failure is logged and degrades to an empty inventory, which
/// turns the cycle into a no-op for assets. Directory placeholders, keys
/// without an asset extension and keys that would escape the asset root are
/// skipped, so both sides of the diff describe the same kind of file.
pub fn list_remote_assets<S: BlobStore + ?Sized>(store: &S, prefix: &str) -> AssetInventory {
    let keys = match list_remote_keys(store, prefix) {
        Ok(keys) => keys,
        Err(e) => {
            warn!(error = %e, "remote asset listing failed; treating as empty");
            return AssetInventory::new();
        }
    };

    let mut inventory = AssetInventory::new();
    for key in keys {
        let Some(relative) = key.strip_prefix(prefix) else {
            continue;
        };
        if relative.is_empty() || relative.ends_with('/') || !is_asset_name(relative) {
            continue;
        }
        if let Err(e) = validate_relative_path(relative) {
            warn!(key = %key, error = %e, "skipping unsafe remote key");
            continue;
        }
        inventory.insert(relative.to_string());
    }
    debug!(prefix, count = inventory.len(), "listed remote assets");
    inventory
}

/// Returns which of `keys` exist remotely under `prefix`.
///
/// Like [`list_remote_assets`], a listing failure degrades to "none exist".
pub fn list_remote_keys_exist<'a, S, I>(store: &S, prefix: &str, keys: I) -> BTreeSet<String>
where
    S: BlobStore + ?Sized,
    I: IntoIterator<Item = &'a str>,
{
    let listed: BTreeSet<String> = match list_remote_keys(store, prefix) {
        Ok(listed) => listed.into_iter().collect(),
        Err(e) => {
            warn!(error = %e, "remote document listing failed; treating as empty");
            return BTreeSet::new();
        }
    };
    keys.into_iter()
        .filter(|key| listed.contains(*key))
        .map(str::to_owned)
        .collect()
}

/// Returns the entries of `source` absent from `target`.
pub fn missing_from(source: &AssetInventory, target: &AssetInventory) -> Vec<String> {
    source.difference(target).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlobStore;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"img").unwrap();
    }

    #[test]
    fn asset_extensions() {
        assert!(is_asset_name("mojito.png"));
        assert!(is_asset_name("MOJITO.JPG"));
        assert!(is_asset_name("a.jpeg"));
        assert!(is_asset_name("spin.gif"));
        assert!(!is_asset_name("notes.txt"));
        assert!(!is_asset_name("png"));
        assert!(!is_asset_name("archive.png.zip"));
    }

    #[test]
    fn scan_walks_tree_with_forward_slashes() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("assets");
        touch(&root.join("a.png"));
        touch(&root.join("upload").join("b.JPG"));
        touch(&root.join("upload").join("nested").join("c.gif"));
        touch(&root.join("upload").join("readme.txt"));

        let inventory = scan_local_assets(&root).unwrap();
        let expected: AssetInventory = ["a.png", "upload/b.JPG", "upload/nested/c.gif"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(inventory, expected);
    }

    #[test]
    fn scan_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        assert!(scan_local_assets(&dir.path().join("nope")).unwrap().is_empty());
    }

    #[test]
    fn scan_of_a_file_root_is_an_error() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("assets");
        fs::write(&root, b"not a dir").unwrap();

        let err = scan_local_assets(&root).unwrap_err();
        assert!(matches!(err, SyncError::Scan { .. }));
        assert!(err.is_retryable());
    }

    #[cfg(unix)]
    #[test]
    fn scan_follows_file_symlinks() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("assets");
        let outside = dir.path().join("shared").join("logo.png");
        touch(&outside);
        fs::create_dir_all(&root).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("logo.png")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone.png"), root.join("gone.png")).unwrap();

        let inventory = scan_local_assets(&root).unwrap();
        let expected: AssetInventory = ["logo.png"].into_iter().map(String::from).collect();
        assert_eq!(inventory, expected);
    }

    #[cfg(unix)]
    #[test]
    fn scan_reports_directory_loops() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("assets");
        touch(&root.join("a.png"));
        std::os::unix::fs::symlink(&root, root.join("again")).unwrap();

        assert!(matches!(
            scan_local_assets(&root),
            Err(SyncError::Scan { .. })
        ));
    }

    #[test]
    fn listing_errors_name_the_prefix() {
        let store = MemoryBlobStore::new();
        store.set_reachable(false);

        match list_remote_keys(&store, "img/") {
            Err(SyncError::Listing { prefix, .. }) => assert_eq!(prefix, "img/"),
            other => panic!("unexpected listing result: {other:?}"),
        }
    }

    #[test]
    fn remote_listing_strips_prefix_and_skips_unsafe_keys() {
        let store = MemoryBlobStore::new();
        store.insert("img/", "");
        store.insert("img/a.png", "a");
        store.insert("img/upload/b.png", "b");
        store.insert("img/../escape.png", "x");
        store.insert("img//double.png", "x");
        store.insert("img/notes.txt", "x");
        store.insert("data/db.json", "[]");

        let inventory = list_remote_assets(&store, "img/");
        let expected: AssetInventory = ["a.png", "upload/b.png"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(inventory, expected);
    }

    #[test]
    fn remote_listing_failure_degrades_to_empty() {
        let store = MemoryBlobStore::new();
        store.insert("img/a.png", "a");
        store.set_reachable(false);

        assert!(list_remote_assets(&store, "img/").is_empty());
        assert!(list_remote_keys_exist(&store, "data/", ["data/db.json"]).is_empty());
    }

    #[test]
    fn remote_keys_exist() {
        let store = MemoryBlobStore::new();
        store.insert("data/db.json", "[]");
        store.insert("data/other.json", "[]");

        let present =
            list_remote_keys_exist(&store, "data/", ["data/db.json", "data/config.json"]);
        assert_eq!(present.len(), 1);
        assert!(present.contains("data/db.json"));
    }

    #[test]
    fn relative_path_validation() {
        assert!(validate_relative_path("a.png").is_ok());
        assert!(validate_relative_path("upload/a.png").is_ok());
        assert!(validate_relative_path("").is_err());
        assert!(validate_relative_path("/etc/passwd").is_err());
        assert!(validate_relative_path("../a.png").is_err());
        assert!(validate_relative_path("x/./a.png").is_err());
        assert!(validate_relative_path("x\\a.png").is_err());
    }

    #[test]
    fn local_path_mapping() {
        let path = local_asset_path(Path::new("/srv/assets"), "upload/a.png");
        assert_eq!(path, Path::new("/srv/assets").join("upload").join("a.png"));
    }

    #[test]
    fn diff_is_one_directional() {
        let local: AssetInventory = ["a.png", "b.png"].into_iter().map(String::from).collect();
        let remote: AssetInventory = ["b.png", "c.png"].into_iter().map(String::from).collect();

        assert_eq!(missing_from(&local, &remote), vec!["a.png"]);
        assert_eq!(missing_from(&remote, &local), vec!["c.png"]);
    }
}
