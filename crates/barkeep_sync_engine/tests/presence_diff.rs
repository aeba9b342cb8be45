//! Property tests for presence-only asset diffing.

use barkeep_sync_engine::{MemoryBlobStore, StaticProbe, SyncConfig, SyncEngine, SyncMode};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

fn asset_names() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[a-d]{1,2}(/[a-d]{1,2})?\\.(png|jpg|gif)", 0..8)
}

/// Builds an engine over a root holding `local` and a store holding `remote`.
fn setup(
    local: &BTreeSet<String>,
    remote: &BTreeSet<String>,
) -> (
    tempfile::TempDir,
    Arc<MemoryBlobStore>,
    SyncEngine<MemoryBlobStore, StaticProbe>,
) {
    let dir = tempdir().unwrap();
    for name in local {
        let path = dir.path().join("assets").join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"local").unwrap();
    }
    let store = Arc::new(MemoryBlobStore::new());
    for name in remote {
        store.insert(format!("img/{name}"), "remote");
    }
    let engine = SyncEngine::with_shared_store(
        SyncConfig::new(dir.path()).with_workers(3),
        Arc::clone(&store),
        StaticProbe::new(true),
    )
    .unwrap();
    (dir, store, engine)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn push_uploads_exactly_local_minus_remote(
        local in asset_names(),
        remote in asset_names(),
    ) {
        let (_dir, store, engine) = setup(&local, &remote);
        engine.marker().mark().unwrap();

        let result = engine.sync();
        prop_assert_eq!(result.mode, SyncMode::Push);
        prop_assert!(result.success);

        let expected = local.difference(&remote).count();
        prop_assert_eq!(result.outcome.uploaded, expected);
        prop_assert_eq!(store.upload_calls(), expected);
        prop_assert_eq!(store.download_calls(), 0);

        for name in &remote {
            // Shared assets keep the remote copy.
            prop_assert_eq!(store.get(&format!("img/{name}")).unwrap(), b"remote".to_vec());
        }
        for name in local.difference(&remote) {
            let key = format!("img/{name}");
            prop_assert!(store.contains(&key));
        }
    }

    #[test]
    fn pull_downloads_exactly_remote_minus_local(
        local in asset_names(),
        remote in asset_names(),
    ) {
        let (dir, store, engine) = setup(&local, &remote);

        let result = engine.sync();
        prop_assert_eq!(result.mode, SyncMode::Pull);

        let expected = remote.difference(&local).count();
        // The three fixed documents are missing remotely and fail.
        prop_assert_eq!(result.outcome.downloaded, expected);
        prop_assert_eq!(result.outcome.failed.len(), 3);
        prop_assert_eq!(store.upload_calls(), 0);

        for name in &local {
            let data = fs::read(dir.path().join("assets").join(name)).unwrap();
            prop_assert_eq!(data, b"local".to_vec());
        }
        for name in remote.difference(&local) {
            let data = fs::read(dir.path().join("assets").join(name)).unwrap();
            prop_assert_eq!(data, b"remote".to_vec());
        }
    }
}
