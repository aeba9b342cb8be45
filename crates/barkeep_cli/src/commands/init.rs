//! Init command implementation.

use crate::error::CliResult;
use barkeep_sync_engine::SyncConfig;

/// Creates any missing fixed document as an empty JSON array.
pub fn run(config: &SyncConfig) -> CliResult<()> {
    let created = config.manifest.initialize(config.root())?;
    println!(
        "Initialized {} of {} documents in {}",
        created,
        config.manifest.len(),
        config.root().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn init_creates_documents_once() {
        let dir = tempdir().unwrap();
        let config = SyncConfig::new(dir.path());

        run(&config).unwrap();
        let db = dir.path().join("documents").join("db.json");
        assert_eq!(fs::read(&db).unwrap(), b"[]");

        fs::write(&db, b"[1]").unwrap();
        run(&config).unwrap();
        assert_eq!(fs::read(&db).unwrap(), b"[1]");
    }
}
