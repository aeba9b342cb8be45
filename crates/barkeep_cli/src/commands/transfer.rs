//! Manual upload, download and asset sync commands.
//!
//! These bypass the marker state machine and never touch the offline marker.

use super::Engine;
use crate::error::{CliError, CliResult};

/// Which categories a manual transfer covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Fixed documents.
    pub documents: bool,
    /// Image assets.
    pub assets: bool,
}

impl Selection {
    /// Builds a selection from CLI flags; no flag selects everything.
    pub fn from_flags(documents: bool, assets: bool) -> Self {
        if documents || assets {
            Self { documents, assets }
        } else {
            Self {
                documents: true,
                assets: true,
            }
        }
    }
}

/// Uploads the selected categories.
pub fn upload(engine: &Engine, selection: Selection) -> CliResult<()> {
    check(
        engine.upload_all(selection.documents, selection.assets),
        "upload",
    )
}

/// Downloads the selected categories.
pub fn download(engine: &Engine, selection: Selection) -> CliResult<()> {
    check(
        engine.download_all(selection.documents, selection.assets),
        "download",
    )
}

/// Reconciles assets in both directions.
pub fn sync_assets(engine: &Engine) -> CliResult<()> {
    check(engine.sync_assets(), "asset sync")
}

fn check(success: bool, operation: &str) -> CliResult<()> {
    if success {
        println!("✓ {operation} complete");
        Ok(())
    } else {
        println!("✗ {operation} failed");
        Err(CliError::Failed(format!(
            "{operation} did not complete (offline or transfer failures)"
        )))
    }
}
