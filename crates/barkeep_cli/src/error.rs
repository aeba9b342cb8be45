//! CLI error type.

use barkeep_sync_engine::SyncError;
use thiserror::Error;

/// Errors reported by `barkeep` commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The sync engine failed to start or run.
    #[error(transparent)]
    Engine(#[from] SyncError),

    /// Output could not be serialized.
    #[error("failed to render output: {0}")]
    Render(#[from] serde_json::Error),

    /// An unknown `--format` value.
    #[error("unknown output format '{0}' (expected text or json)")]
    InvalidFormat(String),

    /// The requested operation ran but reported failure.
    #[error("{0}")]
    Failed(String),
}

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;
