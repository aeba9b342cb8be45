//! Status command implementation.

use super::Engine;
use crate::error::{CliError, CliResult};
use barkeep_sync_engine::SyncStatus;

/// Output formats accepted by `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human-readable report.
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl Format {
    /// Parses a `--format` value.
    pub fn parse(value: &str) -> CliResult<Self> {
        match value {
            "text" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            other => Err(CliError::InvalidFormat(other.to_string())),
        }
    }
}

/// Runs the status command.
pub fn run(engine: &Engine, format: &str) -> CliResult<()> {
    let format = Format::parse(format)?;
    let status = engine.status();
    println!("{}", render(&status, format)?);
    Ok(())
}

fn render(status: &SyncStatus, format: Format) -> CliResult<String> {
    match format {
        Format::Json => Ok(serde_json::to_string_pretty(status)?),
        Format::Text => Ok(render_text(status)),
    }
}

fn render_text(status: &SyncStatus) -> String {
    let mut out = String::new();
    out.push_str("=== Sync Status ===\n");
    out.push_str(&format!(
        "Connectivity:     {}\n",
        if status.online { "online" } else { "offline" }
    ));
    out.push_str(&format!(
        "Offline marker:   {}\n",
        if status.marker_set {
            "set (push pending)"
        } else {
            "clear"
        }
    ));
    out.push_str(&format!(
        "Local documents:  {}\n",
        list_or_none(&status.local_documents)
    ));
    if status.online {
        out.push_str(&format!(
            "Remote documents: {}\n",
            list_or_none(&status.remote_documents)
        ));
    }
    out.push_str(&format!("Local assets:     {}\n", status.local_assets));
    if status.online {
        out.push_str(&format!("Remote assets:    {}\n", status.remote_assets));
        out.push_str(&format!(
            "Pending upload:   {}\n",
            status.pending_upload.len()
        ));
        out.push_str(&format!(
            "Pending download: {}\n",
            status.pending_download.len()
        ));
    }
    out
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}
