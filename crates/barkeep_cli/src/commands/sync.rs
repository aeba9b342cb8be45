//! Sync and watch command implementations.

use super::Engine;
use crate::error::{CliError, CliResult};
use barkeep_sync_engine::{SyncCycleResult, SyncMode};
use tracing::info;

/// Runs one sync cycle.
pub fn run(engine: &Engine) -> CliResult<()> {
    let result = engine.sync();
    print_cycle(&result);

    if result.success {
        Ok(())
    } else {
        Err(CliError::Failed(format!(
            "{} cycle finished with {} failed transfer(s)",
            mode_label(result.mode),
            result.outcome.failed.len()
        )))
    }
}

/// Runs sync cycles on the engine's configured interval.
pub fn watch(engine: &Engine, cycles: Option<u64>) -> CliResult<()> {
    info!(interval = ?engine.config().sync_interval, ?cycles, "watching");

    let completed = engine.run_periodic(cycles);
    let stats = engine.stats();
    println!(
        "{completed} cycle(s): {} uploaded, {} downloaded, {} failed, {} offline",
        stats.files_uploaded, stats.files_downloaded, stats.failed_transfers, stats.offline_cycles
    );
    match stats.last_error {
        Some(e) => Err(CliError::Failed(e)),
        None => Ok(()),
    }
}

fn print_cycle(result: &SyncCycleResult) {
    println!("Mode:       {}", mode_label(result.mode));
    println!("Uploaded:   {}", result.outcome.uploaded);
    println!("Downloaded: {}", result.outcome.downloaded);
    if !result.outcome.failed.is_empty() {
        println!("Failed:     {}", result.outcome.failed.join(", "));
    }
    println!(
        "Marker:     {}",
        if result.marker_set { "set" } else { "clear" }
    );
    println!("Duration:   {:.2?}", result.duration);
}

fn mode_label(mode: SyncMode) -> &'static str {
    match mode {
        SyncMode::Offline => "offline",
        SyncMode::Push => "push",
        SyncMode::Pull => "pull",
    }
}
