//! Barkeep CLI
//!
//! Command-line control for the appliance's offline-first sync engine.
//!
//! # Commands
//!
//! - `sync` - Run one sync cycle
//! - `status` - Show connectivity, marker and pending transfers
//! - `upload` / `download` - Manual transfers that leave the marker alone
//! - `sync-assets` - Reconcile assets in both directions
//! - `watch` - Run sync cycles on an interval
//! - `init` - Create missing documents
//! - `encode-credentials` / `decode-credentials` - Credential file tooling

mod commands;
mod error;

use clap::{Parser, Subcommand};
use commands::transfer::Selection;
use commands::Context;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Barkeep sync tools.
#[derive(Parser)]
#[command(name = "barkeep")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Sync root directory
    #[arg(global = true, short, long, default_value = ".")]
    root: PathBuf,

    /// Encoded credentials file (relative paths resolve against the root)
    #[arg(global = true, short, long, default_value = "encoded_credentials.txt")]
    credentials: PathBuf,

    /// Number of concurrent transfers
    #[arg(global = true, short, long)]
    workers: Option<usize>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync cycle
    Sync,

    /// Show sync status
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Upload local files (documents and assets if no flag is given)
    Upload {
        /// Upload the fixed documents
        #[arg(short, long)]
        documents: bool,

        /// Upload local-only assets
        #[arg(short, long)]
        assets: bool,
    },

    /// Download remote files (documents and assets if no flag is given)
    Download {
        /// Download the fixed documents
        #[arg(short, long)]
        documents: bool,

        /// Download remote-only assets
        #[arg(short, long)]
        assets: bool,
    },

    /// Reconcile assets in both directions
    SyncAssets,

    /// Run sync cycles periodically
    Watch {
        /// Seconds between cycles (default 60)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,
    },

    /// Create missing documents as empty JSON arrays
    Init,

    /// Encode a JSON credentials file
    EncodeCredentials {
        /// Plain JSON credentials
        #[arg(short, long)]
        input: PathBuf,

        /// Encoded output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Decode an encoded credentials file
    DecodeCredentials {
        /// Encoded credentials
        #[arg(short, long)]
        input: PathBuf,

        /// Plain JSON output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let sync_interval = match &cli.command {
        Commands::Watch {
            interval: Some(secs),
            ..
        } => Some(Duration::from_secs((*secs).max(1))),
        _ => None,
    };
    let ctx = Context {
        root: cli.root,
        credentials: cli.credentials,
        workers: cli.workers,
        sync_interval,
    };

    match cli.command {
        Commands::Sync => commands::sync::run(&ctx.engine()?)?,
        Commands::Status { format } => commands::status::run(&ctx.engine()?, &format)?,
        Commands::Upload { documents, assets } => {
            commands::transfer::upload(&ctx.engine()?, Selection::from_flags(documents, assets))?
        }
        Commands::Download { documents, assets } => commands::transfer::download(
            &ctx.engine()?,
            Selection::from_flags(documents, assets),
        )?,
        Commands::SyncAssets => commands::transfer::sync_assets(&ctx.engine()?)?,
        Commands::Watch { cycles, .. } => commands::sync::watch(&ctx.engine()?, cycles)?,
        Commands::Init => commands::init::run(&ctx.config())?,
        Commands::EncodeCredentials { input, output } => {
            commands::credentials::encode(&input, &output)?
        }
        Commands::DecodeCredentials { input, output } => {
            commands::credentials::decode(&input, &output)?
        }
        Commands::Version => {
            println!("Barkeep CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
