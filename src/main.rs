//! # Profile Sync CLI (`prosync`)
//!
//! Command-line interface for the profile synchronization pipeline.
//!
//! ## Usage
//!
//! ```bash
//! prosync --config ./config/prosync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `prosync init` | Open the configured store and create its schema |
//! | `prosync sync` | Run one full-refresh synchronization |
//! | `prosync get <id>` | Print a stored profile (or a sub-document) |
//! | `prosync ids` | List stored profile ids |
//! | `prosync status` | Show backend and stored-count status |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use profile_sync::models::SyncOutcome;
use profile_sync::{config, get, stats, store, sync};

/// Profile Sync — full-refresh synchronization of researcher profile
/// records into a local store.
#[derive(Parser)]
#[command(
    name = "prosync",
    about = "Full-refresh synchronization of researcher profile records into a local store",
    version,
    long_about = "Profile Sync pulls the paginated researcher-profile listing from a remote API \
    using a cached bearer token, sanitizes each record, and persists the result into either an \
    embedded single-file store or a split document store."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/prosync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the configured store and create its schema.
    ///
    /// Idempotent — running it multiple times is safe.
    Init,

    /// Run one full-refresh synchronization.
    ///
    /// Clears the local store, then repopulates it page by page from the
    /// remote API. Prints per-page progress and a final stored-vs-total
    /// summary; partial outcomes (a failed page) still commit whatever
    /// was fetched.
    Sync,

    /// Print a stored profile, or one of its sub-documents, by id.
    Get {
        /// Profile id.
        id: i64,

        /// Sub-document: `profile`, `presentations`, `publications`, or
        /// `processing`.
        #[arg(long, default_value = "profile")]
        part: String,
    },

    /// List stored profile ids, one per line.
    Ids,

    /// Show the configured backend and its stored profile count.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    init_tracing(cfg.debug);

    let store = store::open_store(&cfg.store).await?;

    match cli.command {
        Commands::Init => {
            println!("Initialized {}.", store.describe());
        }
        Commands::Sync => {
            let mut pipeline = sync::SyncPipeline::new(&cfg, store.as_ref())?;
            let report = pipeline.run().await?;
            if report.outcome == SyncOutcome::Failed {
                std::process::exit(1);
            }
        }
        Commands::Get { id, part } => {
            get::run_get(store.as_ref(), id, &part).await?;
        }
        Commands::Ids => {
            get::run_ids(store.as_ref()).await?;
        }
        Commands::Status => {
            stats::run_status(store.as_ref()).await?;
        }
    }

    Ok(())
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}
