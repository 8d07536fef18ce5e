//! PositionLab CLI: replay recorded events and inspect stored books.
//!
//! Commands:
//! - `replay`: apply a JSON event file to a fresh tracker and print the book
//! - `show`: print a stored snapshot and its fingerprint

mod events;
mod logging;
mod replay;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use logging::{init_logging, LogConfig, LogFormat};
use positionlab_core::{Snapshot, TrackerConfig};
use replay::Replayer;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "positionlab",
    about = "PositionLab CLI: position accounting and stop-order replay"
)]
struct Cli {
    /// Log output format (filter with RUST_LOG).
    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a recorded event file and print the resulting book as JSON.
    Replay {
        /// JSON array of fill, mark, bar, exit_levels, stop_order, split and dividend events.
        #[arg(long)]
        events: PathBuf,

        /// Tracker configuration (TOML). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the final book as a snapshot to this file.
        #[arg(long)]
        snapshot_out: Option<PathBuf>,

        /// Abort on the first rejected event instead of skipping it.
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
    /// Print a stored snapshot and its fingerprint.
    Show {
        #[arg(long)]
        snapshot: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&LogConfig::default().with_format(cli.log_format))?;

    match cli.command {
        Commands::Replay {
            events,
            config,
            snapshot_out,
            strict,
        } => run_replay(&events, config.as_deref(), snapshot_out.as_deref(), strict),
        Commands::Show { snapshot } => run_show(&snapshot),
    }
}

fn run_replay(
    events_path: &Path,
    config_path: Option<&Path>,
    snapshot_out: Option<&Path>,
    strict: bool,
) -> Result<()> {
    let config = match config_path {
        Some(path) => TrackerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TrackerConfig::default(),
    };
    let events = events::load_events(events_path)?;
    info!(events = events.len(), path = %events_path.display(), "replaying");

    let mut replayer = Replayer::new(&config);
    replayer.run(events, strict)?;

    if let Some(path) = snapshot_out {
        let snapshot = replayer.snapshot();
        snapshot
            .save(path)
            .with_context(|| format!("writing snapshot {}", path.display()))?;
        info!(path = %path.display(), fingerprint = %snapshot.fingerprint()?, "snapshot written");
    }

    let report = replayer.finish();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_show(path: &Path) -> Result<()> {
    let snapshot =
        Snapshot::load(path).with_context(|| format!("reading snapshot {}", path.display()))?;
    // Reject books that could not be restored.
    snapshot.to_positions()?;

    println!("{}", snapshot.to_json_pretty()?);
    println!("fingerprint: {}", snapshot.fingerprint()?);
    Ok(())
}
