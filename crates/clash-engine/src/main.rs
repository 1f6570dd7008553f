//! # Clash Engine
//!
//! Headless host for the Clash combat core.
//!
//! Loads `clash.toml`, stage and roster data, then runs a scripted demo
//! match at a fixed frame rate, logging combat events and optionally
//! writing JSON snapshots to stdout.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod combat_log;
mod config;
mod pilot;
mod runner;
mod timing;

mod e2e_tests;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{EngineConfig, CONFIG_FILE};

/// Command line options; each overrides the matching config value.
#[derive(Debug, Parser)]
#[command(name = "clash", version, about = "Run a headless Clash match")]
struct Args {
    /// Path to the host config file
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Frames to simulate
    #[arg(long)]
    frames: Option<u32>,

    /// Pace frames in wall-clock time
    #[arg(long)]
    realtime: bool,

    /// Write a JSON snapshot every N frames
    #[arg(long, value_name = "N")]
    snapshots: Option<u32>,
}

impl Args {
    fn apply(&self, config: &mut EngineConfig) {
        if let Some(frames) = self.frames {
            config.frames = frames;
        }
        if self.realtime {
            config.realtime = true;
        }
        if let Some(interval) = self.snapshots {
            config.snapshot_interval = interval;
        }
    }
}

/// Main entry point.
fn main() -> Result<()> {
    let args = Args::parse();

    // Peek at the log filter before the subscriber exists; load_from logs,
    // so the config is read again once tracing is up.
    let filter = std::fs::read_to_string(&args.config)
        .ok()
        .and_then(|text| toml::from_str::<EngineConfig>(&text).ok())
        .map_or_else(|| EngineConfig::default().log_filter, |c| c.log_filter);

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&filter))?)
        .init();

    info!("Clash starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = EngineConfig::load_from(&args.config);
    args.apply(&mut config);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let summary = runner::run(&config, &mut out).context("match failed")?;

    match summary.winner {
        Some(winner) => info!("{winner} wins after {} frames", summary.frames),
        None => info!("No winner after {} frames", summary.frames),
    }
    Ok(())
}
