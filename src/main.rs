//! PartScan scanning station
//!
//! Usage:
//!     partscan --source ./frames --preview /tmp/preview.png
//!
//! The same binary runs the capture worker when started with `--worker`.

mod capture;
mod catalog;
mod channel;
mod config;
mod core;
mod domain;
mod protocol;
mod render;
mod session;
mod worker;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use config::StationConfig;

#[derive(Parser, Debug)]
#[command(name = "partscan", version, about = "Barcode and datamatrix scanning station")]
struct Args {
    /// Frame source: an image file or a directory of frames
    #[arg(long)]
    source: Option<String>,

    /// Config file (default: <config dir>/partscan/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where the live preview PNG is written
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Supplier catalog API key
    #[arg(long, env = "MOUSER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    save_config: bool,

    /// Run as the capture worker (protocol on stdin/stdout)
    #[arg(long, hide = true)]
    worker: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    if args.worker {
        return worker::run_process();
    }

    let mut config = StationConfig::load(args.config.as_deref());
    if let Some(source) = args.source {
        config.source_selector = source;
    }
    if let Some(preview) = args.preview {
        config.preview_path = preview;
    }

    if args.save_config {
        let path = args
            .config
            .or_else(StationConfig::default_path)
            .context("No config directory available")?;
        config.save(&path)?;
        log::info!("Saved config to {}", path.display());
        return Ok(());
    }

    // Keys from the environment are never written to the config file
    if args.api_key.is_some() {
        config.api_key = args.api_key;
    }

    log::info!("Starting PartScan");
    log::info!("  Source: {}", config.source_selector);
    log::info!("  Preview: {}", config.preview_path.display());
    core::app::run(config)
}
