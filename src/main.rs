// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use gst_camera::constants::app_info;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "gst-camera")]
#[command(about = "Fixed-profile V4L2 MJPEG camera on GStreamer")]
#[command(version = app_info::version())]
struct Cli {
    /// Config file (default: ~/.config/gst-camera/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the capture device path
    #[arg(long, global = true)]
    device: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream for a while and report frame statistics
    Preview {
        /// Streaming duration in seconds
        #[arg(short, long, default_value = "10")]
        seconds: u64,
    },

    /// Save the latest frame as PNG
    Snapshot {
        /// Output file path (default: ~/Pictures/gst-camera/frame_TIMESTAMP.png)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Zoom level applied before capturing
        #[arg(short, long)]
        zoom: Option<f32>,
    },

    /// Apply a zoom level
    Zoom {
        /// Zoom level within the device range
        level: f32,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=gst_camera=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref(), cli.device)?;

    match cli.command {
        Commands::Preview { seconds } => cli::preview(config, seconds),
        Commands::Snapshot { output, zoom } => cli::snapshot(config, output, zoom),
        Commands::Zoom { level } => cli::zoom(config, level),
        Commands::Config => cli::print_config(&config),
    }
}
