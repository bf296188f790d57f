// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use fingertip_pulse::Config;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "fingertip-pulse")]
#[command(about = "Measure your heart rate with a fingertip on the camera")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure with a V4L2 camera
    Measure {
        /// Camera device (default from config, usually /dev/video0)
        #[arg(short, long)]
        device: Option<String>,

        /// Measurement duration in seconds
        #[arg(short = 't', long)]
        duration: Option<u32>,

        /// Do not switch the torch on
        #[arg(long)]
        no_torch: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Measure a synthetic pulse (no camera needed)
    Simulate {
        /// Pulse rate of the synthetic signal
        #[arg(short, long, default_value = "72")]
        bpm: f64,

        /// Measurement duration in seconds
        #[arg(short = 't', long)]
        duration: Option<u32>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check finger placement and exposure on a still image
    Probe {
        /// Image file (PNG, JPEG, ...)
        image: PathBuf,
    },

    /// List available cameras
    List,

    /// Show the effective configuration
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=fingertip_pulse=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Measure {
            device,
            duration,
            no_torch,
            json,
        } => {
            let mut config = config;
            if let Some(device) = device {
                config.camera_device = device;
            }
            if let Some(duration) = duration {
                config.duration_seconds = duration;
            }
            if no_torch {
                config.torch = false;
            }
            cli::measure(&config, json)
        }
        Commands::Simulate {
            bpm,
            duration,
            json,
        } => {
            let mut config = config;
            if let Some(duration) = duration {
                config.duration_seconds = duration;
            }
            cli::simulate(&config, bpm, json)
        }
        Commands::Probe { image } => cli::probe_image(&image),
        Commands::List => cli::list_cameras(),
        Commands::Config => cli::show_config(&config),
    }
}
