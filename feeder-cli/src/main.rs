//! # dcs-feeder
//!
//! Command-line feeder bridging DCS-BIOS telemetry to a variable sink.
//!
//! ## Commands
//!
//! - `run`: Read telemetry from stdin and flush changes as JSON lines
//! - `check`: Validate a configuration file and print a summary
//!
//! ## Example
//!
//! ```bash
//! # Validate configuration
//! dcs-feeder --config feeder.toml check
//!
//! # Feed telemetry (one `KEY VALUE` per line)
//! printf '_ACFT_NAME F-16C_50\nRPM 80\n' | dcs-feeder --config feeder.toml run
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod input;

use commands::{check, run};

/// Change-buffered feeder from DCS-BIOS telemetry to a variable sink.
#[derive(Parser, Debug)]
#[command(name = "dcs-feeder")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./feeder.toml when present)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read telemetry lines from stdin and synchronize them
    Run {
        /// Override the address commands are forwarded to
        #[arg(long)]
        upstream: Option<String>,
    },

    /// Validate the configuration and print a summary
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Stdout carries batches, so logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { upstream } => {
            run::run(config, upstream).await?;
        }
        Commands::Check => {
            check::run(&config);
        }
    }

    Ok(())
}
