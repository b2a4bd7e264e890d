//! Camstream CLI
//!
//! Camera capture event loop for headless streaming rigs.
//!
//! # Usage
//!
//! ```bash
//! # Stream raw frames to stdout until SIGUSR2 or Ctrl+C
//! camstream run --signal -o - | ffplay -f rawvideo -pixel_format yuv420p -video_size 1280x720 -
//!
//! # Capture 100 frames to a file
//! camstream run --frames 100 -o capture.yuv
//!
//! # Check the configuration file
//! camstream config check
//! ```

mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use camstream_core::CamstreamError;

/// Exit status for any fatal error
const EXIT_FAILURE: u8 = 255;

/// Camstream - camera capture event loop
#[derive(Parser)]
#[command(name = "camstream")]
#[command(version)]
#[command(about = "Camera capture event loop for headless streaming rigs", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture frames and stream them to the output
    Run(commands::RunArgs),

    /// Inspect the configuration file
    Config(commands::ConfigArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so stdout can carry frames
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = match format!("camstream={}", level).parse() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run(args) => commands::run(args).await,
        Commands::Config(args) => commands::config(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let hint = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<CamstreamError>())
                .and_then(CamstreamError::user_hint);
            if let Some(hint) = hint {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
