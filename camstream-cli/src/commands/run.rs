//! Run command - capture and stream until a stop condition fires

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use camstream_core::capture::TestPatternPipeline;
use camstream_core::control::{install_signal_handlers, ControlMonitor};
use camstream_core::output::{self, StreamOutput};
use camstream_core::{Budget, CamstreamError, EventLoop, RunOptions};

/// Arguments for the run command
#[derive(Args)]
pub struct RunArgs {
    /// Config file (defaults to the per-user file, then /etc/camstream.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many milliseconds (0 = no limit)
    #[arg(short, long, default_value = "0")]
    timeout: u64,

    /// Stop after this many committed frames (0 = no limit, overrides --timeout)
    #[arg(long, default_value = "0")]
    frames: u64,

    /// Read operator keys from stdin (Enter = signal, x = quit)
    #[arg(short, long)]
    keypress: bool,

    /// React to SIGUSR1 (signal) and SIGUSR2 (quit)
    #[arg(short, long)]
    signal: bool,

    /// Output target: "-" for stdout, tcp://host:port, a file path, or "none"
    #[arg(short, long)]
    output: Option<String>,

    /// Frames to hold back before the first committed frame
    #[arg(long, default_value = "0")]
    sync_frames: u64,

    /// Override the configured width
    #[arg(long)]
    width: Option<u32>,

    /// Override the configured height
    #[arg(long)]
    height: Option<u32>,

    /// Override the configured framerate
    #[arg(long)]
    framerate: Option<u32>,
}

impl RunArgs {
    /// Resolve the config file and overlay command-line flags
    fn options(&self) -> Result<RunOptions, CamstreamError> {
        let settings = super::load_settings(self.config.as_deref())?;
        let options = self.overlay(RunOptions::from_settings(&settings)?);
        options.validate_strict()?;
        Ok(options)
    }

    /// Apply command-line flags on top of the configured options
    fn overlay(&self, options: RunOptions) -> RunOptions {
        let width = self.width.unwrap_or(options.width);
        let height = self.height.unwrap_or(options.height);
        let framerate = self.framerate.unwrap_or(options.framerate);

        let options = options
            .with_geometry(width, height, framerate)
            .with_budget(Budget::new(
                Some(Duration::from_millis(self.timeout)),
                Some(self.frames),
            ))
            .with_keypress(self.keypress)
            .with_signal(self.signal);

        match &self.output {
            Some(output) => options.with_output(output.as_str()),
            None => options,
        }
    }
}

/// Run the capture event loop
pub async fn run(args: RunArgs) -> Result<()> {
    let options = args.options().context("Invalid configuration")?;

    info!(
        "Starting capture: {}x{} @ {}fps, transform {}, budget {}, output {}",
        options.width,
        options.height,
        options.framerate,
        options.transform,
        options.budget,
        options.output
    );

    install_signal_handlers().context("Failed to install signal handlers")?;

    let sink = StreamOutput::from_options(&options)
        .with_context(|| format!("Failed to open output '{}'", options.output))?;

    let pipeline = TestPatternPipeline::new(options.clone()).with_sync_frames(args.sync_frames);
    let monitor = ControlMonitor::from_options(&options);
    let mut event_loop = EventLoop::new(pipeline, output::shared(sink), options, monitor);

    let summary = event_loop
        .run()
        .await
        .map_err(CamstreamError::from)
        .context("Capture failed")?;

    eprintln!("{}", summary);
    Ok(())
}
