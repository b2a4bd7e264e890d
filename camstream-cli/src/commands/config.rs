//! Config command - inspect configuration files

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

use camstream_core::config::{sample_config, Settings};
use camstream_core::{CamstreamError, RunOptions};

/// Arguments for the config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Config file (defaults to the per-user file, then /etc/camstream.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the path to the config file
    Path,

    /// Show the current configuration file
    Show,

    /// Print a sample configuration to stdout
    Sample,

    /// Load the configuration and print the resolved run options
    Check,
}

/// Run config subcommand
pub fn config(args: ConfigArgs) -> Result<()> {
    let path = args.config.clone().unwrap_or_else(Settings::default_path);

    match args.command {
        ConfigCommand::Path => {
            println!("{}", path.display());
            if path.exists() {
                println!("(file exists)");
            } else {
                println!("(file does not exist)");
            }
        }
        ConfigCommand::Show => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;

            println!("Configuration file: {}\n", path.display());
            println!("{}", content);
        }
        ConfigCommand::Sample => {
            print!("{}", sample_config());
        }
        ConfigCommand::Check => {
            let options = check(&path).context("Configuration check failed")?;

            println!("Configuration OK: {}\n", path.display());
            println!("  Resolution:  {}x{}", options.width, options.height);
            println!("  Framerate:   {} fps", options.framerate);
            println!("  Transform:   {}", options.transform);
            println!(
                "  AWB:         {} (b {:.2}, r {:.2})",
                options.awb, options.awb_gain_b, options.awb_gain_r
            );
            println!("  Exposure:    {}", options.exposure);
            println!("  Metering:    {}", options.metering);
            println!("  Saturation:  {}", options.saturation);
            println!("  Sharpness:   {}", options.sharpness);
            println!("  Contrast:    {}", options.contrast);
            println!("  Brightness:  {}", options.brightness);
            println!("  Tally file:  {}", options.neopixel_path.display());
        }
    }

    Ok(())
}

fn check(path: &Path) -> Result<RunOptions, CamstreamError> {
    let settings = Settings::load_from(path)?;
    let options = RunOptions::from_settings(&settings)?;
    options.validate_strict()?;
    Ok(options)
}
