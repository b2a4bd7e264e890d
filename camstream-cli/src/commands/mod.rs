//! CLI command implementations

mod config;
mod run;

pub use config::{config, ConfigArgs};
pub use run::{run, RunArgs};

use camstream_core::config::Settings;
use camstream_core::ConfigError;
use std::path::Path;

/// Load an explicit config file, or the default one
fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    match path {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
}
