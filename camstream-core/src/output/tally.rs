//! Tally state file
//!
//! A small file holding `1` (on air) or `0` (off air) that an external
//! process watches to drive a tally light.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// On-air flag mirrored to a state file
#[derive(Debug)]
pub struct TallyFile {
    path: PathBuf,
    on_air: bool,
}

impl TallyFile {
    /// Create the tally and reset the state file to off air
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let tally = Self {
            path: path.into(),
            on_air: false,
        };
        tally.write();
        tally
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_on_air(&self) -> bool {
        self.on_air
    }

    /// Flip the on-air state and return the new value
    pub fn toggle(&mut self) -> bool {
        self.on_air = !self.on_air;
        debug!("Tally {}", if self.on_air { "on air" } else { "off air" });
        self.write();
        self.on_air
    }

    fn write(&self) {
        let state = if self.on_air { "1\n" } else { "0\n" };
        if let Err(e) = std::fs::write(&self.path, state) {
            warn!("Failed to write tally state to {:?}: {}", self.path, e);
        }
    }
}

impl Drop for TallyFile {
    fn drop(&mut self) {
        if self.on_air {
            self.on_air = false;
            self.write();
        }
    }
}
