//! Run configuration for camstream
//!
//! `RunOptions` is built once at startup from the settings file and command
//! line, then handed to the event loop which only ever reads it.

mod file;

pub use file::{sample_config, FromSetting, Settings, SYSTEM_CONFIG_PATH};

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::transform::{self, Mirror, Transform};

/// Default tally state file
pub const DEFAULT_NEOPIXEL_PATH: &str = "/tmp/neopixel.state";

/// Termination budget for a run
///
/// Either limit may be unset. When a frame budget is present the wall-clock
/// timeout is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Budget {
    /// Wall-clock limit since the last clock reset
    pub timeout: Option<Duration>,
    /// Committed-frame limit since the last clock reset
    pub frames: Option<u64>,
}

impl Budget {
    /// Run until stopped by the operator or the pipeline
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Build a budget, treating zero as "not set"
    pub fn new(timeout: Option<Duration>, frames: Option<u64>) -> Self {
        Self {
            timeout: timeout.filter(|t| !t.is_zero()),
            frames: frames.filter(|&n| n > 0),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.timeout.is_none() && self.frames.is_none()
    }
}

impl std::fmt::Display for Budget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.frames, self.timeout) {
            (Some(frames), _) => write!(f, "{} frames", frames),
            (None, Some(timeout)) => write!(f, "{} ms", timeout.as_millis()),
            (None, None) => write!(f, "unlimited"),
        }
    }
}

/// Complete run configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Capture width in pixels
    pub width: u32,
    /// Capture height in pixels
    pub height: u32,
    /// Capture framerate
    pub framerate: u32,
    /// Output codec handed to the encoder
    pub codec: String,
    /// Denoise mode
    pub denoise: String,
    /// Show a local preview window
    pub preview: bool,
    /// White balance mode
    pub awb: String,
    /// Manual blue gain (0 = automatic)
    pub awb_gain_b: f32,
    /// Manual red gain (0 = automatic)
    pub awb_gain_r: f32,
    pub saturation: i64,
    pub sharpness: i64,
    pub contrast: i64,
    /// Brightness on the pipeline's signed scale
    pub brightness: i64,
    /// Exposure mode
    pub exposure: String,
    /// Metering mode
    pub metering: String,
    /// Combined mirror and rotation
    pub transform: Transform,
    /// Termination budget
    pub budget: Budget,
    /// Poll stdin for operator keys
    pub keypress: bool,
    /// React to SIGUSR1/SIGUSR2/SIGPIPE
    pub signal: bool,
    /// Tally state file forwarded to the output sink
    pub neopixel_path: PathBuf,
    /// Where encoded frames go
    pub output: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            framerate: 25,
            codec: "yuv420".to_string(),
            denoise: "off".to_string(),
            preview: false,
            awb: "auto".to_string(),
            awb_gain_b: 0.0,
            awb_gain_r: 0.0,
            saturation: 1,
            sharpness: 1,
            contrast: 1,
            brightness: brightness_from_percent(50),
            exposure: "auto".to_string(),
            metering: "average".to_string(),
            transform: Transform::IDENTITY,
            budget: Budget::unlimited(),
            keypress: false,
            signal: false,
            neopixel_path: PathBuf::from(DEFAULT_NEOPIXEL_PATH),
            output: "none".to_string(),
        }
    }
}

/// Map the 0-100 operator brightness scale onto the pipeline's signed scale
///
/// Uses integer division, so only 0, 50 and 100 map to distinct values
/// (-1, 0 and 1).
pub fn brightness_from_percent(percent: i64) -> i64 {
    (percent / 50) - 1
}

impl RunOptions {
    /// Build options from a settings file
    ///
    /// Fails only on settings that cannot be used at all, such as a rotation
    /// that is not an integer quarter turn or a non-positive geometry.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let width = positive(settings, "width", defaults.width)?;
        let height = positive(settings, "height", defaults.height)?;
        let framerate = positive(settings, "framerate", defaults.framerate)?;

        let mirror = Mirror::parse_lenient(&settings.get("mirror", "none".to_string()));
        let rotation = settings.get_required_type("rotation", 0i64)?;
        let transform = transform::resolve(mirror, rotation)?;

        Ok(Self {
            width,
            height,
            framerate,
            awb: settings.get("awb", defaults.awb),
            awb_gain_b: settings.get("b_gain", defaults.awb_gain_b),
            awb_gain_r: settings.get("r_gain", defaults.awb_gain_r),
            saturation: settings.get_ranged("saturation", 1, 0, 32),
            sharpness: settings.get_ranged("sharpness", 1, 0, 16),
            contrast: settings.get_ranged("contrast", 1, 0, 32),
            brightness: brightness_from_percent(settings.get_ranged("brightness", 50, 0, 100)),
            exposure: settings.get("exposuremode", defaults.exposure),
            metering: settings.get("meteringmode", defaults.metering),
            transform,
            neopixel_path: PathBuf::from(
                settings.get("neopixel_path", DEFAULT_NEOPIXEL_PATH.to_string()),
            ),
            ..defaults
        })
    }

    /// Set the termination budget
    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    /// Enable or disable stdin key polling
    pub fn with_keypress(mut self, enabled: bool) -> Self {
        self.keypress = enabled;
        self
    }

    /// Enable or disable signal-driven control
    pub fn with_signal(mut self, enabled: bool) -> Self {
        self.signal = enabled;
        self
    }

    /// Set the output target
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// Override the capture geometry
    pub fn with_geometry(mut self, width: u32, height: u32, framerate: u32) -> Self {
        self.width = width;
        self.height = height;
        self.framerate = framerate;
        self
    }

    /// Interval between frames at the configured framerate
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.framerate.max(1) as f64)
    }

    /// Size of one YUV420 frame in bytes
    pub fn frame_size(&self) -> usize {
        let luma = self.width as usize * self.height as usize;
        luma + luma / 2
    }

    /// Check for settings the pipeline cannot run with
    pub fn validate_strict(&self) -> Result<(), ConfigError> {
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(ConfigError::InvalidValue {
                key: "width/height".to_string(),
                reason: format!(
                    "{}x{} must be even for YUV420 output",
                    self.width, self.height
                ),
            });
        }

        if self.width > 4056 || self.height > 3040 {
            return Err(ConfigError::InvalidValue {
                key: "width/height".to_string(),
                reason: format!(
                    "{}x{} exceeds the maximum sensor size (4056x3040)",
                    self.width, self.height
                ),
            });
        }

        if self.framerate > 120 {
            return Err(ConfigError::InvalidValue {
                key: "framerate".to_string(),
                reason: format!("{} exceeds the maximum of 120", self.framerate),
            });
        }

        Ok(())
    }
}

fn positive(settings: &Settings, key: &str, default: u32) -> Result<u32, ConfigError> {
    let value = settings.get(key, default as i64);
    u32::try_from(value)
        .ok()
        .filter(|&v| v > 0)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("{} is not a positive integer", value),
        })
}
