//! Configuration file loading
//!
//! The settings file is a flat TOML document read once at startup. Every
//! key is optional: lookups fall back to the caller's default, and ranged
//! integer lookups clamp instead of failing.

use std::path::{Path, PathBuf};
use toml::{Table, Value};
use tracing::{debug, info, warn};

use crate::error::ConfigError;

/// System-wide settings file
pub const SYSTEM_CONFIG_PATH: &str = "/etc/camstream.toml";

/// Parsed settings file
#[derive(Debug, Clone, Default)]
pub struct Settings {
    table: Table,
    source: Option<PathBuf>,
}

/// Types that can be read out of a settings value
pub trait FromSetting: Sized {
    /// Human-readable type name used in diagnostics
    const TYPE_NAME: &'static str;

    fn from_setting(value: &Value) -> Option<Self>;
}

impl FromSetting for i64 {
    const TYPE_NAME: &'static str = "integer";

    fn from_setting(value: &Value) -> Option<Self> {
        value.as_integer()
    }
}

impl FromSetting for u32 {
    const TYPE_NAME: &'static str = "unsigned integer";

    fn from_setting(value: &Value) -> Option<Self> {
        value.as_integer().and_then(|v| u32::try_from(v).ok())
    }
}

impl FromSetting for f64 {
    const TYPE_NAME: &'static str = "float";

    fn from_setting(value: &Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl FromSetting for f32 {
    const TYPE_NAME: &'static str = "float";

    fn from_setting(value: &Value) -> Option<Self> {
        f64::from_setting(value).map(|v| v as f32)
    }
}

impl FromSetting for bool {
    const TYPE_NAME: &'static str = "boolean";

    fn from_setting(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromSetting for String {
    const TYPE_NAME: &'static str = "string";

    fn from_setting(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl Settings {
    /// Path to load when none is given on the command line
    ///
    /// A per-user file takes priority when it exists, otherwise the
    /// system-wide file is used.
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            let user = config_dir.join("camstream").join("camstream.toml");
            if user.exists() {
                return user;
            }
        }
        PathBuf::from(SYSTEM_CONFIG_PATH)
    }

    /// Load settings from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::default_path())
    }

    /// Load settings from a specific path
    ///
    /// A missing or unreadable file is an error; an empty file is not.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let table: Table = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Loaded configuration from {:?} ({} keys)", path, table.len());
        Ok(Self {
            table,
            source: Some(path.to_path_buf()),
        })
    }

    /// Path the settings were read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Whether a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.table.contains_key(key)
    }

    /// Look up a key, returning `default` when it is missing or mistyped
    pub fn get<T: FromSetting>(&self, key: &str, default: T) -> T {
        let Some(value) = self.table.get(key) else {
            debug!("Setting '{}' not present, using default", key);
            return default;
        };

        match T::from_setting(value) {
            Some(v) => v,
            None => {
                warn!(
                    "Setting '{}' should be a {} but is {}, using default",
                    key,
                    T::TYPE_NAME,
                    value
                );
                default
            }
        }
    }

    /// Look up a key that must have the right type when present
    ///
    /// A missing key yields `default`; a mistyped one is an error.
    pub fn get_required_type<T: FromSetting>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T, ConfigError> {
        let Some(value) = self.table.get(key) else {
            debug!("Setting '{}' not present, using default", key);
            return Ok(default);
        };

        T::from_setting(value).ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("expected {} but found {}", T::TYPE_NAME, value),
        })
    }

    /// Look up an integer key and clamp it into `min..=max`
    ///
    /// Out-of-range values are pulled to the nearest bound with a warning.
    pub fn get_ranged(&self, key: &str, default: i64, min: i64, max: i64) -> i64 {
        let value = self.get(key, default);
        if value > max {
            warn!("Invalid value for {}: {} (clamped to {})", key, value, max);
            max
        } else if value < min {
            warn!("Invalid value for {}: {} (clamped to {})", key, value, min);
            min
        } else {
            value
        }
    }
}

impl std::str::FromStr for Settings {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            table: toml::from_str(s)?,
            source: None,
        })
    }
}

/// Generate a sample configuration file
pub fn sample_config() -> String {
    r#"# camstream configuration
# All keys are optional; the values below are the defaults.

# Capture geometry
width = 1280
height = 720
framerate = 25

# White balance: auto, incandescent, tungsten, fluorescent, indoor, daylight, cloudy
awb = "auto"
# Manual blue/red gains (0.0 = let the camera decide)
b_gain = 0.0
r_gain = 0.0

# Image processing
saturation = 1   # 0-32
sharpness = 1    # 0-16
contrast = 1     # 0-32
brightness = 50  # 0-100

# Exposure: auto, normal, sport, short, long, custom
exposuremode = "auto"
# Metering: average, centre, spot, matrix, custom
meteringmode = "average"

# Orientation: mirror is one of none, horizontal, vertical, both.
# rotation must be 0, 90, 180 or 270.
mirror = "none"
rotation = 0

# Tally state file updated when the operator signals the stream
neopixel_path = "/tmp/neopixel.state"
"#
    .to_string()
}
