//! Error types for camstream
//!
//! Startup and run failures are kept in separate types so that nothing raised
//! once the capture pipeline is running can be handled as a configuration
//! problem, and vice versa.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using CamstreamError
pub type Result<T> = std::result::Result<T, CamstreamError>;

/// Startup-fatal configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be opened or read
    #[error("Could not open config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML
    #[error("Parse error in config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Rotation is not a multiple of 90 degrees
    #[error("Illegal rotation value: {0} (must be 0, 90, 180 or 270)")]
    IllegalRotation(i64),

    /// A setting holds a value the pipeline cannot use
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Errors reported by a capture pipeline implementation
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Operation requires the camera to be opened first
    #[error("Camera has not been opened")]
    NotOpen,

    /// Operation requires the video stream to be configured first
    #[error("Video stream has not been configured")]
    NotConfigured,

    /// Capture was started twice
    #[error("Camera already started")]
    AlreadyStarted,

    /// Device-level failure
    #[error("Device error: {0}")]
    Device(String),
}

/// Errors that abort a run after the capture pipeline has been opened
#[derive(Debug, Error)]
pub enum RunError {
    /// The pipeline delivered a message the event loop does not understand
    #[error("Unrecognised message from capture pipeline: {0}")]
    UnrecognisedMessage(String),

    /// The capture pipeline failed outside of stall recovery
    #[error("Capture pipeline error: {0}")]
    Capture(#[from] CaptureError),
}

/// Top-level error type
#[derive(Debug, Error)]
pub enum CamstreamError {
    /// Failure before any device was opened
    #[error("Configuration error: {0}")]
    Startup(#[from] ConfigError),

    /// Failure during the run
    #[error("Run aborted: {0}")]
    Run(#[from] RunError),

    /// I/O error outside configuration loading
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<CamstreamError>,
    },
}

impl CamstreamError {
    /// Create a config error for an invalid setting
    pub fn invalid_value(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Startup(ConfigError::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        })
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error happened before the pipeline was opened
    pub fn is_startup(&self) -> bool {
        match self {
            Self::Startup(_) => true,
            Self::WithContext { source, .. } => source.is_startup(),
            _ => false,
        }
    }

    /// A short remediation hint for the operator, if one applies
    pub fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Startup(ConfigError::Io { .. }) => {
                Some("Create the file with `camstream config sample > /etc/camstream.toml`")
            }
            Self::Startup(ConfigError::Parse { .. }) => {
                Some("Check the config file syntax with `camstream config check`")
            }
            Self::Startup(ConfigError::IllegalRotation(_)) => {
                Some("Set rotation to one of 0, 90, 180 or 270 in the config file")
            }
            Self::Startup(ConfigError::InvalidValue { .. }) => None,
            Self::Run(RunError::Capture(_)) => {
                Some("Check that the camera is connected and not in use by another process")
            }
            Self::Run(RunError::UnrecognisedMessage(_)) => None,
            Self::Io(_) => None,
            Self::WithContext { source, .. } => source.user_hint(),
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<CamstreamError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}
