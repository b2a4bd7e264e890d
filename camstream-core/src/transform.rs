//! Geometric transform resolution
//!
//! Cameras can only flip and transpose the sensor readout, so every
//! supported orientation is one of eight combinations of horizontal flip,
//! vertical flip and transpose. Rotations are limited to quarter turns.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

const HFLIP_BIT: u8 = 1;
const VFLIP_BIT: u8 = 2;
const TRANSPOSE_BIT: u8 = 4;

/// A combination of flips and transpose applied to captured images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Transform(u8);

impl Transform {
    pub const IDENTITY: Self = Self(0);
    pub const HFLIP: Self = Self(HFLIP_BIT);
    pub const VFLIP: Self = Self(VFLIP_BIT);
    pub const HVFLIP: Self = Self(HFLIP_BIT | VFLIP_BIT);
    pub const TRANSPOSE: Self = Self(TRANSPOSE_BIT);
    pub const ROT90: Self = Self(VFLIP_BIT | TRANSPOSE_BIT);
    pub const ROT180: Self = Self::HVFLIP;
    pub const ROT270: Self = Self(HFLIP_BIT | TRANSPOSE_BIT);
    pub const ROT180_TRANSPOSE: Self = Self(HFLIP_BIT | VFLIP_BIT | TRANSPOSE_BIT);

    /// Transform for a clockwise rotation in degrees
    ///
    /// Angles are taken modulo 360; anything that is not a quarter turn
    /// returns `None`.
    pub fn from_rotation(degrees: i64) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Self::IDENTITY),
            90 => Some(Self::ROT90),
            180 => Some(Self::ROT180),
            270 => Some(Self::ROT270),
            _ => None,
        }
    }

    /// Compose two transforms: apply `self` first, then `next`
    pub fn then(self, next: Self) -> Self {
        // A transpose in `next` swaps the axes that our flips act on.
        let mut reordered = self.0;
        if next.0 & TRANSPOSE_BIT != 0 {
            reordered = self.0 & TRANSPOSE_BIT;
            if self.0 & HFLIP_BIT != 0 {
                reordered |= VFLIP_BIT;
            }
            if self.0 & VFLIP_BIT != 0 {
                reordered |= HFLIP_BIT;
            }
        }
        Self(reordered ^ next.0)
    }

    /// The transform that undoes this one
    pub fn inverse(self) -> Self {
        if self.0 & TRANSPOSE_BIT == 0 {
            return self;
        }
        let mut adjusted = TRANSPOSE_BIT;
        if self.0 & HFLIP_BIT != 0 {
            adjusted |= VFLIP_BIT;
        }
        if self.0 & VFLIP_BIT != 0 {
            adjusted |= HFLIP_BIT;
        }
        Self(adjusted)
    }

    pub fn is_identity(self) -> bool {
        self.0 == 0
    }

    pub fn hflip(self) -> bool {
        self.0 & HFLIP_BIT != 0
    }

    pub fn vflip(self) -> bool {
        self.0 & VFLIP_BIT != 0
    }

    pub fn transpose(self) -> bool {
        self.0 & TRANSPOSE_BIT != 0
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "identity",
            1 => "hflip",
            2 => "vflip",
            3 => "hvflip",
            4 => "transpose",
            5 => "rot270",
            6 => "rot90",
            _ => "rot180transpose",
        }
    }
}

impl std::fmt::Display for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Mirror mode from the `mirror` setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mirror {
    #[default]
    None,
    Horizontal,
    Vertical,
    Both,
}

impl Mirror {
    /// Parse a mirror setting, treating unknown values as `None`
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            warn!("Unknown mirror mode '{}', using none", value);
            Self::None
        })
    }

    /// Flip transform for this mode (horizontal flip applied before vertical)
    pub fn transform(self) -> Transform {
        let (hflip, vflip) = match self {
            Self::None => (false, false),
            Self::Horizontal => (true, false),
            Self::Vertical => (false, true),
            Self::Both => (true, true),
        };

        let mut transform = Transform::IDENTITY;
        if hflip {
            transform = transform.then(Transform::HFLIP);
        }
        if vflip {
            transform = transform.then(Transform::VFLIP);
        }
        transform
    }
}

impl std::fmt::Display for Mirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Horizontal => write!(f, "horizontal"),
            Self::Vertical => write!(f, "vertical"),
            Self::Both => write!(f, "both"),
        }
    }
}

impl std::str::FromStr for Mirror {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "horizontal" => Ok(Self::Horizontal),
            "vertical" => Ok(Self::Vertical),
            "both" => Ok(Self::Both),
            _ => Err(format!("Unknown mirror mode: {}", s)),
        }
    }
}

/// Combine a mirror mode and a rotation into one transform
///
/// The mirror is applied first and the rotation on top of it. Rotations that
/// are not quarter turns are rejected.
pub fn resolve(mirror: Mirror, rotation: i64) -> Result<Transform, ConfigError> {
    let rotation_transform =
        Transform::from_rotation(rotation).ok_or(ConfigError::IllegalRotation(rotation))?;
    Ok(mirror.transform().then(rotation_transform))
}
