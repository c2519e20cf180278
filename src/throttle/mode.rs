//! Throttle Modes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::ThrottleError;

/// Which configuration regime the throttle runs under
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleMode {
    /// No throttling, admission always succeeds
    #[default]
    None,
    /// Fixed per-dimension averages, optionally with burst capacity
    Static,
    /// Adaptive averages between a floor and a ceiling
    Dynamic,
}

impl ThrottleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThrottleMode::None => "none",
            ThrottleMode::Static => "static",
            ThrottleMode::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for ThrottleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThrottleMode {
    type Err = ThrottleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "0" => Ok(ThrottleMode::None),
            "static" | "1" => Ok(ThrottleMode::Static),
            "dynamic" | "2" => Ok(ThrottleMode::Dynamic),
            other => Err(ThrottleError::InvalidMode(other.to_string())),
        }
    }
}

/// Raw mode numbering: 0 = none, 1 = static, 2 = dynamic
impl TryFrom<i64> for ThrottleMode {
    type Error = ThrottleError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ThrottleMode::None),
            1 => Ok(ThrottleMode::Static),
            2 => Ok(ThrottleMode::Dynamic),
            other => Err(ThrottleError::InvalidMode(other.to_string())),
        }
    }
}
