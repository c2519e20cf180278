//! Resource Dimensions
//!
//! Each dimension is an independently rate-limited resource axis. Anything
//! that differs between dimensions (how an operation's size translates into
//! units, how fast the adaptive average climbs) lives here so the throttle
//! itself never special-cases a dimension.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::ThrottleError;

/// Bytes/s added to the adaptive average per increase step (1 MiB)
pub const BPS_INCREASE_UNIT: f64 = 1_048_576.0;

/// Ops/s added to the adaptive average per increase step
pub const OPS_INCREASE_UNIT: f64 = 1.0;

/// A rate-limited resource axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceDimension {
    /// Total bytes per second
    BytesPerSecTotal,
    /// Total operations per second
    OpsPerSecTotal,
}

impl ResourceDimension {
    /// Every dimension, in the order the wait computation checks them
    pub const ALL: [ResourceDimension; 2] = [
        ResourceDimension::BytesPerSecTotal,
        ResourceDimension::OpsPerSecTotal,
    ];

    /// Short name used in logs, env variables and the CLI
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceDimension::BytesPerSecTotal => "bps",
            ResourceDimension::OpsPerSecTotal => "ops",
        }
    }

    /// Step applied to a dynamic bucket's average on each increase
    pub fn increase_unit(&self) -> f64 {
        match self {
            ResourceDimension::BytesPerSecTotal => BPS_INCREASE_UNIT,
            ResourceDimension::OpsPerSecTotal => OPS_INCREASE_UNIT,
        }
    }

    /// Units consumed by an operation of `size` bytes.
    ///
    /// For the ops dimension an operation larger than `op_size` counts as
    /// `size / op_size` (fractional) operations; anything else is one.
    pub fn usage(&self, size: u64, op_size: u64) -> f64 {
        match self {
            ResourceDimension::BytesPerSecTotal => size as f64,
            ResourceDimension::OpsPerSecTotal => {
                if op_size > 0 && size > op_size {
                    size as f64 / op_size as f64
                } else {
                    1.0
                }
            }
        }
    }
}

impl fmt::Display for ResourceDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceDimension {
    type Err = ThrottleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bps" | "bytes" | "bytes_per_sec_total" => Ok(ResourceDimension::BytesPerSecTotal),
            "ops" | "iops" | "ops_per_sec_total" => Ok(ResourceDimension::OpsPerSecTotal),
            other => Err(ThrottleError::UnknownDimension(other.to_string())),
        }
    }
}

impl TryFrom<i64> for ResourceDimension {
    type Error = ThrottleError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ResourceDimension::BytesPerSecTotal),
            1 => Ok(ResourceDimension::OpsPerSecTotal),
            other => Err(ThrottleError::UnknownDimension(other.to_string())),
        }
    }
}
