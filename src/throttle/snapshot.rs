//! Throttle Snapshots
//!
//! Point-in-time copy of a throttle's configuration and accounting state,
//! for monitoring and for the CLI.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::bucket::Bucket;
use super::dimension::ResourceDimension;
use super::error::ThrottleError;
use super::mode::ThrottleMode;

/// Snapshot of a [`Throttle`](super::Throttle)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrottleSnapshot {
    /// Current mode
    pub mode: ThrottleMode,

    /// Whether the configuration gates anything
    pub enabled: bool,

    /// Bytes per operation for the ops dimension (0 = unset)
    pub op_size: u64,

    /// Whether static buckets may use their burst capacity
    pub allow_burst: bool,

    /// Every adaptive average is at its ceiling
    pub avg_is_max: bool,

    /// Adaptive averages are at their floor
    pub avg_reset: bool,

    /// Configured buckets
    pub buckets: BTreeMap<ResourceDimension, Bucket>,
}

impl ThrottleSnapshot {
    pub fn bucket(&self, dimension: ResourceDimension) -> Option<&Bucket> {
        self.buckets.get(&dimension)
    }

    /// Render as pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, ThrottleError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
