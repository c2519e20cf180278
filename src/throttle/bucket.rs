//! Leaky Bucket State
//!
//! A bucket accumulates usage in `level` and drains it continuously at the
//! bucket's average rate. How the average is chosen depends on the policy:
//!
//! - `Static`: a fixed average, plus an optional burst capacity (in units)
//!   the level may reach before operations are held back.
//! - `Dynamic`: an adaptive average that moves between a floor and a ceiling
//!   (both in units per second), driven by an external controller.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::dimension::ResourceDimension;
use super::error::ThrottleError;

/// How a bucket's drain rate is determined
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BucketPolicy {
    /// Fixed average goal
    Static {
        /// Units per second
        avg: f64,
        /// Units allowed to accumulate when bursting is allowed
        burst_capacity: f64,
    },
    /// Adaptive average goal, `min <= avg <= max`
    Dynamic {
        /// Floor, units per second
        min: f64,
        /// Current goal, units per second
        avg: f64,
        /// Ceiling, units per second
        max: f64,
        /// Hint for the external controller; never read by the throttle
        threshold: i64,
    },
}

impl BucketPolicy {
    pub fn avg(&self) -> f64 {
        match *self {
            BucketPolicy::Static { avg, .. } | BucketPolicy::Dynamic { avg, .. } => avg,
        }
    }

    /// Adaptive floor (zero for static buckets)
    pub fn min(&self) -> f64 {
        match *self {
            BucketPolicy::Static { .. } => 0.0,
            BucketPolicy::Dynamic { min, .. } => min,
        }
    }

    /// Adaptive ceiling for dynamic buckets, burst capacity for static ones
    pub fn max(&self) -> f64 {
        match *self {
            BucketPolicy::Static { burst_capacity, .. } => burst_capacity,
            BucketPolicy::Dynamic { max, .. } => max,
        }
    }

    pub fn threshold(&self) -> i64 {
        match *self {
            BucketPolicy::Static { .. } => 0,
            BucketPolicy::Dynamic { threshold, .. } => threshold,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, BucketPolicy::Dynamic { .. })
    }

    /// Range rules shared by the throttle setters and config validation
    pub(crate) fn check(&self, dimension: ResourceDimension) -> Result<(), ThrottleError> {
        match *self {
            BucketPolicy::Static {
                avg,
                burst_capacity,
            } => {
                if !is_rate(avg) || !is_rate(burst_capacity) {
                    return Err(ThrottleError::InvalidParameters(
                        dimension,
                        format!(
                            "avg {} and burst {} must be finite and >= 0",
                            avg, burst_capacity
                        ),
                    ));
                }
            }
            BucketPolicy::Dynamic {
                min,
                max,
                threshold,
                ..
            } => {
                if !is_rate(min) || !is_rate(max) || min > max || threshold < 0 {
                    return Err(ThrottleError::InvalidParameters(
                        dimension,
                        format!(
                            "need 0 <= min ({}) <= max ({}) and threshold ({}) >= 0",
                            min, max, threshold
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn is_rate(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// Per-dimension bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Rate policy
    pub policy: BucketPolicy,

    /// Accumulated, not yet leaked usage in units. Never negative.
    pub level: f64,
}

impl Bucket {
    /// Create an empty bucket
    pub fn new(policy: BucketPolicy) -> Self {
        Self { policy, level: 0.0 }
    }

    pub fn avg(&self) -> f64 {
        self.policy.avg()
    }

    /// Drain the bucket for `elapsed` at the current average
    pub fn leak(&mut self, elapsed: Duration) {
        let leak = self.avg() * elapsed.as_secs_f64();
        self.level = (self.level - leak).max(0.0);
    }

    /// Seconds an operation has to wait before this bucket lets it through.
    ///
    /// With `burst` set, a static bucket tolerates a level up to its burst
    /// capacity; otherwise the tolerance is one second worth of average.
    pub fn wait_secs(&self, burst: bool) -> f64 {
        let avg = self.avg();
        if avg == 0.0 {
            return 0.0;
        }

        let allowed = match self.policy {
            BucketPolicy::Static { burst_capacity, .. } if burst => burst_capacity,
            _ => avg,
        };

        let extra = self.level - allowed;
        if extra <= 0.0 {
            return 0.0;
        }
        extra / avg
    }

    /// Add consumed units
    pub fn fill(&mut self, units: f64) {
        self.level += units;
    }

    /// Add then subtract, clamping the level at zero
    pub fn adjust(&mut self, add: f64, subtract: f64) {
        self.level += add;
        if self.level >= subtract {
            self.level -= subtract;
        } else {
            self.level = 0.0;
        }
    }

    /// Step the adaptive average toward its ceiling.
    ///
    /// Returns whether the average now sits at the ceiling. Static buckets
    /// have no adaptive average: they are left alone and report saturated.
    pub fn increase_average(&mut self, unit: f64) -> bool {
        match &mut self.policy {
            BucketPolicy::Static { .. } => true,
            BucketPolicy::Dynamic { avg, max, .. } => {
                *avg = (*avg + unit).min(*max);
                *avg >= *max
            }
        }
    }

    /// Drop the adaptive average back to its floor
    pub fn reset_average(&mut self) {
        if let BucketPolicy::Dynamic { min, avg, .. } = &mut self.policy {
            *avg = *min;
        }
    }
}
