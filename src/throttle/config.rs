//! Throttle Configuration
//!
//! Declarative configuration for a throttle, loadable from JSON or from
//! environment variables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::bucket::BucketPolicy;
use super::clock::Clock;
use super::dimension::ResourceDimension;
use super::error::ThrottleError;
use super::limiter::Throttle;
use super::mode::ThrottleMode;

/// Prefix for every environment variable read by [`ThrottleConfig::from_env`]
pub const ENV_PREFIX: &str = "IOTHROTTLE";

/// Limit for a single dimension
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LimitConfig {
    /// Fixed average (units/s) with optional burst capacity (units)
    Static {
        avg: f64,
        #[serde(default)]
        burst: f64,
    },
    /// Adaptive average between `min` and `max` (units/s)
    Dynamic { min: f64, max: f64, threshold: i64 },
}

impl LimitConfig {
    fn mode(&self) -> ThrottleMode {
        match self {
            LimitConfig::Static { .. } => ThrottleMode::Static,
            LimitConfig::Dynamic { .. } => ThrottleMode::Dynamic,
        }
    }

    /// Policy this limit installs; dynamic limits start at their floor
    pub fn policy(&self) -> BucketPolicy {
        match *self {
            LimitConfig::Static { avg, burst } => BucketPolicy::Static {
                avg,
                burst_capacity: burst,
            },
            LimitConfig::Dynamic {
                min,
                max,
                threshold,
            } => BucketPolicy::Dynamic {
                min,
                avg: min,
                max,
                threshold,
            },
        }
    }
}

/// Throttle configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Throttle mode
    pub mode: ThrottleMode,

    /// Bytes that count as one operation (0 = every operation counts as one)
    pub op_size: u64,

    /// Let static buckets fill up to their burst capacity
    pub allow_burst: bool,

    /// Per-dimension limits
    pub limits: BTreeMap<ResourceDimension, LimitConfig>,
}

impl ThrottleConfig {
    /// Create an empty (disabled) configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ThrottleError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ThrottleError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from `lookup`, which maps variable names to
    /// values.
    ///
    /// Reads `IOTHROTTLE_MODE`, `IOTHROTTLE_OP_SIZE`, `IOTHROTTLE_ALLOW_BURST`
    /// and, for each dimension `DIM` in `BPS`/`OPS`, `IOTHROTTLE_DIM_AVG` and
    /// `IOTHROTTLE_DIM_BURST` (static mode) or `IOTHROTTLE_DIM_MIN`,
    /// `IOTHROTTLE_DIM_MAX` and `IOTHROTTLE_DIM_THRESHOLD` (dynamic mode).
    /// Values that fail to parse are ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{}_{}", ENV_PREFIX, name));
        let mut config = Self::default();

        if let Some(mode) = get("MODE").and_then(|v| v.parse().ok()) {
            config.mode = mode;
        }
        if let Some(op_size) = get("OP_SIZE").and_then(|v| v.parse().ok()) {
            config.op_size = op_size;
        }
        if let Some(allow_burst) = get("ALLOW_BURST").and_then(|v| v.parse().ok()) {
            config.allow_burst = allow_burst;
        }

        for dimension in ResourceDimension::ALL {
            let dim = dimension.as_str().to_ascii_uppercase();
            let number = |field: &str| -> Option<f64> {
                get(&format!("{}_{}", dim, field)).and_then(|v| v.parse().ok())
            };

            let limit = match config.mode {
                ThrottleMode::None => None,
                ThrottleMode::Static => number("AVG").map(|avg| LimitConfig::Static {
                    avg,
                    burst: number("BURST").unwrap_or(0.0),
                }),
                ThrottleMode::Dynamic => match (number("MIN"), number("MAX")) {
                    (Some(min), Some(max)) => Some(LimitConfig::Dynamic {
                        min,
                        max,
                        threshold: get(&format!("{}_THRESHOLD", dim))
                            .and_then(|v| v.parse().ok())
                            .unwrap_or(0),
                    }),
                    _ => None,
                },
            };

            if let Some(limit) = limit {
                config.limits.insert(dimension, limit);
            }
        }

        config
    }

    /// Set the limit for one dimension
    pub fn limit(mut self, dimension: ResourceDimension, limit: LimitConfig) -> Self {
        self.limits.insert(dimension, limit);
        self
    }

    /// Check every limit against the mode and the throttle's range rules
    pub fn validate(&self) -> Result<(), ThrottleError> {
        for (dimension, limit) in &self.limits {
            if limit.mode() != self.mode {
                return Err(ThrottleError::InvalidConfig(format!(
                    "{} limit is {} but mode is {}",
                    dimension,
                    limit.mode(),
                    self.mode
                )));
            }

            limit.policy().check(*dimension)?;
        }
        Ok(())
    }

    /// Build a throttle reading `clock` with this configuration applied
    pub fn build(&self, clock: Clock) -> Result<Throttle, ThrottleError> {
        let throttle = Throttle::with_clock(self.op_size, clock);
        self.apply(&throttle)?;
        Ok(throttle)
    }

    /// Replace an existing throttle's configuration with this one.
    ///
    /// Buckets from the previous configuration are dropped. The configuration
    /// is validated first, so a rejected configuration leaves the throttle
    /// untouched.
    pub fn apply(&self, throttle: &Throttle) -> Result<(), ThrottleError> {
        self.validate()?;
        let policies = self
            .limits
            .iter()
            .map(|(dimension, limit)| (*dimension, limit.policy()))
            .collect();
        throttle.reconfigure(self.mode, self.op_size, self.allow_burst, policies)
    }
}
