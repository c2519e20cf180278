//! Throttle Error Types

use super::dimension::ResourceDimension;
use super::mode::ThrottleMode;

/// Error types for throttle configuration
#[derive(Debug, thiserror::Error)]
pub enum ThrottleError {
    /// Rate parameters out of range for a dimension
    #[error("Invalid parameters for {0}: {1}")]
    InvalidParameters(ResourceDimension, String),

    /// Configuration attempted while the throttle is in another mode
    #[error("Throttle is in {actual} mode, set {expected} mode first")]
    ModeMismatch {
        expected: ThrottleMode,
        actual: ThrottleMode,
    },

    /// Unrecognized throttle mode value
    #[error("Invalid throttle mode: {0}")]
    InvalidMode(String),

    /// Unrecognized resource dimension
    #[error("Unknown resource dimension: {0}")]
    UnknownDimension(String),

    /// Invalid configuration document
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
