//! io-throttle Library
//!
//! This library provides a leaky-bucket I/O throttle: admission control that
//! bounds the bytes/s and ops/s a client or volume may issue against backend
//! storage, in a static or an adaptive (dynamic) regime.

pub mod logging;
pub mod throttle;

pub use throttle::{
    Bucket, BucketPolicy, Clock, FakeClock, LimitConfig, ResourceDimension, Throttle,
    ThrottleConfig, ThrottleError, ThrottleMode, ThrottleSnapshot,
};
