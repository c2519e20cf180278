//! Leaky Bucket I/O Throttle
//!
//! Admission control for a shared resource accessed by many concurrent
//! operations. Usage is tracked per resource dimension (bytes/s, ops/s) in a
//! leaky bucket that drains at the dimension's average rate; an operation may
//! start only while no bucket is over what its rate allows.
//!
//! # Features
//!
//! - Static mode: fixed averages, optional burst capacity
//! - Dynamic mode: adaptive averages between a floor and a ceiling, stepped
//!   up or reset by an external controller
//! - Size-to-operation translation through a configurable op size
//! - Injectable clock for deterministic tests and simulation
//!
//! # Usage
//!
//! ```text
//!   configure ──► can_schedule? ──yes──► run op ──► account(size)
//!                      │
//!                      no ──► caller waits (wait_time) and retries
//!
//!   external controller ──► increase_average / reset_average
//! ```

pub mod bucket;
pub mod clock;
pub mod config;
pub mod dimension;
pub mod error;
pub mod limiter;
pub mod mode;
pub mod snapshot;

#[cfg(test)]
mod proptests;

pub use bucket::{Bucket, BucketPolicy};
pub use clock::{Clock, FakeClock};
pub use config::{LimitConfig, ThrottleConfig};
pub use dimension::ResourceDimension;
pub use error::ThrottleError;
pub use limiter::Throttle;
pub use mode::ThrottleMode;
pub use snapshot::ThrottleSnapshot;
