//! Leaky Bucket Throttle
//!
//! The throttle answers one question for an I/O issuer: would starting an
//! operation right now violate the configured rates? Callers configure it,
//! ask [`Throttle::can_schedule`] before each operation and report what the
//! operation consumed through [`Throttle::account`]. Waiting and retrying is
//! up to the caller.
//!
//! All state sits behind a single mutex. Every critical section is bounded by
//! the number of configured dimensions and never calls out to caller code.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::bucket::{Bucket, BucketPolicy};
use super::clock::Clock;
use super::dimension::ResourceDimension;
use super::error::ThrottleError;
use super::mode::ThrottleMode;
use super::snapshot::ThrottleSnapshot;

#[derive(Debug)]
struct ThrottleState {
    buckets: BTreeMap<ResourceDimension, Bucket>,
    op_size: u64,
    mode: ThrottleMode,
    enabled: bool,
    allow_burst: bool,
    previous_leak: Instant,
    avg_is_max: bool,
    avg_reset: bool,
}

impl ThrottleState {
    /// Whether any configured limit can actually hold operations back
    fn compute_enabled(&self) -> bool {
        match self.mode {
            ThrottleMode::None => false,
            ThrottleMode::Static => self.buckets.values().any(|bucket| bucket.avg() > 0.0),
            // Either dimension fully configured is enough
            ThrottleMode::Dynamic => ResourceDimension::ALL
                .iter()
                .filter_map(|dimension| self.buckets.get(dimension))
                .any(|bucket| match bucket.policy {
                    BucketPolicy::Dynamic {
                        min, max, threshold, ..
                    } => min > 0.0 && max > 0.0 && threshold > 0,
                    BucketPolicy::Static { .. } => false,
                }),
        }
    }

    fn refresh_enabled(&mut self) {
        self.enabled = self.compute_enabled();
        debug!(
            mode = %self.mode,
            enabled = self.enabled,
            "leaky bucket throttle is {}",
            if self.enabled { "enabled" } else { "NOT enabled" }
        );
    }

    /// Install or replace the policy for `dimension`, keeping its level
    fn install(&mut self, dimension: ResourceDimension, policy: BucketPolicy) {
        match self.buckets.entry(dimension) {
            Entry::Occupied(mut entry) => entry.get_mut().policy = policy,
            Entry::Vacant(entry) => {
                entry.insert(Bucket::new(policy));
            }
        }
        self.refresh_enabled();
        self.avg_is_max = false;
        self.avg_reset = false;
    }

    /// Drain every bucket for the time elapsed since the previous leak
    fn leak(&mut self, now: Instant) {
        if now <= self.previous_leak {
            trace!("clock did not advance since previous leak, skipping decay");
            return;
        }

        let elapsed = now - self.previous_leak;
        self.previous_leak = now;
        for bucket in self.buckets.values_mut() {
            bucket.leak(elapsed);
        }
    }

    /// Longest wait, in seconds, across all dimensions
    fn compute_wait(&self) -> f64 {
        let burst = self.mode == ThrottleMode::Static && self.allow_burst;
        ResourceDimension::ALL
            .iter()
            .filter_map(|dimension| self.buckets.get(dimension))
            .map(|bucket| bucket.wait_secs(burst))
            .fold(0.0, f64::max)
    }

    fn leak_and_wait(&mut self, now: Instant) -> f64 {
        self.leak(now);
        self.compute_wait()
    }
}

/// Leaky bucket admission control over bytes/s and ops/s
#[derive(Debug)]
pub struct Throttle {
    state: Mutex<ThrottleState>,
    clock: Clock,
}

impl Throttle {
    /// Create a disabled throttle reading the system clock.
    ///
    /// `op_size` is the number of bytes that count as one operation; zero
    /// makes every accounted operation count as exactly one.
    pub fn new(op_size: u64) -> Self {
        Self::with_clock(op_size, Clock::real())
    }

    /// Create a disabled throttle reading `clock`
    pub fn with_clock(op_size: u64, clock: Clock) -> Self {
        let previous_leak = clock.now();
        Self {
            state: Mutex::new(ThrottleState {
                buckets: BTreeMap::new(),
                op_size,
                mode: ThrottleMode::None,
                enabled: false,
                allow_burst: false,
                previous_leak,
                avg_is_max: false,
                avg_reset: false,
            }),
            clock,
        }
    }

    // State is plain data left consistent by every critical section, so a
    // panic elsewhere while holding the lock does not invalidate it.
    fn lock(&self) -> MutexGuard<'_, ThrottleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_op_size(&self, op_size: u64) {
        self.lock().op_size = op_size;
    }

    pub fn op_size(&self) -> u64 {
        self.lock().op_size
    }

    /// Let static buckets fill up to their burst capacity before holding
    /// operations back. Has no effect in dynamic mode.
    pub fn set_allow_burst(&self, allow_burst: bool) {
        self.lock().allow_burst = allow_burst;
    }

    pub fn allow_burst(&self) -> bool {
        self.lock().allow_burst
    }

    /// Whether the current configuration gates anything
    pub fn enabled(&self) -> bool {
        self.lock().enabled
    }

    pub fn mode(&self) -> ThrottleMode {
        self.lock().mode
    }

    /// Switch mode.
    ///
    /// Existing buckets and the adaptive latches are kept; reconfiguring the
    /// dimensions for the new mode is the caller's job.
    pub fn set_mode(&self, mode: ThrottleMode) {
        let mut state = self.lock();
        state.mode = mode;
        state.refresh_enabled();
    }

    /// Switch mode from its raw numbering (0 none, 1 static, 2 dynamic)
    pub fn set_mode_value(&self, raw: i64) -> Result<ThrottleMode, ThrottleError> {
        let mode = ThrottleMode::try_from(raw).inspect_err(|err| {
            warn!("set_mode rejected: {}", err);
        })?;
        self.set_mode(mode);
        Ok(mode)
    }

    /// Configure a fixed average for `dimension`. Requires static mode.
    pub fn configure_static(
        &self,
        dimension: ResourceDimension,
        avg: f64,
    ) -> Result<(), ThrottleError> {
        self.configure_static_with_burst(dimension, avg, 0.0)
    }

    /// Configure a fixed average plus a burst capacity (in units) for
    /// `dimension`. Requires static mode.
    pub fn configure_static_with_burst(
        &self,
        dimension: ResourceDimension,
        avg: f64,
        burst_capacity: f64,
    ) -> Result<(), ThrottleError> {
        let policy = BucketPolicy::Static {
            avg,
            burst_capacity,
        };
        policy
            .check(dimension)
            .inspect_err(|err| warn!("configure_static rejected: {}", err))?;

        let mut state = self.lock();
        check_mode(&state, ThrottleMode::Static, "configure_static")?;
        state.install(dimension, policy);
        Ok(())
    }

    /// Configure an adaptive average for `dimension` between `min` and
    /// `max`, starting at `min`. Requires dynamic mode.
    pub fn configure_dynamic(
        &self,
        dimension: ResourceDimension,
        min: f64,
        max: f64,
        threshold: i64,
    ) -> Result<(), ThrottleError> {
        let policy = BucketPolicy::Dynamic {
            min,
            avg: min,
            max,
            threshold,
        };
        policy
            .check(dimension)
            .inspect_err(|err| warn!("configure_dynamic rejected: {}", err))?;

        let mut state = self.lock();
        check_mode(&state, ThrottleMode::Dynamic, "configure_dynamic")?;
        state.install(dimension, policy);
        Ok(())
    }

    /// Replace the whole configuration in one step.
    ///
    /// Every policy must match `mode`. Buckets not listed in `policies` are
    /// dropped and the listed ones start empty. Nothing changes on error.
    pub fn reconfigure(
        &self,
        mode: ThrottleMode,
        op_size: u64,
        allow_burst: bool,
        policies: BTreeMap<ResourceDimension, BucketPolicy>,
    ) -> Result<(), ThrottleError> {
        for (dimension, policy) in &policies {
            policy
                .check(*dimension)
                .inspect_err(|err| warn!("reconfigure rejected: {}", err))?;
            let expected = if policy.is_dynamic() {
                ThrottleMode::Dynamic
            } else {
                ThrottleMode::Static
            };
            if expected != mode {
                let err = ThrottleError::ModeMismatch {
                    expected,
                    actual: mode,
                };
                warn!("reconfigure rejected: {}", err);
                return Err(err);
            }
        }

        let mut state = self.lock();
        state.mode = mode;
        state.op_size = op_size;
        state.allow_burst = allow_burst;
        state.buckets = policies
            .into_iter()
            .map(|(dimension, policy)| (dimension, Bucket::new(policy)))
            .collect();
        state.refresh_enabled();
        state.avg_is_max = false;
        state.avg_reset = false;
        Ok(())
    }

    /// Copy of every configured bucket
    pub fn config(&self) -> BTreeMap<ResourceDimension, Bucket> {
        self.lock().buckets.clone()
    }

    /// Copy of one bucket, if configured
    pub fn bucket(&self, dimension: ResourceDimension) -> Option<Bucket> {
        self.lock().buckets.get(&dimension).copied()
    }

    pub fn snapshot(&self) -> ThrottleSnapshot {
        let state = self.lock();
        ThrottleSnapshot {
            mode: state.mode,
            enabled: state.enabled,
            op_size: state.op_size,
            allow_burst: state.allow_burst,
            avg_is_max: state.avg_is_max,
            avg_reset: state.avg_reset,
            buckets: state.buckets.clone(),
        }
    }

    /// Decay usage to now and report whether an operation may start.
    ///
    /// Never sleeps. Callers that want to know how long to back off use
    /// [`wait_time`](Throttle::wait_time); callers with nothing configured to
    /// enforce should consult [`enabled`](Throttle::enabled) first.
    pub fn can_schedule(&self) -> bool {
        let mut state = self.lock();
        let now = self.clock.now();
        let wait = state.leak_and_wait(now);
        trace!(wait_secs = wait, "admission check");
        wait <= 0.0
    }

    /// Decay usage to now and return how long the slowest dimension needs
    /// before an operation may start
    pub fn wait_time(&self) -> Duration {
        let mut state = self.lock();
        let now = self.clock.now();
        let wait = state.leak_and_wait(now);
        Duration::try_from_secs_f64(wait).unwrap_or(Duration::MAX)
    }

    /// Record the consumption of an admitted operation of `size` bytes
    pub fn account(&self, size: u64) {
        let mut state = self.lock();
        let op_size = state.op_size;
        for (dimension, bucket) in state.buckets.iter_mut() {
            bucket.fill(dimension.usage(size, op_size));
        }
    }

    /// Correct a dimension's level after the fact: add `add` units, then
    /// remove `subtract` units without going below zero. No-op when the
    /// dimension is not configured.
    pub fn adjust(&self, dimension: ResourceDimension, add: u64, subtract: u64) {
        let mut state = self.lock();
        if let Some(bucket) = state.buckets.get_mut(&dimension) {
            bucket.adjust(add as f64, subtract as f64);
        }
    }

    /// Step every adaptive average up by its dimension's unit, clamped at
    /// the ceiling.
    ///
    /// Once every bucket sits at its ceiling further calls return before
    /// touching anything, including the reset latch.
    pub fn increase_average(&self) {
        let mut state = self.lock();
        if state.avg_is_max {
            return;
        }

        state.avg_reset = false;
        let mut saturated = 0;
        for (dimension, bucket) in state.buckets.iter_mut() {
            let before = bucket.avg();
            if bucket.increase_average(dimension.increase_unit()) {
                saturated += 1;
            }
            if bucket.policy.is_dynamic() && bucket.avg() > before {
                debug!(dimension = %dimension, avg = bucket.avg(), "increased throttle average");
            }
        }

        if saturated == state.buckets.len() {
            state.avg_is_max = true;
            debug!("every throttle average is at its ceiling");
        }
    }

    /// Drop every adaptive average to its floor
    pub fn reset_average(&self) {
        let mut state = self.lock();
        if state.avg_reset {
            return;
        }

        state.avg_is_max = false;
        for bucket in state.buckets.values_mut() {
            bucket.reset_average();
        }
        state.avg_reset = true;
        debug!("reset throttle averages to their floor");
    }

    /// Every adaptive average has reached its ceiling
    pub fn avg_is_max(&self) -> bool {
        self.lock().avg_is_max
    }

    /// Adaptive averages sit at their floor and have not been raised since
    pub fn avg_reset(&self) -> bool {
        self.lock().avg_reset
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(0)
    }
}

fn check_mode(
    state: &ThrottleState,
    expected: ThrottleMode,
    operation: &str,
) -> Result<(), ThrottleError> {
    if state.mode == expected {
        return Ok(());
    }
    let err = ThrottleError::ModeMismatch {
        expected,
        actual: state.mode,
    };
    warn!("{} rejected: {}", operation, err);
    Err(err)
}
