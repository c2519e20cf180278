//! Clock Source
//!
//! The throttle only ever asks "what time is it now". Production code uses
//! the monotonic system clock; tests and the simulator substitute a
//! [`FakeClock`] they move by hand.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum ClockInner {
    Real,
    Fake(FakeClock),
}

/// Handle to a time source, cheap to clone
#[derive(Debug, Clone)]
pub struct Clock(ClockInner);

impl Clock {
    /// The monotonic system clock
    pub fn real() -> Clock {
        Clock(ClockInner::Real)
    }

    /// Current time
    pub fn now(&self) -> Instant {
        match &self.0 {
            ClockInner::Real => Instant::now(),
            ClockInner::Fake(fake) => fake.now(),
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::real()
    }
}

/// Manually driven clock.
///
/// Time only moves through [`advance`](FakeClock::advance) and
/// [`rewind`](FakeClock::rewind); every [`Clock`] obtained from it observes
/// the same instant.
#[derive(Debug, Clone)]
pub struct FakeClock(Arc<Mutex<Instant>>);

impl FakeClock {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Instant::now())))
    }

    pub fn now(&self) -> Instant {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move time forward by `d`
    pub fn advance(&self, d: Duration) {
        let mut now = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        *now += d;
    }

    /// Move time backward by `d`, saturating at the platform's earliest
    /// representable instant. Used to exercise non-monotonic readings.
    pub fn rewind(&self, d: Duration) {
        let mut now = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(earlier) = now.checked_sub(d) {
            *now = earlier;
        }
    }

    /// A [`Clock`] reading this fake
    pub fn clock(&self) -> Clock {
        Clock(ClockInner::Fake(self.clone()))
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}
