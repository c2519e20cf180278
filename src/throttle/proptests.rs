//! Property-Based Tests for the Throttle
//!
//! Random sequences of throttle operations, checking the invariants that
//! must hold after every step:
//!
//! - **Levels**: no bucket level ever goes negative
//! - **Adaptive bounds**: dynamic averages stay within `[min, max]`
//! - **Monotonic increase**: `increase_average` never lowers an average
//! - **Idempotent reset**: a second `reset_average` changes nothing
//!
//! # Running the Tests
//!
//! ```bash
//! cargo test --lib throttle::proptests
//! ```

use proptest::prelude::*;
use std::time::Duration;

use super::bucket::BucketPolicy;
use super::clock::FakeClock;
use super::dimension::ResourceDimension;
use super::limiter::Throttle;
use super::mode::ThrottleMode;

#[derive(Debug, Clone)]
enum Op {
    Account(u64),
    Adjust(ResourceDimension, u64, u64),
    Advance(u64),
    Rewind(u64),
    CanSchedule,
    Increase,
    Reset,
}

fn arb_dimension() -> impl Strategy<Value = ResourceDimension> {
    prop_oneof![
        Just(ResourceDimension::BytesPerSecTotal),
        Just(ResourceDimension::OpsPerSecTotal),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..10_000_000).prop_map(Op::Account),
        (arb_dimension(), 0u64..1_000_000, 0u64..2_000_000)
            .prop_map(|(d, add, sub)| Op::Adjust(d, add, sub)),
        (0u64..3_000).prop_map(Op::Advance),
        (0u64..500).prop_map(Op::Rewind),
        Just(Op::CanSchedule),
        Just(Op::Increase),
        Just(Op::Reset),
    ]
}

/// `(min, max)` pairs with `min <= max`
fn arb_range() -> impl Strategy<Value = (f64, f64)> {
    (0.0f64..1e7, 0.0f64..1e7).prop_map(|(a, b)| if a <= b { (a, b) } else { (b, a) })
}

fn apply(throttle: &Throttle, fake: &FakeClock, op: &Op) {
    match *op {
        Op::Account(size) => throttle.account(size),
        Op::Adjust(dimension, add, sub) => throttle.adjust(dimension, add, sub),
        Op::Advance(ms) => fake.advance(Duration::from_millis(ms)),
        Op::Rewind(ms) => fake.rewind(Duration::from_millis(ms)),
        Op::CanSchedule => {
            throttle.can_schedule();
        }
        Op::Increase => throttle.increase_average(),
        Op::Reset => throttle.reset_average(),
    }
}

fn dynamic_throttle(op_size: u64, bps: (f64, f64), ops: (f64, f64)) -> (FakeClock, Throttle) {
    let fake = FakeClock::new();
    let throttle = Throttle::with_clock(op_size, fake.clock());
    throttle.set_mode(ThrottleMode::Dynamic);
    throttle
        .configure_dynamic(ResourceDimension::BytesPerSecTotal, bps.0, bps.1, 4)
        .unwrap();
    throttle
        .configure_dynamic(ResourceDimension::OpsPerSecTotal, ops.0, ops.1, 4)
        .unwrap();
    (fake, throttle)
}

proptest! {
    /// Levels stay non-negative in static mode, with and without burst
    #[test]
    fn prop_static_levels_never_negative(
        bps_avg in 0.0f64..1e7,
        ops_avg in 0.0f64..1e4,
        burst in 0.0f64..1e7,
        allow_burst in any::<bool>(),
        op_size in 0u64..65536,
        ops in prop::collection::vec(arb_op(), 1..64)
    ) {
        let fake = FakeClock::new();
        let throttle = Throttle::with_clock(op_size, fake.clock());
        throttle.set_mode(ThrottleMode::Static);
        throttle.set_allow_burst(allow_burst);
        throttle
            .configure_static_with_burst(ResourceDimension::BytesPerSecTotal, bps_avg, burst)
            .unwrap();
        throttle
            .configure_static(ResourceDimension::OpsPerSecTotal, ops_avg)
            .unwrap();

        for op in &ops {
            apply(&throttle, &fake, op);
            for bucket in throttle.config().values() {
                prop_assert!(bucket.level >= 0.0);
            }
        }
    }

    /// Dynamic averages stay within bounds and levels stay non-negative
    #[test]
    fn prop_dynamic_invariants(
        bps in arb_range(),
        ops_range in arb_range(),
        op_size in 0u64..65536,
        ops in prop::collection::vec(arb_op(), 1..64)
    ) {
        let (fake, throttle) = dynamic_throttle(op_size, bps, ops_range);

        for op in &ops {
            apply(&throttle, &fake, op);
            for bucket in throttle.config().values() {
                prop_assert!(bucket.level >= 0.0);
                if let BucketPolicy::Dynamic { min, avg, max, .. } = bucket.policy {
                    prop_assert!(min <= avg && avg <= max);
                }
            }
        }
    }

    /// Repeated increases never lower any average and end at the ceiling
    #[test]
    fn prop_increase_monotonic(
        bps in arb_range(),
        ops_range in (0.0f64..100.0, 0.0f64..100.0)
            .prop_map(|(a, b)| if a <= b { (a, b) } else { (b, a) }),
        steps in 1usize..200
    ) {
        let (_fake, throttle) = dynamic_throttle(0, bps, ops_range);

        let mut previous = throttle.config();
        for _ in 0..steps {
            throttle.increase_average();
            let current = throttle.config();
            for (dimension, bucket) in &current {
                prop_assert!(bucket.avg() >= previous[dimension].avg());
                prop_assert!(bucket.avg() <= bucket.policy.max());
            }
            previous = current;
        }

        // The ops range is at most 100 units wide, so 200 steps saturate it
        if steps >= 100 {
            let ops = &previous[&ResourceDimension::OpsPerSecTotal];
            prop_assert_eq!(ops.avg(), ops.policy.max());
        }
    }

    /// A second reset in a row leaves the state untouched
    #[test]
    fn prop_reset_idempotent(
        bps in arb_range(),
        ops_range in arb_range(),
        ops in prop::collection::vec(arb_op(), 0..32)
    ) {
        let (fake, throttle) = dynamic_throttle(4096, bps, ops_range);
        for op in &ops {
            apply(&throttle, &fake, op);
        }

        throttle.reset_average();
        let first = throttle.snapshot();
        throttle.reset_average();
        prop_assert_eq!(throttle.snapshot(), first);
        prop_assert!(throttle.avg_reset());
    }

    /// An admission check right after draining for long enough always
    /// succeeds
    #[test]
    fn prop_draining_admits(
        avg in 1.0f64..1e6,
        sizes in prop::collection::vec(0u64..1_000_000, 1..16)
    ) {
        let fake = FakeClock::new();
        let throttle = Throttle::with_clock(0, fake.clock());
        throttle.set_mode(ThrottleMode::Static);
        throttle
            .configure_static(ResourceDimension::BytesPerSecTotal, avg)
            .unwrap();

        let total: u64 = sizes.iter().sum();
        for size in &sizes {
            throttle.account(*size);
        }

        fake.advance(Duration::from_secs_f64(total as f64 / avg + 1.0));
        prop_assert!(throttle.can_schedule());
        prop_assert_eq!(throttle.bucket(ResourceDimension::BytesPerSecTotal).unwrap().level, 0.0);
    }
}
