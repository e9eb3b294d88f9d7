//! Property-based tests for randomizers, age expiry and the
//! one-transition-per-step rule.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use automatons::automaton::{Machine, Step};
use automatons::builder::AutomatonBuilder;
use automatons::core::{StopDescriptor, StopReason};
use automatons::random::{self, Interval, Randomizer};
use automatons::sched::ManualScheduler;
use futures::executor::block_on;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Looper {
    steps: u64,
}

impl Machine for Looper {
    type State = u8;
}

fn run_to_stop(
    automaton: &automatons::Automaton<Looper>,
    scheduler: &Arc<ManualScheduler>,
) -> StopDescriptor<u8> {
    let stopped = automaton.start(scheduler.clone()).unwrap();
    scheduler.run_until_idle();
    block_on(stopped).unwrap()
}

proptest! {
    #[test]
    fn between_stays_in_bounds(seed in any::<u64>(), a in -1_000i64..1_000, b in -1_000i64..1_000) {
        let randomizer = random::seeded(seed);
        let value = randomizer.between(a, b);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };

        if lo == hi {
            prop_assert_eq!(value, lo);
        } else {
            prop_assert!(lo <= value && value < hi);
        }
    }

    #[test]
    fn uniform_draws_are_in_the_unit_interval(seed in any::<u64>()) {
        let randomizer = random::seeded(seed);
        for _ in 0..32 {
            let draw = randomizer.uniform();
            prop_assert!((0.0..1.0).contains(&draw));
        }
    }

    #[test]
    fn duration_draws_stay_in_the_interval(seed in any::<u64>(), a in 0u64..10_000, b in 0u64..10_000) {
        let interval = Interval::millis(a, b);
        let drawn = random::seeded(seed).duration_between(interval);
        prop_assert!(interval.contains(drawn));
    }

    #[test]
    fn seeded_randomizers_are_reproducible(seed in any::<u64>()) {
        let first = random::seeded(seed);
        let second = random::seeded(seed);
        for _ in 0..8 {
            prop_assert_eq!(first.uniform().to_bits(), second.uniform().to_bits());
        }
    }

    #[test]
    fn age_expiry_is_never_early(step_ms in 1u64..50, max_age_ms in 1u64..1_000) {
        let scheduler = Arc::new(ManualScheduler::new());
        let step = Duration::from_millis(step_ms);
        let max_age = Duration::from_millis(max_age_ms);
        let automaton = AutomatonBuilder::new(Looper::default())
            .initial(1)
            .max_age(max_age)
            .ticker(scheduler.ticker().clone())
            .dispatch(Step::sync(move |looper: &mut Looper, cx| {
                looper.steps += 1;
                Ok(cx.stay_after(step))
            }))
            .build()
            .unwrap();

        let descriptor = run_to_stop(&automaton, &scheduler);

        prop_assert_eq!(descriptor.reason, StopReason::Age);
        prop_assert!(descriptor.age >= max_age);
        prop_assert!(descriptor.age < max_age + step);
        prop_assert_eq!(descriptor.last_state, Some(1));
    }

    #[test]
    fn exactly_one_transition_per_step(issued in 1usize..5) {
        let scheduler = Arc::new(ManualScheduler::new());
        let automaton = AutomatonBuilder::new(Looper::default())
            .initial(1)
            .dispatch(Step::sync(move |_: &mut Looper, cx| {
                let mut transition = cx.end();
                for _ in 1..issued {
                    transition = cx.end();
                }
                Ok(transition)
            }))
            .build()
            .unwrap();

        let descriptor = run_to_stop(&automaton, &scheduler);

        if issued == 1 {
            prop_assert_eq!(descriptor.reason, StopReason::Natural);
            prop_assert!(descriptor.error.is_none());
        } else {
            prop_assert_eq!(descriptor.reason, StopReason::Error);
            prop_assert!(descriptor.error.as_ref().is_some_and(|e| e.is_invariant()));
        }
    }
}
