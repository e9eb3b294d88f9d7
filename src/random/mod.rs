//! Random sources for probability-weighted jumps and randomized delays.
//!
//! Only [`Randomizer::uniform`] has to be implemented; the interval helpers
//! are derived from it.

mod interval;

pub use interval::Interval;

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

/// Source of uniform doubles in `[0, 1)`.
///
/// Implementations are shared by every automaton that was built with them,
/// so they must tolerate concurrent callers.
pub trait Randomizer: Send + Sync {
    fn uniform(&self) -> f64;

    /// Integer in `[from, to)`; reversed bounds are swapped and
    /// `from == to` returns `from`.
    fn between(&self, from: i64, to: i64) -> i64 {
        if from == to {
            return from;
        }
        let (from, to) = if from > to { (to, from) } else { (from, to) };
        from + ((to - from) as f64 * self.uniform()) as i64
    }

    /// Integer around `point`, at most `gap` away.
    fn around(&self, point: i64, gap: i64) -> i64 {
        debug_assert!(gap >= 0, "gap must be non-negative");
        self.between(point - gap, point + gap)
    }

    fn between_interval(&self, interval: Interval<i64>) -> i64 {
        self.between(interval.lower(), interval.upper())
    }

    /// Duration drawn from `interval`.
    fn duration_between(&self, interval: Interval<Duration>) -> Duration {
        let span = interval.upper() - interval.lower();
        if span.is_zero() {
            return interval.lower();
        }
        interval.lower() + span.mul_f64(self.uniform())
    }
}

/// Reproducible randomizer backed by ChaCha8.
#[derive(Debug)]
pub struct SeededRandomizer {
    rng: Mutex<ChaCha8Rng>,
}

impl SeededRandomizer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    /// Seeded from the operating system's entropy source.
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::from_entropy()),
        }
    }
}

impl Randomizer for SeededRandomizer {
    fn uniform(&self) -> f64 {
        self.rng.lock().gen::<f64>()
    }
}

/// Randomizer that always draws the same value.
#[derive(Clone, Copy, Debug)]
pub struct FixedRandomizer(f64);

impl Randomizer for FixedRandomizer {
    fn uniform(&self) -> f64 {
        self.0
    }
}

/// Randomizer replaying a fixed list of draws, cycling when exhausted.
#[derive(Debug)]
pub struct SequenceRandomizer {
    draws: Vec<f64>,
    cursor: Mutex<usize>,
}

impl SequenceRandomizer {
    /// `draws` must not be empty.
    pub fn new(draws: impl Into<Vec<f64>>) -> Self {
        let draws = draws.into();
        assert!(!draws.is_empty(), "sequence randomizer needs at least one draw");
        Self {
            draws,
            cursor: Mutex::new(0),
        }
    }
}

impl Randomizer for SequenceRandomizer {
    fn uniform(&self) -> f64 {
        let mut cursor = self.cursor.lock();
        let draw = self.draws[*cursor % self.draws.len()];
        *cursor += 1;
        draw
    }
}

/// Randomizer seeded from OS entropy.
pub fn uniform() -> SeededRandomizer {
    SeededRandomizer::from_entropy()
}

pub fn seeded(seed: u64) -> SeededRandomizer {
    SeededRandomizer::new(seed)
}

pub fn fixed(value: f64) -> FixedRandomizer {
    FixedRandomizer(value)
}

/// Always draws 0.5.
pub fn dummy() -> FixedRandomizer {
    FixedRandomizer(0.5)
}

pub fn sequence(draws: impl Into<Vec<f64>>) -> SequenceRandomizer {
    SequenceRandomizer::new(draws)
}
