//! Closed intervals used for randomized delays.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Closed interval `[lower, upper]`. Construction swaps reversed bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval<T> {
    lower: T,
    upper: T,
}

impl<T: Copy + PartialOrd> Interval<T> {
    pub fn new(a: T, b: T) -> Self {
        if a > b {
            Self { lower: b, upper: a }
        } else {
            Self { lower: a, upper: b }
        }
    }

    /// Degenerate interval holding a single point.
    pub fn point(value: T) -> Self {
        Self {
            lower: value,
            upper: value,
        }
    }

    pub fn lower(&self) -> T {
        self.lower
    }

    pub fn upper(&self) -> T {
        self.upper
    }

    pub fn contains(&self, value: T) -> bool {
        self.lower <= value && value <= self.upper
    }
}

impl Interval<Duration> {
    pub fn zero() -> Self {
        Self::point(Duration::ZERO)
    }

    pub fn millis(a: u64, b: u64) -> Self {
        Self::new(Duration::from_millis(a), Duration::from_millis(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed_bounds_are_swapped() {
        let interval = Interval::new(20_i64, 5);
        assert_eq!(interval.lower(), 5);
        assert_eq!(interval.upper(), 20);
    }

    #[test]
    fn contains_is_closed() {
        let interval = Interval::millis(0, 20);
        assert!(interval.contains(Duration::ZERO));
        assert!(interval.contains(Duration::from_millis(20)));
        assert!(!interval.contains(Duration::from_millis(21)));
    }

    #[test]
    fn zero_is_a_point() {
        let zero = Interval::zero();
        assert_eq!(zero.lower(), zero.upper());
        assert_eq!(zero.upper(), Duration::ZERO);
    }
}
