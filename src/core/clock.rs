//! Monotonic time sources used for age tracking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic clock. Readings are offsets from an arbitrary origin and are
/// only meaningful relative to each other.
pub trait Ticker: Send + Sync {
    fn read(&self) -> Duration;
}

/// Ticker backed by [`Instant`].
#[derive(Clone, Copy, Debug)]
pub struct SystemTicker {
    origin: Instant,
}

impl SystemTicker {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl Ticker for SystemTicker {
    fn read(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Ticker that only moves when told to. Clones share the same reading.
#[derive(Clone, Debug, Default)]
pub struct ManualTicker {
    nanos: Arc<AtomicU64>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(to_nanos(by), Ordering::SeqCst);
    }

    /// Move to `at`; readings never go backwards.
    pub fn advance_to(&self, at: Duration) {
        self.nanos.fetch_max(to_nanos(at), Ordering::SeqCst);
    }
}

impl Ticker for ManualTicker {
    fn read(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

fn to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
