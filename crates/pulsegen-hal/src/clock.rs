//! Monotonic time sources.
//!
//! Signal tasks read time and sleep only through the [`Clock`] trait,
//! so cycle timing can run against the real monotonic clock in
//! production and against [`SimClock`] in deterministic tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic time source with a relative sleep.
pub trait Clock: Send + Sync {
    /// Current reading, measured from an arbitrary fixed epoch.
    /// Successive readings never decrease.
    fn now(&self) -> Duration;

    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Production clock backed by [`Instant`], anchored at creation.
#[derive(Debug)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    /// Create a clock anchored at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Simulated clock for deterministic timing tests.
///
/// Time starts at zero and advances only through [`Clock::sleep`] or
/// [`SimClock::advance`]; a "sleeping" thread returns immediately.
/// Deterministic cycle timing therefore needs a single driving task;
/// tests with several concurrent sleepers should use
/// [`MonotonicClock`] instead.
#[derive(Debug, Default)]
pub struct SimClock {
    now_ns: AtomicU64,
}

impl SimClock {
    /// Create a simulated clock starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock without a sleeping thread.
    pub fn advance(&self, duration: Duration) {
        self.now_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for SimClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.now_ns.load(Ordering::SeqCst))
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
